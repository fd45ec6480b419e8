// Database models for Diesel
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

/// Insertable/upsertable struct for users, keyed by `google_id`
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub google_id: &'a str,
    pub name: &'a str,
    pub email: &'a str,
}

/// Server-side session state. Holds only the user's store key.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
