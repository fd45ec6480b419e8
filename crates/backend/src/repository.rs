//! Store traits used by the HTTP layer.
//!
//! Handlers and the session manager only see `dyn UserStore` and
//! `dyn SessionStore`. The Postgres implementations delegate to the query
//! functions in [`crate::db`]; tests swap in the in-memory stores from
//! [`memory`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::User;
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::models::{NewUser, SessionRecord};

/// Identity records keyed by the provider's stable user ID.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find-or-create by `google_id`, overwriting name and email on every call.
    async fn upsert(&self, new_user: NewUser<'_>) -> Result<User>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>>;

    /// Every user, newest first.
    async fn list(&self) -> Result<Vec<User>>;
}

/// Server-side session rows.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, record: SessionRecord) -> Result<SessionRecord>;

    async fn find(&self, id: Uuid) -> Result<Option<SessionRecord>>;

    async fn remove(&self, id: Uuid) -> Result<()>;

    /// Delete every session expiring at or before `now`, returning the count.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Postgres-backed [`UserStore`]
#[derive(Clone)]
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn upsert(&self, new_user: NewUser<'_>) -> Result<User> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::users::upsert_by_google_id(&mut conn, new_user).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::users::get_by_id(&mut conn, id).await
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::users::get_by_google_id(&mut conn, google_id).await
    }

    async fn list(&self) -> Result<Vec<User>> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::users::list_all(&mut conn).await
    }
}

/// Postgres-backed [`SessionStore`]
#[derive(Clone)]
pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, record: SessionRecord) -> Result<SessionRecord> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::sessions::create(&mut conn, &record).await
    }

    async fn find(&self, id: Uuid) -> Result<Option<SessionRecord>> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::sessions::get_by_id(&mut conn, id).await
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::sessions::delete(&mut conn, id).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = db::get_conn(&self.pool).await?;
        db::sessions::delete_expired(&mut conn, now).await
    }
}

#[cfg(test)]
pub mod memory {
    //! In-memory stores for tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryUserStore {
        users: Mutex<HashMap<Uuid, User>>,
        failing: AtomicBool,
    }

    impl MemoryUserStore {
        /// Make every subsequent call fail, as if the database were down.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn remove(&self, id: Uuid) {
            self.users.lock().unwrap().remove(&id);
        }

        pub fn len(&self) -> usize {
            self.users.lock().unwrap().len()
        }

        fn check(&self) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("user store unavailable");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn upsert(&self, new_user: NewUser<'_>) -> Result<User> {
            self.check()?;
            let mut users = self.users.lock().unwrap();
            let now = Utc::now();
            let existing = users
                .values_mut()
                .find(|u| u.google_id == new_user.google_id);

            let user = match existing {
                Some(user) => {
                    user.name = new_user.name.to_string();
                    user.email = new_user.email.to_string();
                    user.updated_at = now;
                    user.clone()
                }
                None => {
                    let user = User {
                        id: Uuid::new_v4(),
                        google_id: new_user.google_id.to_string(),
                        name: new_user.name.to_string(),
                        email: new_user.email.to_string(),
                        created_at: now,
                        updated_at: now,
                    };
                    users.insert(user.id, user.clone());
                    user
                }
            };

            Ok(user)
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
            self.check()?;
            Ok(self.users.lock().unwrap().get(&id).cloned())
        }

        async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>> {
            self.check()?;
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .find(|u| u.google_id == google_id)
                .cloned())
        }

        async fn list(&self) -> Result<Vec<User>> {
            self.check()?;
            let mut users: Vec<User> = self.users.lock().unwrap().values().cloned().collect();
            users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(users)
        }
    }

    #[derive(Default)]
    pub struct MemorySessionStore {
        sessions: Mutex<HashMap<Uuid, SessionRecord>>,
    }

    impl MemorySessionStore {
        pub fn len(&self) -> usize {
            self.sessions.lock().unwrap().len()
        }

        /// Overwrite a session's expiry, e.g. to simulate time passing.
        pub fn set_expiry(&self, id: Uuid, expires_at: DateTime<Utc>) {
            if let Some(record) = self.sessions.lock().unwrap().get_mut(&id) {
                record.expires_at = expires_at;
            }
        }
    }

    #[async_trait]
    impl SessionStore for MemorySessionStore {
        async fn insert(&self, record: SessionRecord) -> Result<SessionRecord> {
            self.sessions
                .lock()
                .unwrap()
                .insert(record.id, record.clone());
            Ok(record)
        }

        async fn find(&self, id: Uuid) -> Result<Option<SessionRecord>> {
            Ok(self.sessions.lock().unwrap().get(&id).cloned())
        }

        async fn remove(&self, id: Uuid) -> Result<()> {
            self.sessions.lock().unwrap().remove(&id);
            Ok(())
        }

        async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
            let mut sessions = self.sessions.lock().unwrap();
            let before = sessions.len();
            sessions.retain(|_, record| !record.is_expired(now));
            Ok(before - sessions.len())
        }
    }
}
