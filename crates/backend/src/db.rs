use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{
        deadpool::{Object, Pool},
        AsyncDieselConnectionManager, ManagerConfig,
    },
    AsyncPgConnection, RunQueryDsl,
};
use shared_types::User;
use uuid::Uuid;

use crate::models::{NewUser, SessionRecord};

pub type DbPool = Pool<AsyncPgConnection>;
pub type DbConnection = Object<AsyncPgConnection>;

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    AsyncPgConnection::try_from(client).await
}

pub fn establish_connection_pool(database_url: &str, max_size: usize) -> anyhow::Result<DbPool> {
    let mut manager_config = ManagerConfig::default();
    manager_config.custom_setup =
        Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
        database_url,
        manager_config,
    );
    let pool = Pool::builder(config)
        .max_size(max_size)
        .build()
        .context("Failed to create database pool")?;

    Ok(pool)
}

pub async fn get_conn(pool: &DbPool) -> anyhow::Result<DbConnection> {
    pool.get()
        .await
        .context("Failed to get database connection from pool")
}

// User database operations
pub mod users {
    use super::*;
    use crate::schema::users;
    use diesel::upsert::excluded;

    pub async fn list_all(conn: &mut AsyncPgConnection) -> anyhow::Result<Vec<User>> {
        let all = users::table
            .order_by(users::created_at.desc())
            .load::<User>(conn)
            .await?;

        Ok(all)
    }

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> anyhow::Result<Option<User>> {
        let user = users::table
            .filter(users::id.eq(user_id))
            .first::<User>(conn)
            .await
            .optional()?;

        Ok(user)
    }

    pub async fn get_by_google_id(
        conn: &mut AsyncPgConnection,
        google_id: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = users::table
            .filter(users::google_id.eq(google_id))
            .first::<User>(conn)
            .await
            .optional()?;

        Ok(user)
    }

    /// Insert a user, or overwrite name/email of the existing row with the
    /// same `google_id`. Last write wins.
    pub async fn upsert_by_google_id(
        conn: &mut AsyncPgConnection,
        new_user: NewUser<'_>,
    ) -> anyhow::Result<User> {
        let user = diesel::insert_into(users::table)
            .values(&new_user)
            .on_conflict(users::google_id)
            .do_update()
            .set((
                users::name.eq(excluded(users::name)),
                users::email.eq(excluded(users::email)),
                users::updated_at.eq(Utc::now()),
            ))
            .get_result::<User>(conn)
            .await
            .with_context(|| format!("Failed to upsert user {}", new_user.google_id))?;

        Ok(user)
    }
}

// Session database operations
pub mod sessions {
    use super::*;
    use crate::schema::sessions;

    pub async fn create(
        conn: &mut AsyncPgConnection,
        record: &SessionRecord,
    ) -> anyhow::Result<SessionRecord> {
        let created = diesel::insert_into(sessions::table)
            .values(record)
            .returning(SessionRecord::as_returning())
            .get_result(conn)
            .await?;

        Ok(created)
    }

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        session_id: Uuid,
    ) -> anyhow::Result<Option<SessionRecord>> {
        let record = sessions::table
            .filter(sessions::id.eq(session_id))
            .select(SessionRecord::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(record)
    }

    pub async fn delete(conn: &mut AsyncPgConnection, session_id: Uuid) -> anyhow::Result<()> {
        diesel::delete(sessions::table.filter(sessions::id.eq(session_id)))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn delete_expired(
        conn: &mut AsyncPgConnection,
        now: DateTime<Utc>,
    ) -> anyhow::Result<usize> {
        let deleted = diesel::delete(sessions::table.filter(sessions::expires_at.le(now)))
            .execute(conn)
            .await?;

        Ok(deleted)
    }
}
