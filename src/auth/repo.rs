use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, ProfileChanges, Session, User};
use crate::error::{StoreError, StoreResult};

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
     phone_number, is_verified, profile_picture, default_city, temperature_unit, \
     created_at, last_login";

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Fails with `StoreError::Conflict` when the username or email is taken.
    async fn create(&self, user: NewUser) -> StoreResult<User>;
    async fn touch_last_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()>;
    async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, user_id: Uuid, expires_at: OffsetDateTime) -> StoreResult<Session>;
    /// Returns the session only while it is neither revoked nor expired.
    async fn find_active(&self, id: Uuid, now: OffsetDateTime) -> StoreResult<Option<Session>>;
    /// Idempotent: revoking an unknown or already revoked session is not an error.
    async fn revoke(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()>;
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_where(&self, column: &str, value: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}

fn map_unique_violation(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some(c) if c.contains("email") => "email",
                _ => "username",
            };
            return StoreError::Conflict { field };
        }
    }
    StoreError::Sqlx(e)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.find_where("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_where("email", email).await
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, first_name, last_name, phone_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.phone_number)
            .fetch_one(&self.db)
            .await
            .map_err(map_unique_violation)
    }

    async fn touch_last_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> StoreResult<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users SET
                first_name       = COALESCE($2, first_name),
                last_name        = COALESCE($3, last_name),
                phone_number     = CASE WHEN $4::text IS NULL THEN phone_number ELSE NULLIF($4, '') END,
                profile_picture  = CASE WHEN $5::text IS NULL THEN profile_picture ELSE NULLIF($5, '') END,
                default_city     = CASE WHEN $6::text IS NULL THEN default_city ELSE NULLIF($6, '') END,
                temperature_unit = COALESCE($7, temperature_unit)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&changes.first_name)
            .bind(&changes.last_name)
            .bind(&changes.phone_number)
            .bind(&changes.profile_picture)
            .bind(&changes.default_city)
            .bind(&changes.temperature_unit)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}

pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, user_id: Uuid, expires_at: OffsetDateTime) -> StoreResult<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await?;
        Ok(session)
    }

    async fn find_active(&self, id: Uuid, now: OffsetDateTime) -> StoreResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, expires_at
            FROM sessions
            WHERE id = $1 AND revoked_at IS NULL AND expires_at > $2
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(session)
    }

    async fn revoke(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        sqlx::query("UPDATE sessions SET revoked_at = $2 WHERE id = $1 AND revoked_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
