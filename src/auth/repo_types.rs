use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,             // unique, case-sensitive
    pub email: String,                // unique, stored lowercased
    #[serde(skip_serializing)]
    pub password_hash: String,        // Argon2 PHC string, not exposed in JSON
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub is_verified: bool,
    pub profile_picture: Option<String>,
    pub default_city: Option<String>,
    pub temperature_unit: String,     // "C" or "F"
    pub created_at: OffsetDateTime,
    pub last_login: Option<OffsetDateTime>,
}

/// Validated signup data, password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
}

/// Owner-editable profile fields. `None` leaves a column untouched; for the
/// nullable columns an empty string clears the value.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub default_city: Option<String>,
    pub temperature_unit: Option<String>,
}

/// Server-side session row referenced by the `sid` claim of a token.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
}
