use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub favorite_color: Option<String>,
    pub about_author: Option<String>,
    pub profile_pic: Option<String>, // file name under the upload dir
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed
    #[serde(with = "time::serde::rfc3339")]
    pub date_added: OffsetDateTime,
}

/// Fields for a new user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub favorite_color: Option<String>,
    pub about_author: Option<String>,
    pub password_hash: String,
}

/// Partial update: `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub favorite_color: Option<String>,
    pub about_author: Option<String>,
    pub profile_pic: Option<String>,
    pub password_hash: Option<String>,
}
