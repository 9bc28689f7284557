use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Blog post as read back from the database, with the poster's display name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub slug: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date_posted: OffsetDateTime,
    pub poster_id: i64,
    pub poster_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub slug: String,
}

/// Partial update: `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
}
