use std::str::FromStr;

use anyhow::Context;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("username already taken")]
    DuplicateUsername,
    #[error("{0}")]
    Validation(String),
    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl RepoError {
    /// Classify a failed insert/update: unique violations on `user` become
    /// the matching duplicate error, everything else is a persistence failure.
    pub(crate) fn from_write(err: sqlx::Error) -> Self {
        match unique_violation(&err) {
            Some(msg) if msg.contains("email") => RepoError::DuplicateEmail,
            Some(msg) if msg.contains("username") => RepoError::DuplicateUsername,
            _ => RepoError::Persistence(err),
        }
    }
}

/// SQL-backed repository; implements both `UserRepository` and
/// `PostRepository`.
#[derive(Clone)]
pub struct SqlRepository {
    pub(crate) db: SqlitePool,
}

impl SqlRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Open the SQLite pool with foreign keys enforced.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("parse database url {}", database_url))?
        .create_if_missing(true)
        .foreign_keys(true);

    // Each connection to `sqlite::memory:` opens a separate database, so the
    // pool must keep exactly one connection alive for its whole life.
    let in_memory = database_url.contains(":memory:");
    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 10 })
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("connect to database")?;
    Ok(pool)
}

pub async fn migrate(db: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    Ok(())
}

/// Returns the driver message if `err` is a unique-key violation.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Some(db.message().to_string()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let db = connect("sqlite::memory:").await.expect("in-memory pool");
    migrate(&db).await.expect("migrations apply");
    db
}
