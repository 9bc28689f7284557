use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::db::{self, SqlRepository};
use crate::posts::repo::PostRepository;
use crate::storage::{DiskStorage, StorageClient};
use crate::users::repo::UserRepository;

pub const UPLOAD_URL_PREFIX: &str = "/static/images";

/// Everything a request handler may touch. Cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        Self::from_config(AppConfig::from_env()?).await
    }

    /// Connects, migrates and prepares the upload directory.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let db = db::connect(&config.database_url).await?;
        db::migrate(&db).await?;

        let storage = Arc::new(DiskStorage::new(&config.upload_dir, UPLOAD_URL_PREFIX).await?)
            as Arc<dyn StorageClient>;

        Ok(Self::from_parts(db, Arc::new(config), storage))
    }

    pub fn from_parts(db: SqlitePool, config: Arc<AppConfig>, storage: Arc<dyn StorageClient>) -> Self {
        let repo = Arc::new(SqlRepository::new(db.clone()));
        Self {
            db,
            config,
            users: repo.clone(),
            posts: repo,
            storage,
        }
    }

    /// Closes the pool; call once on shutdown.
    pub async fn close(&self) {
        self.db.close().await;
    }
}

#[cfg(test)]
pub(crate) async fn test_state() -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = AppState::from_config(AppConfig::for_tests(dir.path().join("images")))
        .await
        .expect("test state");
    (state, dir)
}
