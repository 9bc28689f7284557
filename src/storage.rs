use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;

/// Where uploaded files end up. Keys are bare file names.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    /// Public URL the file is served from.
    fn public_url(&self, key: &str) -> String;
}

#[derive(Clone)]
pub struct DiskStorage {
    root: PathBuf,
    url_prefix: String,
}

impl DiskStorage {
    pub async fn new(root: impl Into<PathBuf>, url_prefix: &str) -> anyhow::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        Ok(Self {
            root,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(
            !key.is_empty() && !key.contains(['/', '\\']) && !key.starts_with('.'),
            "invalid storage key {:?}",
            key
        );
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageClient for DiskStorage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        tracing::debug!(key, content_type, size = body.len(), "stored upload");
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.url_prefix, key)
    }
}
