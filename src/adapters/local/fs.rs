use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use std::error::Error;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// Artifact store on the local filesystem. Keys are relative paths under `root`
/// and the locator handed back is the full path.
#[derive(Clone, Debug)]
pub struct FsAdapter {
    root: PathBuf,
}

impl FsAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, Box<dyn Error + Send + Sync>> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(format!("invalid artifact key {:?}", key).into());
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StoragePort for FsAdapter {
    async fn write(&self, key: &str, data: &[u8]) -> Result<String, Box<dyn Error + Send + Sync>> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename, so readers never see half a file.
        // Each write owns its temp file: a redelivered job may be writing the same key.
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = path.with_file_name(format!(
            ".{}.{}.partial",
            file_name,
            Uuid::new_v4().simple()
        ));
        let written = match tokio::fs::write(&temp_path, data).await {
            Ok(()) => tokio::fs::rename(&temp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(path.to_string_lossy().to_string())
    }

    async fn read(&self, locator: &str) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
        Ok(tokio::fs::read(locator).await?)
    }
}
