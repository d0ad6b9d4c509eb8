//! Filesystem blob storage rooted at the media directory.

use async_trait::async_trait;
use humancheck_common::HumanCheckError;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use super::BlobStorage;

pub struct FsBlobStorage {
    root: PathBuf,
}

impl FsBlobStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve a blob name below the root, refusing anything that could escape it
    fn resolve(&self, name: &str) -> Result<PathBuf, HumanCheckError> {
        let relative = Path::new(name);
        let contained = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if contained {
            Ok(self.root.join(relative))
        } else {
            Err(HumanCheckError::Storage(format!("invalid blob name: {name}")))
        }
    }
}

fn io_error(path: &Path, err: std::io::Error) -> HumanCheckError {
    HumanCheckError::Storage(format!("{}: {err}", path.display()))
}

#[async_trait]
impl BlobStorage for FsBlobStorage {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), HumanCheckError> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| io_error(&path, e))
    }

    async fn open(&self, name: &str) -> Result<Option<Vec<u8>>, HumanCheckError> {
        let path = self.resolve(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool, HumanCheckError> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}
