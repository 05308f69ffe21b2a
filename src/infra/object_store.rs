//! Object store backends for the edge tier and export snapshots.

use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
    sync::RwLock,
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::cache::{ObjectStore, StorageError, rw_read, rw_write};

const SOURCE: &str = "infra::object_store";

/// Filesystem-backed object store rooted at a directory (typically the CDN origin).
///
/// Writes land in a sibling temp file and are renamed into place, so readers never
/// observe a partially written object.
#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let unsafe_component = relative.components().any(|component| {
            !matches!(component, Component::Normal(_) | Component::CurDir)
        });
        if path.is_empty() || relative.is_absolute() || unsafe_component {
            return Err(StorageError::InvalidPath {
                path: path.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, path: &str, body: Bytes, _content_type: &str) -> Result<(), StorageError> {
        let absolute = self.resolve(path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| io_error(parent, err))?;
        }

        let temp = absolute.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
        let write = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(&body).await?;
            file.sync_all().await?;
            fs::rename(&temp, &absolute).await
        };
        if let Err(err) = write.await {
            let _ = fs::remove_file(&temp).await;
            return Err(io_error(&absolute, err));
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        let absolute = self.resolve(path)?;
        match fs::read(&absolute).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(&absolute, err)),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let absolute = self.resolve(path)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&absolute, err)),
        }
    }
}

/// Process-local object store for development and tests.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryObjectStore {
    pub fn contains(&self, path: &str) -> bool {
        rw_read(&self.objects, SOURCE, "contains").contains_key(path)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.objects, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, body: Bytes, _content_type: &str) -> Result<(), StorageError> {
        rw_write(&self.objects, SOURCE, "put").insert(path.to_string(), body);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        Ok(rw_read(&self.objects, SOURCE, "get").get(path).cloned())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        rw_write(&self.objects, SOURCE, "delete").remove(path);
        Ok(())
    }
}
