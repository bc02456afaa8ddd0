//! Directory-backed object store.
//!
//! Each bucket is a directory under the root and each key is a relative path
//! inside it. Content types are guessed from the file extension, so a local
//! tree behaves like a bucket whose uploads carried their natural MIME type.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::{ObjectRef, ObjectStore};
use crate::error::StorageError;

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        ensure_relative(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        ensure_relative(key)?;
        Ok(self.bucket_dir(bucket)?.join(key))
    }
}

/// Refuse names that would escape the bucket directory
fn ensure_relative(name: &str) -> Result<(), StorageError> {
    let escapes = Path::new(name)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if name.is_empty() || escapes {
        return Err(StorageError::Io {
            path: name.to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "object names must be relative paths without '..'",
            ),
        });
    }
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Recursively collect all files below `dir`.
fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)?.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

/// Convert a path under the bucket directory into a `/`-separated key
fn key_for(bucket_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(bucket_dir).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

/// Blocking walk of one bucket directory, sorted by key
fn list_bucket(bucket_dir: &Path, bucket: &str, prefix: &str) -> Result<Vec<ObjectRef>, StorageError> {
    if !bucket_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    collect_files_recursive(bucket_dir, &mut files).map_err(|e| io_error(bucket_dir, e))?;

    let mut objects: Vec<ObjectRef> = files
        .iter()
        .filter_map(|path| {
            let key = key_for(bucket_dir, path)?;
            if !key.starts_with(prefix) {
                return None;
            }
            let size = std::fs::metadata(path).ok().map(|m| m.len());
            let content_type = mime_guess::from_path(path)
                .first()
                .map(|m| m.essence_str().to_string());
            Some(ObjectRef {
                bucket: bucket.to_string(),
                key,
                content_type,
                size,
            })
        })
        .collect();

    // Cloud listings are lexicographic by name
    objects.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(objects)
}

/// Remove empty directories up to (but not including) the bucket directory.
async fn cleanup_empty_dirs(start: Option<&Path>, bucket_dir: &Path) {
    let Some(mut dir) = start else { return };

    while dir != bucket_dir && dir.starts_with(bucket_dir) {
        if tokio::fs::remove_dir(dir).await.is_err() {
            // Not empty
            break;
        }
        debug!(dir = %dir.display(), "Removed empty directory");

        dir = match dir.parent() {
            Some(p) => p,
            None => break,
        };
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectRef>, StorageError> {
        let bucket_dir = self.bucket_dir(bucket)?;
        let path = bucket_dir.display().to_string();
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();

        tokio::task::spawn_blocking(move || list_bucket(&bucket_dir, &bucket, &prefix))
            .await
            .map_err(|e| StorageError::Io {
                path,
                source: std::io::Error::other(e),
            })?
    }

    async fn read_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        key: &str,
        dst_bucket: &str,
    ) -> Result<(), StorageError> {
        let source = self.object_path(src_bucket, key)?;
        let dest = self.object_path(dst_bucket, key)?;

        let is_file = tokio::fs::metadata(&source)
            .await
            .is_ok_and(|m| m.is_file());
        if !is_file {
            return Err(StorageError::NotFound {
                bucket: src_bucket.to_string(),
                key: key.to_string(),
            });
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        tokio::fs::copy(&source, &dest)
            .await
            .map_err(|e| io_error(&dest, e))?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let bucket_dir = self.bucket_dir(bucket)?;
        let path = self.object_path(bucket, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                cleanup_empty_dirs(path.parent(), &bucket_dir).await;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}
