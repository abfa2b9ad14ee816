use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::{future::BoxFuture, FutureExt};
use tokio::sync::RwLock;

use super::BlobStore;
use crate::core::{
    errors::{AppError, AppResult},
    types::BlobRef,
};

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn validate_key(key: &str) -> AppResult<()> {
    let path = Path::new(key);
    let clean = !key.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if clean {
        Ok(())
    } else {
        Err(AppError::Validation(format!("invalid blob key {key:?}")))
    }
}

/// Stores blobs as files below a root directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    async fn put_file(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<BlobRef> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write-then-rename so readers never see a partial artifact.
        let staging = with_suffix(&path, ".partial");
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::write(with_suffix(&path, ".content-type"), content_type).await?;
        tokio::fs::rename(&staging, &path).await?;
        Ok(BlobRef(key.to_string()))
    }

    async fn read_file(&self, blob: &BlobRef) -> AppResult<Vec<u8>> {
        let path = self.path_for(blob.as_str())?;
        tokio::fs::read(&path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => AppError::NotFound(format!("artifact {blob}")),
            _ => AppError::Storage(format!("cannot read {blob}: {err}")),
        })
    }

    async fn file_exists(&self, blob: &BlobRef) -> AppResult<bool> {
        let path = self.path_for(blob.as_str())?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|err| AppError::Storage(err.to_string()))
    }

    async fn remove_prefix(&self, prefix: &str) -> AppResult<usize> {
        let path = self.path_for(prefix)?;
        let mut removed = 0;
        let mut pending = vec![path.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(AppError::StorageWrite(err.to_string())),
            };
            while let Some(entry) = entries.next_entry().await? {
                let entry_path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(entry_path);
                } else if !matches!(
                    entry_path.extension().and_then(|ext| ext.to_str()),
                    Some("content-type") | Some("partial")
                ) {
                    removed += 1;
                }
            }
        }
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(removed),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
            Err(err) => Err(AppError::StorageWrite(err.to_string())),
        }
    }
}

impl BlobStore for FsBlobStore {
    fn put<'a>(&'a self, key: &'a str, bytes: Vec<u8>, content_type: &'a str) -> BoxFuture<'a, AppResult<BlobRef>> {
        self.put_file(key, bytes, content_type).boxed()
    }

    fn get<'a>(&'a self, blob: &'a BlobRef) -> BoxFuture<'a, AppResult<Vec<u8>>> {
        self.read_file(blob).boxed()
    }

    fn exists<'a>(&'a self, blob: &'a BlobRef) -> BoxFuture<'a, AppResult<bool>> {
        self.file_exists(blob).boxed()
    }

    fn delete_all<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, AppResult<usize>> {
        self.remove_prefix(prefix).boxed()
    }
}

#[derive(Debug, Clone)]
struct StoredBlob {
    content_type: String,
    bytes: Vec<u8>,
}

/// Process-local blob store; `fail_next_reads` injects transient read errors.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
    failing_reads: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    pub async fn content_type(&self, blob: &BlobRef) -> Option<String> {
        self.blobs
            .read()
            .await
            .get(blob.as_str())
            .map(|stored| stored.content_type.clone())
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put<'a>(&'a self, key: &'a str, bytes: Vec<u8>, content_type: &'a str) -> BoxFuture<'a, AppResult<BlobRef>> {
        async move {
            validate_key(key)?;
            self.blobs.write().await.insert(
                key.to_string(),
                StoredBlob {
                    content_type: content_type.to_string(),
                    bytes,
                },
            );
            Ok(BlobRef(key.to_string()))
        }
        .boxed()
    }

    fn get<'a>(&'a self, blob: &'a BlobRef) -> BoxFuture<'a, AppResult<Vec<u8>>> {
        async move {
            if self.take_injected_failure() {
                return Err(AppError::Storage(format!("transient read failure for {blob}")));
            }
            self.blobs
                .read()
                .await
                .get(blob.as_str())
                .map(|stored| stored.bytes.clone())
                .ok_or_else(|| AppError::NotFound(format!("artifact {blob}")))
        }
        .boxed()
    }

    fn exists<'a>(&'a self, blob: &'a BlobRef) -> BoxFuture<'a, AppResult<bool>> {
        async move { Ok(self.blobs.read().await.contains_key(blob.as_str())) }.boxed()
    }

    fn delete_all<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, AppResult<usize>> {
        async move {
            let scope = format!("{}/", prefix.trim_end_matches('/'));
            let mut blobs = self.blobs.write().await;
            let before = blobs.len();
            blobs.retain(|key, _| !key.starts_with(&scope));
            Ok(before - blobs.len())
        }
        .boxed()
    }
}
