use std::sync::atomic::{AtomicUsize, Ordering};

use futures::{future::BoxFuture, FutureExt};
use tokio::sync::RwLock;

use super::MetaStore;
use crate::{
    core::{errors::AppResult, types::DocumentMeta},
    db::{repositories::meta, Database},
};

/// Single-row sqlite table holding the active document record.
#[derive(Clone)]
pub struct SqliteMetaStore {
    db: Database,
}

impl SqliteMetaStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl MetaStore for SqliteMetaStore {
    fn read(&self) -> BoxFuture<'_, AppResult<DocumentMeta>> {
        meta::read_meta(self.db.pool()).boxed()
    }

    fn write<'a>(&'a self, record: &'a DocumentMeta) -> BoxFuture<'a, AppResult<DocumentMeta>> {
        meta::write_meta(self.db.pool(), record).boxed()
    }
}

#[derive(Debug, Default)]
pub struct MemoryMetaStore {
    record: RwLock<DocumentMeta>,
    writes: AtomicUsize,
}

impl MemoryMetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes, for asserting that rejected operations wrote nothing.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl MetaStore for MemoryMetaStore {
    fn read(&self) -> BoxFuture<'_, AppResult<DocumentMeta>> {
        async move { Ok(self.record.read().await.clone()) }.boxed()
    }

    fn write<'a>(&'a self, record: &'a DocumentMeta) -> BoxFuture<'a, AppResult<DocumentMeta>> {
        async move {
            let mut slot = self.record.write().await;
            *slot = record.clone();
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(slot.clone())
        }
        .boxed()
    }
}
