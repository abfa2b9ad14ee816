//! Persistence seams for the document record and its binary artifacts.

use futures::future::BoxFuture;

use crate::core::{
    errors::AppResult,
    types::{BlobRef, DocumentMeta},
};

pub mod blobs;
pub mod meta;

pub use blobs::{FsBlobStore, MemoryBlobStore};
pub use meta::{MemoryMetaStore, SqliteMetaStore};

pub trait BlobStore: Send + Sync {
    fn put<'a>(&'a self, key: &'a str, bytes: Vec<u8>, content_type: &'a str) -> BoxFuture<'a, AppResult<BlobRef>>;

    /// Missing blobs are `NotFound`; other read failures are `Storage` and may be retried.
    fn get<'a>(&'a self, blob: &'a BlobRef) -> BoxFuture<'a, AppResult<Vec<u8>>>;

    fn exists<'a>(&'a self, blob: &'a BlobRef) -> BoxFuture<'a, AppResult<bool>>;

    fn delete_all<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, AppResult<usize>>;
}

pub trait MetaStore: Send + Sync {
    fn read(&self) -> BoxFuture<'_, AppResult<DocumentMeta>>;

    /// Persists `meta` and returns the durable value.
    fn write<'a>(&'a self, meta: &'a DocumentMeta) -> BoxFuture<'a, AppResult<DocumentMeta>>;
}

/// Blob keys are grouped per document so a replaced upload can be swept in one call.
pub fn blob_key(document_id: &str, file_name: &str) -> String {
    format!("{document_id}/{file_name}")
}
