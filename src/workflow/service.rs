use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    config::{AppConfig, ConversionMode},
    core::{
        errors::{AppError, AppResult, ConversionErrorKind},
        retry::{retry_async, RetryPolicy},
        state_machine::{self, DocumentEvent},
        types::{ArtifactKind, BlobRef, DocumentMeta, DocumentStatus, SignatureField},
    },
    intake,
    pdf,
    providers::{self, ConversionGateway},
    storage::{blob_key, BlobStore, MetaStore},
};

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub max_upload_bytes: usize,
    pub convert_timeout: Duration,
    pub conversion_mode: ConversionMode,
    pub read_retry: RetryPolicy,
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_upload_bytes: config.max_upload_bytes,
            convert_timeout: config.convert_timeout,
            conversion_mode: config.conversion_mode,
            read_retry: RetryPolicy::default(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Outcome of waiting for a background conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Settled(DocumentMeta),
    StillPending(DocumentMeta),
}

impl PollOutcome {
    pub fn into_meta(self) -> DocumentMeta {
        match self {
            Self::Settled(meta) | Self::StillPending(meta) => meta,
        }
    }
}

struct ServiceInner {
    meta: Arc<dyn MetaStore>,
    blobs: Arc<dyn BlobStore>,
    converter: Arc<dyn ConversionGateway>,
    settings: ServiceSettings,
    /// Serializes every read-modify-write of the document record.
    mutation: Mutex<()>,
    /// Bumped by every upload and clear; background results from older generations are dropped.
    generation: AtomicU64,
}

/// Owns the active document and drives it through its lifecycle.
#[derive(Clone)]
pub struct DocumentService {
    inner: Arc<ServiceInner>,
}

impl DocumentService {
    pub fn new(
        meta: Arc<dyn MetaStore>,
        blobs: Arc<dyn BlobStore>,
        converter: Arc<dyn ConversionGateway>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                meta,
                blobs,
                converter,
                settings,
                mutation: Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.inner.settings
    }

    pub async fn status(&self) -> AppResult<DocumentMeta> {
        retry_async(&self.inner.settings.read_retry, "read_meta", || self.inner.meta.read()).await
    }

    /// Applies `event` to `current`, persists the result and logs the transition.
    async fn commit(&self, current: &DocumentMeta, event: DocumentEvent) -> AppResult<DocumentMeta> {
        let event_name = event.name();
        let next = state_machine::apply(current, event)?;
        state_machine::check_invariants(&next)?;
        let stored = self.inner.meta.write(&next).await?;
        tracing::info!(
            event = event_name,
            from = %current.status,
            to = %stored.status,
            document_id = stored.document_id.as_deref().unwrap_or("-"),
            "document transition"
        );
        Ok(stored)
    }

    /// Records an unexpected failure; the original error is returned either way.
    async fn record_failure(&self, current: &DocumentMeta, err: AppError) -> AppError {
        let reason = err.user_message();
        tracing::warn!(code = err.code(), error = %err, "operation failed, marking document failed");
        if let Err(write_err) = self
            .commit(current, DocumentEvent::OperationFailed { reason })
            .await
        {
            tracing::warn!(error = %write_err, "could not record failure");
        }
        err
    }

    /// Accepts a new upload, replacing whatever document was active.
    pub async fn submit_upload(&self, file_name: &str, bytes: Vec<u8>) -> AppResult<DocumentMeta> {
        let info = intake::inspect_docx(&bytes, self.inner.settings.max_upload_bytes)?;

        let (uploaded, generation) = {
            let _guard = self.inner.mutation.lock().await;
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let previous = self.status().await?;

            let document_id = Uuid::new_v4().to_string();
            let original_ref = self
                .inner
                .blobs
                .put(
                    &blob_key(&document_id, ArtifactKind::Original.file_name()),
                    bytes.clone(),
                    ArtifactKind::Original.content_type(),
                )
                .await?;
            let uploaded = self
                .commit(
                    &previous,
                    DocumentEvent::UploadAccepted {
                        document_id,
                        original_name: file_name.to_string(),
                        checksum: info.checksum,
                        original_ref,
                        at: Utc::now(),
                    },
                )
                .await?;
            tracing::debug!(paragraphs = info.paragraphs, bytes = bytes.len(), "upload accepted");

            if let Some(old_id) = previous.document_id.as_deref() {
                self.discard_artifacts(old_id).await;
            }
            (uploaded, generation)
        };

        let document_id = uploaded.document_id.clone().unwrap_or_default();
        match self.inner.settings.conversion_mode {
            ConversionMode::Sync => self.run_conversion(generation, document_id, bytes).await,
            ConversionMode::Async => {
                let service = self.clone();
                tokio::spawn(async move {
                    if let Err(err) = service.run_conversion(generation, document_id, bytes).await {
                        tracing::warn!(error = %err, "background conversion finished with error");
                    }
                });
                Ok(uploaded)
            }
        }
    }

    async fn discard_artifacts(&self, document_id: &str) {
        match self.inner.blobs.delete_all(document_id).await {
            Ok(removed) => tracing::debug!(document_id, removed, "previous artifacts discarded"),
            Err(err) => tracing::warn!(document_id, error = %err, "could not discard previous artifacts"),
        }
    }

    fn is_current(&self, generation: u64, meta: &DocumentMeta, document_id: &str) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
            && meta.document_id.as_deref() == Some(document_id)
    }

    async fn run_conversion(&self, generation: u64, document_id: String, docx: Vec<u8>) -> AppResult<DocumentMeta> {
        let converted = providers::convert_with_timeout(
            self.inner.converter.as_ref(),
            &docx,
            self.inner.settings.convert_timeout,
        )
        .await
        .map_err(AppError::from);

        let converted = match converted {
            Ok(pdf_bytes) => count_pages(pdf_bytes).await,
            Err(err) => Err(err),
        };

        let _guard = self.inner.mutation.lock().await;
        let current = self.status().await?;
        if !self.is_current(generation, &current, &document_id) {
            tracing::info!(document_id = %document_id, "dropping stale conversion result");
            return Ok(current);
        }

        match converted {
            Ok((pdf_bytes, page_count)) => {
                let key = blob_key(&document_id, ArtifactKind::Preview.file_name());
                let preview_ref = match self
                    .inner
                    .blobs
                    .put(&key, pdf_bytes, ArtifactKind::Preview.content_type())
                    .await
                {
                    Ok(blob) => blob,
                    Err(err) => return Err(self.record_failure(&current, err).await),
                };
                self.commit(
                    &current,
                    DocumentEvent::ConversionSucceeded {
                        preview_ref,
                        page_count,
                    },
                )
                .await
            }
            Err(err) => {
                tracing::warn!(document_id = %document_id, error = %err, "conversion failed");
                self.commit(
                    &current,
                    DocumentEvent::ConversionFailed {
                        reason: err.user_message(),
                    },
                )
                .await?;
                Err(err)
            }
        }
    }

    /// Waits until the document leaves `uploaded`, checking every `interval`.
    pub async fn poll_until_settled(&self, interval: Duration, max_wait: Duration) -> AppResult<PollOutcome> {
        let deadline = tokio::time::Instant::now() + max_wait;
        loop {
            let meta = self.status().await?;
            if meta.status != DocumentStatus::Uploaded {
                return Ok(PollOutcome::Settled(meta));
            }
            if tokio::time::Instant::now() + interval > deadline {
                return Ok(PollOutcome::StillPending(meta));
            }
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn place_field(&self, field: SignatureField) -> AppResult<DocumentMeta> {
        let _guard = self.inner.mutation.lock().await;
        let current = self.status().await?;
        let stored = self.commit(&current, DocumentEvent::FieldPlaced(field)).await?;
        tracing::debug!(
            page = field.page,
            x_n = field.x_n,
            y_n = field.y_n,
            w_n = field.w_n,
            h_n = field.h_n,
            "signature field placed"
        );
        Ok(stored)
    }

    /// Stamps `signature_png` onto the preview at the stored field, or at
    /// `field` when given. A field must have been placed beforehand.
    pub async fn sign(&self, signature_png: Vec<u8>, field: Option<SignatureField>) -> AppResult<DocumentMeta> {
        intake::ensure_png(&signature_png)?;

        let _guard = self.inner.mutation.lock().await;
        let current = self.status().await?;
        state_machine::ensure_can_sign(&current)?;
        let current = match field {
            Some(field) if Some(field) != current.signature_field => {
                self.commit(&current, DocumentEvent::FieldPlaced(field)).await?
            }
            _ => current,
        };
        let (field, preview_ref) = state_machine::ensure_can_sign(&current)?;
        let document_id = current.document_id.clone().unwrap_or_default();

        let preview = match self.read_blob(&preview_ref).await {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.record_failure(&current, err).await),
        };

        let stamped = tokio::task::spawn_blocking(move || pdf::stamp(&preview, &field, &signature_png))
            .await
            .map_err(|err| AppError::Internal(format!("stamping task failed: {err}")))
            .and_then(|result| result.map_err(AppError::from));
        let output = match stamped {
            Ok(output) => output,
            Err(err) => return Err(self.record_failure(&current, err).await),
        };

        let key = blob_key(&document_id, ArtifactKind::Signed.file_name());
        let signed_ref = match self
            .inner
            .blobs
            .put(&key, output.pdf, ArtifactKind::Signed.content_type())
            .await
        {
            Ok(blob) => blob,
            Err(err) => return Err(self.record_failure(&current, err).await),
        };
        tracing::info!(
            document_id = %document_id,
            page = output.placement.page,
            x = output.placement.rect.x,
            y = output.placement.rect.y,
            "signature applied"
        );
        self.commit(&current, DocumentEvent::SignSucceeded { signed_ref }).await
    }

    async fn read_blob(&self, blob: &BlobRef) -> AppResult<Vec<u8>> {
        retry_async(&self.inner.settings.read_retry, "read_blob", || self.inner.blobs.get(blob)).await
    }

    /// Bytes of a produced artifact; `NotFound` until it exists.
    pub async fn fetch_artifact(&self, kind: ArtifactKind) -> AppResult<Vec<u8>> {
        let meta = self.status().await?;
        let blob = meta
            .artifact_ref(kind)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("{} artifact has not been produced", kind.as_str())))?;
        self.read_blob(&blob).await
    }

    /// Resets to `empty` and discards every artifact of the active document.
    pub async fn clear(&self) -> AppResult<DocumentMeta> {
        let _guard = self.inner.mutation.lock().await;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let current = self.status().await?;
        let cleared = self.commit(&current, DocumentEvent::Cleared).await?;
        if let Some(old_id) = current.document_id.as_deref() {
            self.discard_artifacts(old_id).await;
        }
        Ok(cleared)
    }
}

async fn count_pages(pdf_bytes: Vec<u8>) -> AppResult<(Vec<u8>, u32)> {
    tokio::task::spawn_blocking(move || {
        let pages = pdf::page_count(&pdf_bytes)
            .map_err(|err| AppError::conversion(ConversionErrorKind::Internal, err.to_string()))?;
        if pages == 0 {
            return Err(AppError::conversion(
                ConversionErrorKind::Internal,
                "converted PDF has no pages",
            ));
        }
        Ok((pdf_bytes, pages))
    })
    .await
    .map_err(|err| AppError::Internal(format!("page count task failed: {err}")))?
}
