//! Legal status transitions for the active document.
//!
//! `apply` is pure: it takes the current record and an event and returns
//! the next record, or a `StateConflict`/`Validation` error with the input
//! left untouched.

use chrono::{DateTime, Utc};

use crate::core::{
    errors::{AppError, AppResult},
    geometry,
    types::{BlobRef, DocumentMeta, DocumentStatus, SignatureField},
};

#[derive(Debug, Clone)]
pub enum DocumentEvent {
    /// A new upload replaces whatever was active before.
    UploadAccepted {
        document_id: String,
        original_name: String,
        checksum: String,
        original_ref: BlobRef,
        at: DateTime<Utc>,
    },
    ConversionSucceeded {
        preview_ref: BlobRef,
        page_count: u32,
    },
    ConversionFailed {
        reason: String,
    },
    FieldPlaced(SignatureField),
    SignSucceeded {
        signed_ref: BlobRef,
    },
    /// Signing or any other mutating operation failed unexpectedly.
    OperationFailed {
        reason: String,
    },
    Cleared,
}

impl DocumentEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UploadAccepted { .. } => "upload_accepted",
            Self::ConversionSucceeded { .. } => "conversion_succeeded",
            Self::ConversionFailed { .. } => "conversion_failed",
            Self::FieldPlaced(_) => "field_placed",
            Self::SignSucceeded { .. } => "sign_succeeded",
            Self::OperationFailed { .. } => "operation_failed",
            Self::Cleared => "cleared",
        }
    }
}

fn conflict(action: &str, status: DocumentStatus) -> AppError {
    AppError::StateConflict(format!("cannot {action} while document is {status}"))
}

fn failed(meta: &DocumentMeta, reason: String) -> DocumentMeta {
    DocumentMeta {
        status: DocumentStatus::Failed,
        signed_ref: None,
        signature_field: None,
        last_error: Some(reason),
        ..meta.clone()
    }
}

/// Checks a field against the document it is being placed on.
pub fn validate_field_for(meta: &DocumentMeta, field: &SignatureField) -> AppResult<()> {
    geometry::validate_field(field)?;
    if let Some(page_count) = meta.page_count {
        if field.page > page_count {
            return Err(AppError::Validation(format!(
                "page {} is out of range (document has {page_count} pages)",
                field.page
            )));
        }
    }
    Ok(())
}

pub fn apply(meta: &DocumentMeta, event: DocumentEvent) -> AppResult<DocumentMeta> {
    use DocumentStatus::*;

    match event {
        DocumentEvent::UploadAccepted {
            document_id,
            original_name,
            checksum,
            original_ref,
            at,
        } => Ok(DocumentMeta {
            document_id: Some(document_id),
            status: Uploaded,
            created_at: Some(at),
            original_name: Some(original_name),
            checksum: Some(checksum),
            original_ref: Some(original_ref),
            ..DocumentMeta::empty()
        }),
        DocumentEvent::ConversionSucceeded {
            preview_ref,
            page_count,
        } => match meta.status {
            Uploaded | Converted => Ok(DocumentMeta {
                status: Converted,
                preview_ref: Some(preview_ref),
                page_count: Some(page_count),
                signed_ref: None,
                last_error: None,
                ..meta.clone()
            }),
            status => Err(conflict("complete a conversion", status)),
        },
        DocumentEvent::ConversionFailed { reason } => match meta.status {
            Uploaded | Converted => Ok(failed(meta, reason)),
            status => Err(conflict("record a conversion failure", status)),
        },
        DocumentEvent::FieldPlaced(field) => {
            if meta.status != Converted {
                return Err(conflict("place a signature field", meta.status));
            }
            validate_field_for(meta, &field)?;
            Ok(DocumentMeta {
                signature_field: Some(field),
                ..meta.clone()
            })
        }
        DocumentEvent::SignSucceeded { signed_ref } => {
            ensure_can_sign(meta)?;
            Ok(DocumentMeta {
                status: Signed,
                signed_ref: Some(signed_ref),
                last_error: None,
                ..meta.clone()
            })
        }
        DocumentEvent::OperationFailed { reason } => Ok(failed(meta, reason)),
        DocumentEvent::Cleared => Ok(DocumentMeta::empty()),
    }
}

/// Preconditions for signing; returns the stored field and preview handle.
pub fn ensure_can_sign(meta: &DocumentMeta) -> AppResult<(SignatureField, BlobRef)> {
    if meta.status != DocumentStatus::Converted {
        return Err(conflict("sign", meta.status));
    }
    let field = meta.signature_field.ok_or_else(|| {
        AppError::StateConflict("place a signature field before signing".to_string())
    })?;
    let preview = meta.preview_ref.clone().ok_or_else(|| {
        AppError::StateConflict("document has no converted preview to sign".to_string())
    })?;
    Ok((field, preview))
}

/// Structural invariants every persisted record must satisfy.
pub fn check_invariants(meta: &DocumentMeta) -> AppResult<()> {
    use DocumentStatus::*;

    let broken = |what: &str| Err(AppError::Internal(format!("{what} (status {})", meta.status)));

    if meta.signature_field.is_some() && !matches!(meta.status, Converted | Signed) {
        return broken("signature field present outside converted/signed");
    }
    if meta.signed_ref.is_some() != (meta.status == Signed) {
        return broken("signed artifact must exist exactly when signed");
    }
    if matches!(meta.status, Converted | Signed) && meta.preview_ref.is_none() {
        return broken("preview artifact missing");
    }
    if meta.last_error.is_some() && meta.status != Failed {
        return broken("error recorded outside failed");
    }
    if meta.status == Empty && meta != &DocumentMeta::empty() {
        return broken("empty document carries data");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converted() -> DocumentMeta {
        DocumentMeta {
            document_id: Some("doc-1".to_string()),
            status: DocumentStatus::Converted,
            original_ref: Some(BlobRef("doc-1/original.docx".to_string())),
            preview_ref: Some(BlobRef("doc-1/preview.pdf".to_string())),
            page_count: Some(2),
            ..DocumentMeta::empty()
        }
    }

    #[test]
    fn failure_drops_field_but_keeps_artifacts() {
        let mut meta = converted();
        meta.signature_field = Some(SignatureField {
            page: 1,
            x_n: 0.5,
            y_n: 0.5,
            w_n: 0.28,
            h_n: 0.1,
        });
        let next = apply(
            &meta,
            DocumentEvent::OperationFailed {
                reason: "boom".to_string(),
            },
        )
        .expect("failure is always accepted");
        assert_eq!(next.status, DocumentStatus::Failed);
        assert!(next.signature_field.is_none());
        assert_eq!(next.preview_ref, meta.preview_ref);
        assert_eq!(next.original_ref, meta.original_ref);
        assert_eq!(next.last_error.as_deref(), Some("boom"));
        check_invariants(&next).expect("failed record is consistent");
    }

    #[test]
    fn field_on_missing_page_is_rejected() {
        let err = apply(
            &converted(),
            DocumentEvent::FieldPlaced(SignatureField {
                page: 3,
                x_n: 0.5,
                y_n: 0.5,
                w_n: 0.28,
                h_n: 0.1,
            }),
        )
        .expect_err("page 3 of 2");
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
