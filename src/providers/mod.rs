use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::{
    core::errors::{AppError, ConversionErrorKind},
    pdf,
};

pub mod gotenberg;
pub mod soffice;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConversionError {
    pub kind: ConversionErrorKind,
    pub message: String,
}

impl ConversionError {
    pub fn bad_input(message: impl Into<String>) -> Self {
        Self {
            kind: ConversionErrorKind::BadInput,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: ConversionErrorKind::Timeout,
            message: format!("no result after {}s", after.as_secs()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ConversionErrorKind::Internal,
            message: message.into(),
        }
    }
}

impl From<ConversionError> for AppError {
    fn from(value: ConversionError) -> Self {
        AppError::conversion(value.kind, value.message)
    }
}

/// "DOCX bytes in, PDF bytes out." Implementations should honour `timeout`
/// themselves; [`convert_with_timeout`] enforces it regardless.
pub trait ConversionGateway: Send + Sync {
    fn name(&self) -> &'static str;

    fn convert<'a>(
        &'a self,
        docx: &'a [u8],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<u8>, ConversionError>>;
}

pub async fn convert_with_timeout(
    gateway: &dyn ConversionGateway,
    docx: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, ConversionError> {
    let started = std::time::Instant::now();
    let pdf_bytes = match tokio::time::timeout(timeout, gateway.convert(docx, timeout)).await {
        Ok(result) => result?,
        Err(_) => return Err(ConversionError::timeout(timeout)),
    };
    if !pdf::looks_like_pdf(&pdf_bytes) {
        return Err(ConversionError::internal(format!(
            "{} returned {} bytes that are not a PDF",
            gateway.name(),
            pdf_bytes.len()
        )));
    }
    tracing::info!(
        converter = gateway.name(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        bytes = pdf_bytes.len(),
        "document converted"
    );
    Ok(pdf_bytes)
}
