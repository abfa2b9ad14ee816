use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::geometry::PixelRect;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Empty,
    Uploaded,
    Converted,
    Signed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Uploaded => "uploaded",
            Self::Converted => "converted",
            Self::Signed => "signed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "empty" => Some(Self::Empty),
            "uploaded" => Some(Self::Uploaded),
            "converted" => Some(Self::Converted),
            "signed" => Some(Self::Signed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Placement of the signature on a page, in normalized page units.
///
/// `x_n`/`y_n` are the center of the field, `w_n`/`h_n` its size, all as
/// fractions of the rendered page width and height with the origin at the
/// top-left corner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureField {
    pub page: u32,
    #[serde(rename = "xN")]
    pub x_n: f64,
    #[serde(rename = "yN")]
    pub y_n: f64,
    #[serde(rename = "wN")]
    pub w_n: f64,
    #[serde(rename = "hN")]
    pub h_n: f64,
}

/// Opaque handle to a stored binary artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct BlobRef(pub String);

impl BlobRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Original,
    Preview,
    Signed,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Preview => "preview",
            Self::Signed => "signed",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Original => "original.docx",
            Self::Preview => "preview.pdf",
            Self::Signed => "signed.pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Original => DOCX_MIME,
            Self::Preview | Self::Signed => PDF_MIME,
        }
    }
}

pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PDF_MIME: &str = "application/pdf";
pub const PNG_MIME: &str = "image/png";

/// The single active document's metadata record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    pub document_id: Option<String>,
    pub status: DocumentStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub original_name: Option<String>,
    pub checksum: Option<String>,
    pub original_ref: Option<BlobRef>,
    pub preview_ref: Option<BlobRef>,
    pub signed_ref: Option<BlobRef>,
    pub page_count: Option<u32>,
    pub signature_field: Option<SignatureField>,
    pub last_error: Option<String>,
}

impl DocumentMeta {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn artifact_ref(&self, kind: ArtifactKind) -> Option<&BlobRef> {
        match kind {
            ArtifactKind::Original => self.original_ref.as_ref(),
            ArtifactKind::Preview => self.preview_ref.as_ref(),
            ArtifactKind::Signed => self.signed_ref.as_ref(),
        }
    }
}

/// An uncommitted signature held by the editing session until finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporarySignature {
    pub image_data: Vec<u8>,
    pub position: SignatureField,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatusResponse {
    pub document: DocumentMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifactResponse {
    pub kind: ArtifactKind,
    pub file_path: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearDocumentResponse {
    pub cleared: bool,
    pub document: DocumentMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerMoveResponse {
    pub field: Option<SignatureField>,
    pub rect: Option<PixelRect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachSignatureResponse {
    pub attached: bool,
    pub position: SignatureField,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardSignatureResponse {
    pub discarded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitForConversionResponse {
    pub settled: bool,
    pub document: DocumentMeta,
}
