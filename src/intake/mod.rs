//! Validation of incoming files before they touch document state.
//!
//! Uploads must be Office Open XML word-processing packages:
//!   ZIP container → `[Content_Types].xml` declaring the main document part
//!   → `word/document.xml`.
//! Signature images must be PNG, either raw bytes or a base64 data URL.

use std::io::{Cursor, Read};

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::core::{
    errors::{AppError, AppResult},
    types::PNG_MIME,
};

const WORD_MAIN_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
const MACRO_MAIN_CONTENT_TYPE: &str = "application/vnd.ms-word.document.macroEnabled.main+xml";
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
/// Upper bound on how far a single package part may inflate, relative to the upload limit.
pub const MAX_PART_INFLATION: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocxInfo {
    pub paragraphs: usize,
    pub checksum: String,
}

pub fn checksum_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn ensure_within_limit(len: usize, max_bytes: usize) -> AppResult<()> {
    if len == 0 {
        return Err(AppError::Validation("uploaded file is empty".to_string()));
    }
    if len > max_bytes {
        return Err(AppError::Validation(format!(
            "uploaded file is {} bytes; the limit is {} bytes",
            len, max_bytes
        )));
    }
    Ok(())
}

/// Confirms `bytes` is a word-processing document and summarizes it.
pub fn inspect_docx(bytes: &[u8], max_bytes: usize) -> AppResult<DocxInfo> {
    ensure_within_limit(bytes.len(), max_bytes)?;

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AppError::Validation(format!("file is not a .docx package: {e}")))?;

    let part_limit = max_bytes.saturating_mul(MAX_PART_INFLATION);
    let content_types = read_entry(&mut archive, "[Content_Types].xml", part_limit)?;
    if !declares_word_main_part(&content_types)? {
        return Err(AppError::Validation(
            "package is not a word-processing document".to_string(),
        ));
    }
    let document_xml = read_entry(&mut archive, "word/document.xml", part_limit)?;
    let paragraphs = count_paragraphs_in_xml(&document_xml)?;

    Ok(DocxInfo {
        paragraphs,
        checksum: checksum_bytes(bytes),
    })
}

/// Reads one part, refusing to inflate it past `limit` bytes.
fn read_entry(archive: &mut zip::ZipArchive<Cursor<&[u8]>>, name: &str, limit: usize) -> AppResult<String> {
    let too_large = || AppError::Validation(format!("{name} expands beyond {limit} bytes"));
    let entry = archive
        .by_name(name)
        .map_err(|_| AppError::Validation(format!(".docx package is missing {name}")))?;
    if entry.size() > limit as u64 {
        return Err(too_large());
    }

    let mut raw = Vec::new();
    entry
        .take(limit as u64 + 1)
        .read_to_end(&mut raw)
        .map_err(|e| AppError::Validation(format!("cannot read {name}: {e}")))?;
    if raw.len() > limit {
        return Err(too_large());
    }
    String::from_utf8(raw).map_err(|e| AppError::Validation(format!("{name} is not UTF-8: {e}")))
}

fn declares_word_main_part(content_types_xml: &str) -> AppResult<bool> {
    let doc = roxmltree::Document::parse(content_types_xml)
        .map_err(|e| AppError::Validation(format!("[Content_Types].xml parse failed: {e}")))?;
    Ok(doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Override")
        .filter_map(|n| n.attribute("ContentType"))
        .any(|ct| ct == WORD_MAIN_CONTENT_TYPE || ct == MACRO_MAIN_CONTENT_TYPE))
}

fn count_paragraphs_in_xml(document_xml: &str) -> AppResult<usize> {
    let doc = roxmltree::Document::parse(document_xml)
        .map_err(|e| AppError::Validation(format!("word/document.xml parse failed: {e}")))?;
    Ok(doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "p")
        .count())
}

/// Decodes a signature submitted as base64 or a `data:image/png;base64,` URL.
pub fn decode_signature(encoded: &str) -> AppResult<Vec<u8>> {
    let trimmed = encoded.trim();
    let payload = match trimmed.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => {
            if !header.eq_ignore_ascii_case(&format!("data:{PNG_MIME};base64")) {
                return Err(AppError::Validation(format!(
                    "signature must be a base64 PNG, got {header}"
                )));
            }
            data
        }
        _ => trimmed,
    };
    let bytes = B64
        .decode(payload.as_bytes())
        .map_err(|e| AppError::Validation(format!("signature is not valid base64: {e}")))?;
    ensure_png(&bytes)?;
    Ok(bytes)
}

pub fn ensure_png(bytes: &[u8]) -> AppResult<()> {
    if !bytes.starts_with(PNG_SIGNATURE) {
        return Err(AppError::Validation("signature image must be a PNG".to_string()));
    }
    Ok(())
}
