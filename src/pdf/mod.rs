pub mod stamper;

pub use stamper::{page_count, stamp, StampError, StampOutput, StampPlacement};

/// Cheap header check used before trusting bytes returned by a converter.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}
