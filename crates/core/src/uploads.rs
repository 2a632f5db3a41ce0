//! Incoming image uploads.

use crate::error::{AppError, Result};
use storage::{AssetStore, StoredFile};
use tracing::info;

/// Reject empty, oversized, or non-image payloads. Content is sniffed, the
/// client-supplied name is not trusted.
pub fn validate_image(bytes: &[u8], max_bytes: u64) -> Result<&'static str> {
    if bytes.is_empty() {
        return Err(AppError::Validation("no file uploaded".to_string()));
    }
    if bytes.len() as u64 > max_bytes {
        return Err(AppError::Validation(format!(
            "file too large: {} bytes (limit {})",
            bytes.len(),
            max_bytes
        )));
    }
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(kind.mime_type()),
        Some(kind) => Err(AppError::Validation(format!(
            "only image uploads are accepted, got {}",
            kind.mime_type()
        ))),
        None => Err(AppError::Validation(
            "only image uploads are accepted".to_string(),
        )),
    }
}

pub fn upload_image(
    store: &dyn AssetStore,
    uploads_dir: &str,
    original_name: &str,
    bytes: &[u8],
    max_bytes: u64,
) -> Result<StoredFile> {
    let mime = validate_image(bytes, max_bytes)?;
    let stored = store.put(uploads_dir, original_name, bytes)?;
    info!(
        original = original_name,
        path = %stored.public_path,
        mime,
        size = stored.size,
        "image uploaded"
    );
    Ok(stored)
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Smallest byte prefix `infer` recognises as PNG.
    pub const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
        0x44, 0x52,
    ];
}
