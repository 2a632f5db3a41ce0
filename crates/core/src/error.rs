//! Error taxonomy shared by the catalog, encoder and AI-facing operations.

use providers::ProviderError;
use std::path::PathBuf;
use storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("image not found: {}", .0.display())]
    ImageNotFound(PathBuf),
    #[error("ai provider error: {0}")]
    Adapter(#[from] ProviderError),
    #[error("no template available")]
    EmptyCatalog,
    #[error("storage error: {0}")]
    Storage(StorageError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => AppError::NotFound(path),
            StorageError::InvalidPath(path) => {
                AppError::Validation(format!("invalid path: {}", path))
            }
            other => AppError::Storage(other),
        }
    }
}

impl AppError {
    /// HTTP-equivalent status for the error.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) | AppError::ImageNotFound(_) => 400,
            AppError::NotFound(_) => 404,
            AppError::EmptyCatalog => 200,
            AppError::Adapter(ProviderError::NotConfigured) => 503,
            AppError::Adapter(_)
            | AppError::Storage(_)
            | AppError::Config(_)
            | AppError::Internal(_) => 500,
        }
    }

    /// Message safe to hand back to a client. Internal failures are reduced
    /// to a generic line so provider bodies or filesystem details never leak.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(_)
            | AppError::NotFound(_)
            | AppError::EmptyCatalog => self.to_string(),
            AppError::ImageNotFound(_) => "image not found".to_string(),
            AppError::Adapter(ProviderError::NotConfigured) => {
                "AI service is not configured, set OPENAI_API_KEY".to_string()
            }
            AppError::Adapter(_) => "AI service request failed".to_string(),
            AppError::Storage(_) | AppError::Config(_) | AppError::Internal(_) => {
                "internal server error".to_string()
            }
        }
    }
}
