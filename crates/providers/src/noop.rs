use crate::{ImageRef, ProviderError, VisionProvider};

/// Stand-in used when no real provider has credentials; every call fails
/// with `NotConfigured`.
#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait::async_trait]
impl VisionProvider for NoopProvider {
    async fn call(
        &self,
        _image: &ImageRef,
        _instruction: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        Err(ProviderError::NotConfigured)
    }
}
