//! Provider abstractions for multimodal (vision) LLM calls.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[cfg(feature = "mock")]
pub mod mock;
pub mod noop;
pub mod openai;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no AI provider configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("provider returned status {status}: {body}")]
    Adapter { status: u16, body: String },
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("provider returned no text")]
    EmptyResponse,
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// How an image is handed to the model: embedded bytes or a reachable URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageRef {
    Inline { mime: String, data: String },
    Url { url: String },
}

impl ImageRef {
    /// URL form accepted by OpenAI-compatible `image_url` parts.
    pub fn as_url(&self) -> String {
        match self {
            ImageRef::Inline { mime, data } => format!("data:{};base64,{}", mime, data),
            ImageRef::Url { url } => url.clone(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, ImageRef::Inline { .. })
    }
}

#[async_trait::async_trait]
pub trait VisionProvider: Send + Sync {
    /// Send one image plus instruction, returning the raw response payload.
    async fn call(
        &self,
        image: &ImageRef,
        instruction: &str,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Pull the model's text out of a raw payload.
    fn extract_text(&self, payload: &serde_json::Value) -> Option<String> {
        chat_message_text(payload)
    }
}

/// Reads `choices[0].message.content` as either a plain string or an array of
/// `{type: "text", text}` parts. Returns `None` when absent or blank.
pub fn chat_message_text(payload: &serde_json::Value) -> Option<String> {
    let content = payload
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?;
    let text = match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(""),
        _ => return None,
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    vision: HashMap<String, Arc<dyn VisionProvider>>,
    pub preferred_vision: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vision(mut self, name: &str, provider: Arc<dyn VisionProvider>) -> Self {
        self.vision.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_vision(mut self, name: &str) -> Self {
        self.preferred_vision = Some(name.to_string());
        self
    }

    pub fn vision(&self, name: Option<&str>) -> Result<Arc<dyn VisionProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_vision.clone())
            .ok_or_else(|| {
                ProviderError::UnknownProvider("no vision provider configured".into())
            })?;
        self.vision
            .get(&key)
            .cloned()
            .ok_or(ProviderError::UnknownProvider(key))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vision.keys().cloned().collect();
        names.sort();
        names
    }
}
