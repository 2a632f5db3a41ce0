//! Scripted vision provider for tests.
//!
//! Responses are consumed in call order; once the script runs out the
//! default response is returned. Every call is recorded.

use crate::{ImageRef, ProviderError, VisionProvider};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub enum Scripted {
    /// Reply with an OpenAI-shaped payload carrying this text.
    Text(String),
    /// Reply with an arbitrary raw payload.
    Payload(serde_json::Value),
    /// Fail with a non-2xx adapter error.
    Status(u16, String),
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub image: ImageRef,
    pub instruction: String,
    /// Tokio clock, so paused-time tests can assert on call spacing.
    pub at: Instant,
}

#[derive(Clone)]
pub struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    default: Scripted,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default: Scripted::Text("Mock response".to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_default_text(mut self, text: impl Into<String>) -> Self {
        self.default = Scripted::Text(text.into());
        self
    }

    pub fn then(self, step: Scripted) -> Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(step);
        self
    }

    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.then(Scripted::Text(text.into()))
    }

    pub fn then_status(self, status: u16, body: impl Into<String>) -> Self {
        self.then(Scripted::Status(status, body.into()))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("call log poisoned").len()
    }
}

#[async_trait::async_trait]
impl VisionProvider for ScriptedProvider {
    async fn call(
        &self,
        image: &ImageRef,
        instruction: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        self.calls
            .lock()
            .expect("call log poisoned")
            .push(RecordedCall {
                image: image.clone(),
                instruction: instruction.to_string(),
                at: Instant::now(),
            });
        let step = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        match step {
            Scripted::Text(text) => Ok(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": text}}]
            })),
            Scripted::Payload(value) => Ok(value),
            Scripted::Status(status, body) => Err(ProviderError::Adapter { status, body }),
        }
    }
}
