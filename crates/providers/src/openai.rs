use crate::{ImageRef, ProviderError, VisionProvider};
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

#[derive(Clone)]
pub struct OpenAiVisionProvider {
    client: Client,
    cfg: Arc<OpenAiConfig>,
}

impl OpenAiVisionProvider {
    pub fn new(cfg: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            cfg: Arc::new(cfg),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.cfg.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    ImageUrl { image_url: ImageUrl },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[async_trait::async_trait]
impl VisionProvider for OpenAiVisionProvider {
    async fn call(
        &self,
        image: &ImageRef,
        instruction: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        let body = ChatRequest {
            model: &self.cfg.chat_model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.as_url(),
                        },
                    },
                    ContentPart::Text { text: instruction },
                ],
            }],
            max_tokens: self.cfg.max_tokens,
        };

        debug!(
            model = %self.cfg.chat_model,
            inline = image.is_inline(),
            "vision request"
        );

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.cfg.api_key)
            .timeout(Duration::from_secs(self.cfg.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.bytes().await.unwrap_or(Bytes::from_static(b""));
            return Err(ProviderError::Adapter {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let raw = resp
            .bytes()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        serde_json::from_slice(&raw).map_err(|e| ProviderError::MalformedPayload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: String) -> OpenAiVisionProvider {
        OpenAiVisionProvider::new(OpenAiConfig {
            api_key: "test-key".into(),
            base_url,
            chat_model: "gpt-4o-mini".into(),
            timeout_secs: 5,
            max_tokens: 200,
        })
    }

    fn image() -> ImageRef {
        ImageRef::Url {
            url: "https://example.com/uploads/a.png".into(),
        }
    }

    #[test]
    fn request_serializes_image_and_text_parts() {
        let req = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: "u".into() },
                    },
                    ContentPart::Text { text: "describe" },
                ],
            }],
            max_tokens: 10,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["messages"][0]["content"][0]["type"], "image_url");
        assert_eq!(value["messages"][0]["content"][0]["image_url"]["url"], "u");
        assert_eq!(value["messages"][0]["content"][1]["type"], "text");
        assert_eq!(value["messages"][0]["content"][1]["text"], "describe");
    }

    #[tokio::test]
    async fn returns_raw_payload_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "Well done"}}]
            })))
            .mount(&server)
            .await;

        let p = provider(format!("{}/v1", server.uri()));
        let payload = p.call(&image(), "comment").await.unwrap();
        assert_eq!(p.extract_text(&payload).as_deref(), Some("Well done"));
    }

    #[tokio::test]
    async fn non_success_status_is_adapter_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = provider(server.uri())
            .call(&image(), "comment")
            .await
            .unwrap_err();
        match err {
            ProviderError::Adapter { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_json_is_malformed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = provider(server.uri())
            .call(&image(), "comment")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedPayload(_)));
    }
}
