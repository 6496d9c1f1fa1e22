use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

/// Any unsuccessful outcome of a send. Callers are expected to treat every
/// variant the same way; the split only exists for logs.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("chat service unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("chat service returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed chat response: {0}")]
    Payload(String),
}

#[async_trait]
pub trait ChatService: Send + Sync {
    async fn send_message(&self, request: &ChatRequest) -> Result<String, DeliveryError>;
}

#[derive(Clone)]
pub struct HttpChatService {
    client: Client,
    base_url: String,
}

impl HttpChatService {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatService for HttpChatService {
    async fn send_message(&self, request: &ChatRequest) -> Result<String, DeliveryError> {
        let url = format!("{}/chat", self.base_url);
        tracing::debug!(%url, chars = request.message.chars().count(), "sending chat message");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(DeliveryError::Transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status { status, body });
        }

        let bytes = response.bytes().await.map_err(DeliveryError::Transport)?;
        let chat_response: ChatResponse =
            serde_json::from_slice(&bytes).map_err(|e| DeliveryError::Payload(e.to_string()))?;
        Ok(chat_response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> HttpChatService {
        HttpChatService::new(&server.uri(), Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn test_request_omits_unset_model() {
        let json = serde_json::to_value(ChatRequest::new("hi")).unwrap();
        assert_eq!(json, serde_json::json!({ "message": "hi" }));

        let json = serde_json::to_value(
            ChatRequest::new("hi").with_model(Some("google/gemini-2.5-pro".to_string())),
        )
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "message": "hi", "model": "google/gemini-2.5-pro" })
        );
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let service = HttpChatService::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(service.base_url(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn test_send_message_returns_response_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_json(serde_json::json!({ "message": "TypeError: x is undefined" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "response": "x was never assigned." })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let reply = service(&server)
            .send_message(&ChatRequest::new("TypeError: x is undefined"))
            .await
            .expect("send message");
        assert_eq!(reply, "x was never assigned.");
    }

    #[tokio::test]
    async fn test_server_error_is_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model provider down"))
            .mount(&server)
            .await;

        let err = service(&server)
            .send_message(&ChatRequest::new("boom"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Status { .. }));
        assert!(err.to_string().contains("model provider down"));
    }

    #[tokio::test]
    async fn test_missing_response_field_is_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "reply": "hi" })))
            .mount(&server)
            .await;

        let err = service(&server)
            .send_message(&ChatRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Payload(_)));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "response": "late" }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let service = HttpChatService::new(&server.uri(), Duration::from_millis(100)).unwrap();
        let err = service.send_message(&ChatRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_delivery_failure() {
        // Port 9 (discard) is not expected to be listening
        let service = HttpChatService::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = service.send_message(&ChatRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
    }
}
