use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::document::Document;
use crate::error::SessionError;
use crate::service::ChatService;

const MAX_DETAIL_CHARS: usize = 200;

#[derive(Deserialize)]
struct ChatReply {
    answer: Option<String>,
}

/// Client for the `POST /chat` endpoint of the retrieval service.
#[derive(Clone)]
pub struct HttpChatService {
    client: Client,
    base_url: String,
}

impl HttpChatService {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, SessionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SessionError> {
        Self::with_timeout(&config.resolved_base_url(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_url(&self) -> String {
        format!("{}/chat", self.base_url)
    }
}

#[async_trait]
impl ChatService for HttpChatService {
    async fn chat(&self, document: &Document, question: &str) -> Result<String, SessionError> {
        let url = self.chat_url();

        let file = Part::stream_with_length(Body::from(document.bytes.clone()), document.len() as u64)
            .file_name(document.name.clone())
            .mime_str(&document.media_type)?;
        let form = Form::new()
            .part("file", file)
            .text("question", question.to_string());

        debug!(%url, document = %document.name, bytes = document.len(), "sending chat request");

        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let detail = error_detail(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            warn!(status = status.as_u16(), %detail, "chat request rejected");
            return Err(SessionError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        parse_answer(&body)
    }
}

/// Pull the answer out of a success body. A missing or non-string `answer` is malformed.
pub fn parse_answer(body: &str) -> Result<String, SessionError> {
    let reply: ChatReply = serde_json::from_str(body)
        .map_err(|e| SessionError::MalformedResponse(format!("invalid JSON reply: {}", e)))?;

    reply
        .answer
        .ok_or_else(|| SessionError::MalformedResponse("reply has no `answer` field".to_string()))
}

/// Best-effort human readable detail from an error body (`{"error": ...}` or `{"detail": ...}`).
fn error_detail(body: &str) -> Option<String> {
    let detail = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => ["error", "detail"]
            .iter()
            .filter_map(|key| value.get(*key))
            .find_map(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })?,
        Err(_) => body.trim().to_string(),
    };

    if detail.is_empty() {
        return None;
    }
    Some(detail.chars().take(MAX_DETAIL_CHARS).collect())
}
