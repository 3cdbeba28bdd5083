//! LangGraph Platform API client (http://127.0.0.1:8123 by default).
//! Creates a run on a thread and blocks until the final state values are ready.

use serde::Serialize;
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8123";

/// Client for a hosted LangGraph runtime.
#[derive(Clone)]
pub struct LangGraphClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum LangGraphError {
    #[error("runtime request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("runtime api error: {0}")]
    Api(String),
}

impl LangGraphClient {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /ok — runtime liveness probe.
    pub async fn ok(&self) -> Result<(), LangGraphError> {
        let url = format!("{}/ok", self.base_url);
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LangGraphError::Api(format!("{} {}", status, body)));
        }
        Ok(())
    }

    /// POST /threads/{thread_id}/runs/wait — create a run (and the thread when
    /// it does not exist yet) and wait for the final state values.
    pub async fn wait_run(
        &self,
        thread_id: &str,
        request: &RunRequest,
    ) -> Result<Value, LangGraphError> {
        let url = format!("{}/threads/{}/runs/wait", self.base_url, thread_id);
        let res = self.client.post(&url).json(request).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LangGraphError::Api(format!("{} {}", status, body)));
        }
        let data: Value = res.json().await?;
        Ok(data)
    }
}

/// Body for POST /threads/{id}/runs/wait.
#[derive(Debug, Clone, Serialize)]
pub struct RunRequest {
    pub assistant_id: String,
    pub input: RunInput,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub config: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
    /// What to do when the thread already has a run in flight.
    pub multitask_strategy: String,
    /// Create the thread on first contact instead of erroring.
    pub if_not_exists: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunInput {
    pub messages: Vec<InputMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputMessage {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

/// One content block of a user message (text or inline image).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_blocks_serialize_with_type_tags() {
        let text = serde_json::to_value(ContentBlock::text("hi")).expect("serialize");
        assert_eq!(text, serde_json::json!({ "type": "text", "text": "hi" }));

        let image = serde_json::to_value(ContentBlock::image("data:image/png;base64,AAAA"))
            .expect("serialize");
        assert_eq!(
            image,
            serde_json::json!({
                "type": "image_url",
                "image_url": { "url": "data:image/png;base64,AAAA" }
            })
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = LangGraphClient::new(Some("http://localhost:8123/".to_string()));
        assert_eq!(client.base_url(), "http://localhost:8123");
    }
}
