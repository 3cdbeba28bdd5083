//! Agent turn: forward one conversation message to the hosted graph runtime
//! and extract the reply text from the run output.
//!
//! Conversation history lives in the runtime's own thread store; the thread id
//! is derived deterministically from the conversation identifier, so a sender
//! always lands on the same thread.

use crate::runtime::{ContentBlock, InputMessage, LangGraphClient, LangGraphError, RunInput, RunRequest};
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Runtime(#[from] LangGraphError),
}

/// Remote agent: runtime client plus the static assistant id and graph config
/// sent with every run.
pub struct Agent {
    client: LangGraphClient,
    assistant_id: String,
    graph_config: Value,
}

/// Deterministic thread id for a conversation: UUIDv5 over the DNS namespace.
pub fn thread_id_for(conversation_id: &str) -> String {
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_DNS, conversation_id.as_bytes()).to_string()
}

impl Agent {
    pub fn new(client: LangGraphClient, assistant_id: String, graph_config: Value) -> Self {
        Self {
            client,
            assistant_id,
            graph_config,
        }
    }

    /// Run one turn: send the user message (text plus any image data URIs) to
    /// the conversation's thread and return the reply text.
    pub async fn invoke(
        &self,
        conversation_id: &str,
        text: &str,
        images: &[String],
    ) -> Result<String, AgentError> {
        let thread_id = thread_id_for(conversation_id);
        log::info!(
            "agent: invoking assistant {} on thread {}",
            self.assistant_id,
            thread_id
        );

        let mut content = Vec::new();
        if !text.is_empty() {
            content.push(ContentBlock::text(text));
        }
        for image in images {
            content.push(ContentBlock::image(image.clone()));
        }

        let request = RunRequest {
            assistant_id: self.assistant_id.clone(),
            input: RunInput {
                messages: vec![InputMessage {
                    role: "user".to_string(),
                    content,
                }],
            },
            config: self.graph_config.clone(),
            metadata: json!({ "event": "api_call" }),
            multitask_strategy: "interrupt".to_string(),
            if_not_exists: "create".to_string(),
        };

        let output = self.client.wait_run(&thread_id, &request).await?;
        Ok(extract_reply(&output))
    }
}

/// Pull the reply text out of the run output. Deployed graphs differ in what
/// they return, so this scans the message list first, then known top-level
/// fields, and finally falls back to the raw JSON.
pub fn extract_reply(output: &Value) -> String {
    if let Some(s) = output.as_str() {
        return s.to_string();
    }
    if let Some(obj) = output.as_object() {
        if let Some(messages) = obj.get("messages").and_then(Value::as_array) {
            for msg in messages.iter().rev() {
                let role = msg
                    .get("role")
                    .or_else(|| msg.get("type"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if role == "assistant" || role == "ai" {
                    if let Some(text) = content_text(msg.get("content")) {
                        return text;
                    }
                }
            }
            if let Some(text) = messages.last().and_then(|m| content_text(m.get("content"))) {
                return text;
            }
        }
        for key in ["content", "output", "response", "text", "message", "reply", "answer"] {
            if let Some(text) = obj.get(key).and_then(|v| content_text(Some(v))) {
                return text;
            }
        }
    }
    output.to_string()
}

/// Flatten message content: a plain string, a list of blocks whose text parts
/// are joined, or an object with a nested content field. None when empty.
fn content_text(content: Option<&Value>) -> Option<String> {
    match content? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(blocks) => {
            let mut out = String::new();
            for block in blocks {
                let text = block
                    .as_str()
                    .or_else(|| block.get("text").and_then(Value::as_str))
                    .unwrap_or("");
                if text.is_empty() {
                    continue;
                }
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
            if out.is_empty() {
                None
            } else {
                Some(out)
            }
        }
        Value::Object(o) => o
            .get("content")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        _ => None,
    }
}
