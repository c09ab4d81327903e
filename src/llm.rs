//! Metadata model abstraction and the OpenAI implementation.
//!
//! A [`MetadataModel`] turns document text into [`DocumentMetadata`]. The
//! OpenAI backend calls `POST {base_url}/chat/completions` with a strict JSON
//! schema so the answer is always `{title, publication_date}` with `null`
//! for unknown fields.
//!
//! Errors are classified into [`LlmError`] variants; the retry policy lives
//! in [`crate::enrich`], not here. One call is one HTTP request.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::models::DocumentMetadata;

/// Instruction sent as the system message on every request.
pub const SYSTEM_PROMPT: &str = "Your job is to extract the document title and the publication date \
from the provided text. Return an object with the fields \"title\" and \"publication_date\". \
Use null for any field that cannot be determined from the text.";

#[async_trait]
pub trait MetadataModel: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// One structured-extraction request.
    async fn extract_metadata(&self, text: &str) -> Result<DocumentMetadata, LlmError>;
}

// ============ OpenAI ============

pub struct OpenAiModel {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_input_chars: usize,
}

impl OpenAiModel {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_input_chars: config.max_input_chars,
        })
    }

    fn request_body(&self, text: &str) -> Value {
        let text = truncate_chars(text, self.max_input_chars);
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {
                    "role": "user",
                    "content": format!(
                        "Extract the title and publication date from the provided text:\n\n{}",
                        text
                    )
                }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "document_metadata",
                    "strict": true,
                    "schema": {
                        "type": "object",
                        "properties": {
                            "title": {"type": ["string", "null"]},
                            "publication_date": {"type": ["string", "null"]}
                        },
                        "required": ["title", "publication_date"],
                        "additionalProperties": false
                    }
                }
            }
        })
    }
}

#[async_trait]
impl MetadataModel for OpenAiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn extract_metadata(&self, text: &str) -> Result<DocumentMetadata, LlmError> {
        let body = self.request_body(text);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited(body_text));
        }
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: body_text,
            });
        }

        debug!(model = %self.model, response_len = body_text.len(), "Model responded");
        parse_chat_response(&body_text)
    }
}

/// Pull the structured metadata out of a chat-completions response body.
pub fn parse_chat_response(body: &str) -> Result<DocumentMetadata, LlmError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| LlmError::Unexpected(format!("response is not JSON: {}", e)))?;

    let message = json
        .pointer("/choices/0/message")
        .ok_or_else(|| LlmError::Unexpected("missing choices[0].message".to_string()))?;

    if let Some(refusal) = message.get("refusal").and_then(|r| r.as_str()) {
        return Err(LlmError::Unexpected(format!("model refused: {}", refusal)));
    }

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| LlmError::Unexpected("missing message content".to_string()))?;

    let metadata: DocumentMetadata = serde_json::from_str(content)
        .map_err(|e| LlmError::Unexpected(format!("content is not metadata JSON: {}", e)))?;

    Ok(DocumentMetadata {
        title: non_blank(metadata.title),
        publication_date: non_blank(metadata.publication_date),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Longest prefix of `text` with at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
