//! Slack attachment locator.
//!
//! Resolves a channel name to its id, lists the channel's message history
//! and keeps the PDF attachments. Downloads go through the same client
//! because Slack's private file URLs need the bot token.
//!
//! # Endpoints
//!
//! | Call | Endpoint |
//! |------|----------|
//! | channel lookup | `GET {api_base}/conversations.list` |
//! | history | `GET {api_base}/conversations.history?channel=<id>` |
//! | download | `GET <url_private>` |
//!
//! Only the first page of history is read; cursors are not followed.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SlackConfig;
use crate::error::SlackError;
use crate::models::AttachmentRef;

/// Declared file type kept by [`AttachmentSource::pdf_attachments`].
pub const PDF_FILE_TYPE: &str = "pdf";

/// A messaging service that holds attachments.
///
/// [`SlackClient`] is the production implementation; tests substitute
/// in-process fakes.
#[async_trait]
pub trait AttachmentSource: Send + Sync {
    /// Resolve a channel display name to its stable id.
    ///
    /// Fails with [`SlackError::ChannelNotFound`] when nothing matches.
    async fn channel_id(&self, name: &str) -> Result<String>;

    /// All PDF attachments in the channel's visible history.
    async fn pdf_attachments(&self, channel_id: &str) -> Result<Vec<AttachmentRef>>;

    /// Fetch the attachment's bytes.
    async fn download(&self, attachment: &AttachmentRef) -> Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// Slack wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize, Debug)]
struct ConversationsList {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    channels: Vec<SlackChannel>,
}

#[derive(Deserialize, Debug)]
struct SlackChannel {
    id: String,
    name: String,
}

#[derive(Deserialize, Debug)]
struct ConversationsHistory {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    messages: Vec<SlackMessage>,
}

#[derive(Deserialize, Debug)]
struct SlackMessage {
    #[serde(default)]
    files: Vec<SlackFile>,
}

#[derive(Deserialize, Debug, Default)]
struct SlackFile {
    id: Option<String>,
    name: Option<String>,
    url_private: Option<String>,
    size: Option<i64>,
    timestamp: Option<i64>,
    filetype: Option<String>,
}

impl SlackFile {
    fn is_pdf(&self) -> bool {
        self.filetype.as_deref() == Some(PDF_FILE_TYPE)
    }

    /// Convert to an [`AttachmentRef`], or name the first missing field.
    fn into_attachment(self) -> std::result::Result<AttachmentRef, &'static str> {
        let id = self.id.ok_or("id")?;
        let name = self.name.ok_or("name")?;
        let url = self.url_private.ok_or("url_private")?;
        Ok(AttachmentRef {
            id,
            name,
            url,
            size: self.size.unwrap_or(0),
            uploaded_at: self
                .timestamp
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
            file_type: self.filetype.unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct SlackClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> std::result::Result<Self, SlackError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            token: config.bot_token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        query: &[(&str, &str)],
    ) -> std::result::Result<T, SlackError> {
        let resp = self
            .http
            .get(format!("{}/{}", self.api_base, method))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<T>().await?)
    }

    async fn find_channel(&self, name: &str) -> std::result::Result<String, SlackError> {
        info!(stage = "locate", channel = name, "Resolving Slack channel");
        let list: ConversationsList = self.call("conversations.list", &[]).await?;
        if !list.ok {
            return Err(api_error("conversations.list", list.error));
        }
        list.channels
            .into_iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
            .ok_or_else(|| SlackError::ChannelNotFound(name.to_string()))
    }

    async fn list_pdfs(
        &self,
        channel_id: &str,
    ) -> std::result::Result<Vec<AttachmentRef>, SlackError> {
        let history: ConversationsHistory = self
            .call("conversations.history", &[("channel", channel_id)])
            .await?;
        if !history.ok {
            return Err(api_error("conversations.history", history.error));
        }
        let messages = history.messages.len();
        let attachments = collect_pdfs(history.messages);
        info!(
            stage = "locate",
            channel_id,
            messages,
            attachments = attachments.len(),
            "Scanned channel history"
        );
        Ok(attachments)
    }

    async fn fetch_bytes(&self, url: &str) -> std::result::Result<Vec<u8>, SlackError> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;

        // Without a valid token Slack serves its login page with a 200.
        let is_html = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/html"));
        if is_html {
            return Err(SlackError::Api {
                method: "files.download".to_string(),
                message: "received an HTML page instead of file content".to_string(),
            });
        }

        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl AttachmentSource for SlackClient {
    async fn channel_id(&self, name: &str) -> Result<String> {
        Ok(self.find_channel(name).await?)
    }

    async fn pdf_attachments(&self, channel_id: &str) -> Result<Vec<AttachmentRef>> {
        Ok(self.list_pdfs(channel_id).await?)
    }

    async fn download(&self, attachment: &AttachmentRef) -> Result<Vec<u8>> {
        Ok(self.fetch_bytes(&attachment.url).await?)
    }
}

fn api_error(method: &str, error: Option<String>) -> SlackError {
    SlackError::Api {
        method: method.to_string(),
        message: error.unwrap_or_else(|| "unknown_error".to_string()),
    }
}

fn collect_pdfs(messages: Vec<SlackMessage>) -> Vec<AttachmentRef> {
    let mut out = Vec::new();
    for file in messages.into_iter().flat_map(|m| m.files) {
        if !file.is_pdf() {
            continue;
        }
        let label = file.name.clone().or_else(|| file.id.clone());
        match file.into_attachment() {
            Ok(att) => {
                debug!(stage = "locate", file_id = %att.id, name = %att.name, "Found PDF attachment");
                out.push(att);
            }
            Err(field) => {
                warn!(
                    stage = "locate",
                    file = label.as_deref().unwrap_or("<unnamed>"),
                    missing = field,
                    "Skipping attachment with missing field"
                );
            }
        }
    }
    out
}
