//! Metadata enrichment.
//!
//! Sends each document's text to the [`MetadataModel`] one at a time, with
//! a per-file retry budget and a fixed pause between files to stay under the
//! service's rate limit.
//!
//! # Retry schedule
//!
//! | Error | Wait before next attempt |
//! |-------|--------------------------|
//! | [`LlmError::Connection`] | fixed (1 s) |
//! | [`LlmError::RateLimited`] | `(attempt + 1) × 2 s` |
//! | [`LlmError::Api`] | `(attempt + 2) s` |
//! | [`LlmError::Unexpected`] | give up |
//!
//! `attempt` is zero-based. A file that never succeeds gets both fields
//! absent; enrichment never fails the run.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::clock::{Pacer, Sleeper};
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::MetadataModel;
use crate::models::{DocumentMetadata, EnrichedRecord, ExtractedText};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub connection_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            connection_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// How long to wait after `error` on zero-based `attempt`, or `None` to
    /// stop retrying.
    pub fn backoff(&self, attempt: u32, error: &LlmError) -> Option<Duration> {
        match error {
            LlmError::Connection(_) => Some(self.connection_backoff),
            LlmError::RateLimited(_) => Some(Duration::from_secs(u64::from(attempt + 1) * 2)),
            LlmError::Api { .. } => Some(Duration::from_secs(u64::from(attempt) + 2)),
            LlmError::Unexpected(_) => None,
        }
    }
}

pub struct Enricher {
    model: Arc<dyn MetadataModel>,
    policy: RetryPolicy,
    pause: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl Enricher {
    pub fn new(
        model: Arc<dyn MetadataModel>,
        policy: RetryPolicy,
        pause: Duration,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            model,
            policy,
            pause,
            sleeper,
        }
    }

    pub fn from_config(
        model: Arc<dyn MetadataModel>,
        config: &LlmConfig,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let policy = RetryPolicy {
            max_attempts: config.max_attempts,
            ..RetryPolicy::default()
        };
        Self::new(model, policy, config.pause(), sleeper)
    }

    /// Enrich every record, sequentially, preserving order and length.
    pub async fn enrich_all(&self, records: Vec<ExtractedText>) -> Vec<EnrichedRecord> {
        let mut pacer = Pacer::new(self.pause, self.sleeper.clone());
        let mut out = Vec::with_capacity(records.len());

        for record in records {
            pacer.wait().await;

            let name = record
                .file
                .local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| record.file_id().to_string());

            let metadata = if record.text.is_empty() {
                info!(stage = "enrich", file = %name, "No text, skipping model call");
                DocumentMetadata::default()
            } else {
                info!(stage = "enrich", file = %name, model = self.model.model_name(), "Extracting metadata");
                let meta = self.extract_with_retry(&record.text).await;
                if meta.title.is_none() {
                    warn!(stage = "enrich", file = %name, "Could not extract metadata");
                } else {
                    info!(stage = "enrich", file = %name, title = meta.title.as_deref().unwrap_or_default(), "Extracted metadata");
                }
                meta
            };

            out.push(EnrichedRecord::new(record, metadata));
        }

        out
    }

    /// Call the model under the retry policy. Never fails.
    pub async fn extract_with_retry(&self, text: &str) -> DocumentMetadata {
        for attempt in 0..self.policy.max_attempts {
            let error = match self.model.extract_metadata(text).await {
                Ok(meta) => return meta,
                Err(e) => e,
            };

            let Some(delay) = self.policy.backoff(attempt, &error) else {
                warn!(stage = "enrich", attempt = attempt + 1, error = %error, "Giving up on document");
                return DocumentMetadata::default();
            };

            warn!(
                stage = "enrich",
                attempt = attempt + 1,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Model call failed"
            );

            if attempt + 1 < self.policy.max_attempts {
                self.sleeper.sleep(delay).await;
            }
        }

        DocumentMetadata::default()
    }
}
