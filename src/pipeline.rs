//! Harvest pipeline orchestration.
//!
//! Runs the stages strictly in sequence over whole batches:
//! locate → fetch → extract → enrich → persist. Each stage hands whatever it
//! produced to the next one; only configuration, channel lookup, storage
//! directory and database readiness failures abort the run.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::clock::{Sleeper, TokioSleeper};
use crate::config::Config;
use crate::enrich::Enricher;
use crate::extract::extract_all;
use crate::fetch::fetch_attachments;
use crate::llm::{MetadataModel, OpenAiModel};
use crate::slack::{AttachmentSource, SlackClient};
use crate::store::{self, MemoryStore, PgStore, RecordStore};

/// The collaborators a run talks to.
pub struct Pipeline {
    pub source: Arc<dyn AttachmentSource>,
    pub model: Arc<dyn MetadataModel>,
    pub store: Arc<dyn RecordStore>,
    pub sleeper: Arc<dyn Sleeper>,
}

impl Pipeline {
    /// Production wiring: Slack, OpenAI, and PostgreSQL (or memory for dry runs).
    pub fn from_config(config: &Config, dry_run: bool) -> Result<Self> {
        let source = SlackClient::new(&config.slack).context("Failed to build Slack client")?;
        let model = OpenAiModel::new(&config.llm).context("Failed to build model client")?;
        let store: Arc<dyn RecordStore> = if dry_run {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(PgStore::new(&config.db))
        };
        Ok(Self {
            source: Arc::new(source),
            model: Arc::new(model),
            store,
            sleeper: Arc::new(TokioSleeper),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Process at most this many attachments.
    pub limit: Option<usize>,
}

/// Aggregate counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub found: usize,
    pub downloaded: usize,
    pub reused: usize,
    pub download_failed: usize,
    pub extracted: usize,
    /// Extracted documents with non-empty text.
    pub with_text: usize,
    /// Enriched documents whose title was found.
    pub enriched: usize,
    pub persisted: usize,
}

/// Prepare the database: readiness probe, then schema.
pub async fn prepare_store(
    config: &Config,
    store: &dyn RecordStore,
    sleeper: &dyn Sleeper,
) -> Result<()> {
    store::wait_until_ready(
        store,
        config.db.ready_attempts,
        config.db.ready_delay(),
        sleeper,
    )
    .await?;
    store.ensure_schema().await?;
    info!(stage = "persist", "Schema ready");
    Ok(())
}

/// Run every stage once.
pub async fn run_pipeline(
    config: &Config,
    pipeline: &Pipeline,
    options: &RunOptions,
) -> Result<RunSummary> {
    let span = info_span!("run", run_id = %Uuid::new_v4());
    run_stages(config, pipeline, options).instrument(span).await
}

async fn run_stages(
    config: &Config,
    pipeline: &Pipeline,
    options: &RunOptions,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    prepare_store(config, pipeline.store.as_ref(), pipeline.sleeper.as_ref()).await?;

    // Locate
    let channel_id = pipeline.source.channel_id(&config.slack.channel).await?;
    let mut attachments = pipeline.source.pdf_attachments(&channel_id).await?;
    if let Some(limit) = options.limit {
        attachments.truncate(limit);
    }
    summary.found = attachments.len();
    info!(stage = "locate", channel = %config.slack.channel, channel_id = %channel_id, found = summary.found, "Located PDF attachments");

    // Fetch
    let fetched = fetch_attachments(
        pipeline.source.as_ref(),
        &config.storage.root,
        &attachments,
    )
    .await?;
    summary.downloaded = fetched.downloaded;
    summary.reused = fetched.reused;
    summary.download_failed = fetched.failed;
    info!(
        stage = "fetch",
        downloaded = fetched.downloaded,
        reused = fetched.reused,
        failed = fetched.failed,
        "Fetched attachments"
    );

    // Extract
    let extracted = extract_all(fetched.files, config.extract.workers).await;
    summary.extracted = extracted.len();
    summary.with_text = extracted.iter().filter(|r| r.text_length > 0).count();
    info!(stage = "extract", processed = summary.extracted, with_text = summary.with_text, "Extracted text");

    // Enrich
    let enricher = Enricher::from_config(
        pipeline.model.clone(),
        &config.llm,
        pipeline.sleeper.clone(),
    );
    let enriched = enricher.enrich_all(extracted).await;
    summary.enriched = enriched.iter().filter(|r| r.title.is_some()).count();
    info!(stage = "enrich", records = enriched.len(), with_title = summary.enriched, "Enriched metadata");

    // Persist
    summary.persisted = store::persist_all(pipeline.store.as_ref(), &enriched).await;
    info!(stage = "persist", persisted = summary.persisted, "Persisted records");

    Ok(summary)
}

/// CLI entry point for `harvest run`.
pub async fn run_harvest(config: &Config, dry_run: bool, limit: Option<usize>) -> Result<()> {
    let pipeline = Pipeline::from_config(config, dry_run)?;
    let summary = run_pipeline(config, &pipeline, &RunOptions { limit }).await?;

    if dry_run {
        println!("harvest {} (dry-run)", config.slack.channel);
    } else {
        println!("harvest {}", config.slack.channel);
    }
    println!("  attachments found: {}", summary.found);
    println!("  downloaded: {}", summary.downloaded);
    println!("  already present: {}", summary.reused);
    if summary.download_failed > 0 {
        println!("  download failures: {}", summary.download_failed);
    }
    println!("  text extracted: {} / {}", summary.with_text, summary.extracted);
    println!("  metadata found: {}", summary.enriched);
    println!("  records persisted: {}", summary.persisted);
    println!("ok");
    Ok(())
}

/// CLI entry point for `harvest init`.
pub async fn run_init(config: &Config) -> Result<()> {
    let store = PgStore::new(&config.db);
    prepare_store(config, &store, &TokioSleeper).await?;
    println!("Database initialized successfully.");
    Ok(())
}
