//! # Paper Harvest
//!
//! Batch harvester for research papers shared in a Slack channel.
//!
//! Finds PDF attachments posted to one channel, downloads them to local
//! storage, extracts their text, asks a language model for the title and
//! publication date, and upserts one row per file into PostgreSQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌─────────┐   ┌──────────┐   ┌──────────┐   ┌────────────┐
//! │ Locate  │──▶│  Fetch  │──▶│ Extract  │──▶│  Enrich  │──▶│  Persist   │
//! │ (Slack) │   │ (disk)  │   │ (N pool) │   │  (LLM)   │   │ (Postgres) │
//! └─────────┘   └─────────┘   └──────────┘   └──────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! harvest init                  # wait for the database, create the table
//! harvest run                   # harvest the configured channel
//! harvest run --dry-run --limit 5
//! harvest get F0123ABCD         # show one stored record
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration, env overrides, validation |
//! | [`models`] | Records passed between stages |
//! | [`slack`] | Attachment locator and downloader |
//! | [`fetch`] | Idempotent local storage of attachments |
//! | [`extract`] | Bounded-parallel PDF text extraction |
//! | [`llm`] | Chat-completions metadata model |
//! | [`enrich`] | Retry and pacing around the model |
//! | [`store`] | PostgreSQL and in-memory persistence |
//! | [`pipeline`] | Stage orchestration |
//! | [`get`] | Record lookup |
//! | [`logging`] | Log output setup |

pub mod clock;
pub mod config;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod get;
pub mod llm;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod slack;
pub mod store;
