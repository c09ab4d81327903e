//! Persistence layer.
//!
//! The [`RecordStore`] trait covers what the pipeline needs from storage:
//! a readiness probe, idempotent schema setup, and an upsert keyed by the
//! external file id. [`PgStore`] is the PostgreSQL backend; [`MemoryStore`]
//! backs dry runs and tests.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`ping`](RecordStore::ping) | Trivial round trip |
//! | [`ensure_schema`](RecordStore::ensure_schema) | Create `pdf_data` if missing |
//! | [`upsert`](RecordStore::upsert) | Insert or update one record |
//! | [`get`](RecordStore::get) | Read a row back by file id |

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

use crate::clock::Sleeper;
use crate::models::{EnrichedRecord, PersistedRow};

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// Safe to call on every run.
    async fn ensure_schema(&self) -> Result<()>;

    /// Insert or update the row for `record`'s file id; returns the row id.
    ///
    /// On conflict only title, publication date, size, text length and the
    /// modification time change.
    async fn upsert(&self, record: &EnrichedRecord) -> Result<i64>;

    async fn get(&self, file_id: &str) -> Result<Option<PersistedRow>>;
}

/// Poll [`RecordStore::ping`] until it succeeds or `attempts` run out.
pub async fn wait_until_ready(
    store: &dyn RecordStore,
    attempts: u32,
    delay: Duration,
    sleeper: &dyn Sleeper,
) -> Result<()> {
    for attempt in 1..=attempts {
        match store.ping().await {
            Ok(()) => {
                info!(stage = "persist", attempt, "Database ready");
                return Ok(());
            }
            Err(e) => {
                warn!(stage = "persist", attempt, attempts, error = %format!("{:#}", e), "Database not ready yet");
                if attempt < attempts {
                    sleeper.sleep(delay).await;
                }
            }
        }
    }
    bail!("database not ready after {} attempts", attempts)
}

/// Upsert one record, logging instead of failing.
pub async fn upsert_record(store: &dyn RecordStore, record: &EnrichedRecord) -> Option<i64> {
    let file_id = &record.attachment().id;
    match store.upsert(record).await {
        Ok(id) => {
            info!(stage = "persist", file_id = %file_id, row_id = id, "Inserted/updated document");
            Some(id)
        }
        Err(e) => {
            warn!(stage = "persist", file_id = %file_id, error = %format!("{:#}", e), "Could not insert record");
            None
        }
    }
}

/// Upsert every record; returns how many were written.
pub async fn persist_all(store: &dyn RecordStore, records: &[EnrichedRecord]) -> usize {
    let mut written = 0;
    for record in records {
        if upsert_record(store, record).await.is_some() {
            written += 1;
        }
    }
    written
}
