//! In-memory [`RecordStore`] for dry runs and tests.
//!
//! Mirrors the PostgreSQL upsert: ids are assigned on first insert and a
//! conflicting write only touches the mutable columns.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{EnrichedRecord, PersistedRow};

use super::RecordStore;

#[derive(Default)]
struct Rows {
    by_file_id: HashMap<String, PersistedRow>,
    next_id: i64,
}

pub struct MemoryStore {
    rows: Mutex<Rows>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Rows {
                by_file_id: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().by_file_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Rows> {
        // A poisoned lock only means another test thread panicked mid-write.
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, record: &EnrichedRecord) -> Result<i64> {
        let att = record.attachment();
        let now = Utc::now();
        let mut rows = self.lock();

        if let Some(row) = rows.by_file_id.get_mut(&att.id) {
            row.title = record.title.clone();
            row.publication_date = record.publication_date.clone();
            row.pdf_size = Some(att.size);
            row.text_length = Some(record.extracted.text_length);
            row.modified_at = now;
            return Ok(row.id);
        }

        let id = rows.next_id;
        rows.next_id += 1;
        rows.by_file_id.insert(
            att.id.clone(),
            PersistedRow {
                id,
                file_id: att.id.clone(),
                file_name: att.name.clone(),
                title: record.title.clone(),
                publication_date: record.publication_date.clone(),
                url: Some(att.url.clone()),
                pdf_size: Some(att.size),
                pdf_path: Some(record.extracted.file.local_path.display().to_string()),
                text_length: Some(record.extracted.text_length),
                text_path: Some(record.extracted.text_path.display().to_string()),
                created_at: now,
                modified_at: now,
            },
        );
        Ok(id)
    }

    async fn get(&self, file_id: &str) -> Result<Option<PersistedRow>> {
        Ok(self.lock().by_file_id.get(file_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::extracted;
    use crate::models::DocumentMetadata;

    fn enriched(id: &str, text: &str, title: Option<&str>, size: i64) -> EnrichedRecord {
        let mut ex = extracted(id, text);
        ex.file.attachment.size = size;
        EnrichedRecord::new(
            ex,
            DocumentMetadata {
                title: title.map(str::to_string),
                publication_date: title.map(|_| "2024-01-01".to_string()),
            },
        )
    }

    #[tokio::test]
    async fn upsert_same_file_id_keeps_one_row() {
        let store = MemoryStore::new();
        let first_id = store
            .upsert(&enriched("F1", "short", None, 1024))
            .await
            .unwrap();
        let first = store.get("F1").await.unwrap().unwrap();

        let mut second = enriched("F1", "a longer text", Some("Example Paper"), 2048);
        second.extracted.file.attachment.name = "renamed.pdf".into();
        let second_id = store.upsert(&second).await.unwrap();
        let row = store.get("F1").await.unwrap().unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(first_id, second_id);
        assert_eq!(row.title.as_deref(), Some("Example Paper"));
        assert_eq!(row.publication_date.as_deref(), Some("2024-01-01"));
        assert_eq!(row.pdf_size, Some(2048));
        assert_eq!(row.text_length, Some(13));
        assert_eq!(row.file_name, "paper.pdf");
        assert_eq!(row.created_at, first.created_at);
        assert!(row.modified_at >= first.modified_at);
    }

    #[tokio::test]
    async fn distinct_file_ids_get_distinct_rows() {
        let store = MemoryStore::new();
        let a = store.upsert(&enriched("F1", "", None, 1)).await.unwrap();
        let b = store.upsert(&enriched("F2", "", None, 1)).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert!(store.get("F3").await.unwrap().is_none());
    }
}
