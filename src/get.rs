//! Record retrieval by file id.
//!
//! Reads one persisted `pdf_data` row back. Used by `harvest get`.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::models::PersistedRow;
use crate::store::{PgStore, RecordStore};

pub async fn get_record(store: &dyn RecordStore, file_id: &str) -> Result<PersistedRow> {
    match store.get(file_id).await? {
        Some(row) => Ok(row),
        None => bail!("record not found: {}", file_id),
    }
}

/// CLI entry point: look the row up in PostgreSQL and print it.
pub async fn run_get(config: &Config, file_id: &str) -> Result<()> {
    let store = PgStore::new(&config.db);
    let row = get_record(&store, file_id).await?;
    print!("{}", render_row(&row));
    Ok(())
}

pub fn render_row(row: &PersistedRow) -> String {
    let mut out = String::new();
    let mut line = |key: &str, value: &str| {
        out.push_str(&format!("{:<18}{}\n", format!("{}:", key), value));
    };

    line("id", &row.id.to_string());
    line("file_id", &row.file_id);
    line("file_name", &row.file_name);
    line("title", row.title.as_deref().unwrap_or("(unknown)"));
    line(
        "publication_date",
        row.publication_date.as_deref().unwrap_or("(unknown)"),
    );
    if let Some(ref url) = row.url {
        line("url", url);
    }
    if let Some(size) = row.pdf_size {
        line("pdf_size", &size.to_string());
    }
    if let Some(ref path) = row.pdf_path {
        line("pdf_path", path);
    }
    if let Some(len) = row.text_length {
        line("text_length", &len.to_string());
    }
    if let Some(ref path) = row.text_path {
        line("text_path", path);
    }
    line("created_at", &format_ts_iso(row.created_at));
    line("modified_at", &format_ts_iso(row.modified_at));
    out
}

fn format_ts_iso(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
