//! PostgreSQL-backed [`RecordStore`].
//!
//! Holds a single long-lived connection, opened lazily on first use so the
//! readiness probe also covers a server that is still starting. A failed
//! ping drops the connection and the next call reconnects.

use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tokio::sync::Mutex;

use crate::config::DbConfig;
use crate::models::{EnrichedRecord, PersistedRow};

use super::RecordStore;

pub const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS pdf_data (
    id BIGSERIAL PRIMARY KEY,
    file_id VARCHAR(64) UNIQUE NOT NULL,
    file_name TEXT NOT NULL,
    title TEXT,
    publication_date TEXT,
    url TEXT,
    pdf_size BIGINT,
    pdf_path TEXT,
    text_length BIGINT,
    text_path TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    modified_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const UPSERT_SQL: &str = r#"
INSERT INTO pdf_data (
    file_id, file_name, title, publication_date, url,
    pdf_size, pdf_path, text_length, text_path
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
ON CONFLICT (file_id) DO UPDATE SET
    title = EXCLUDED.title,
    publication_date = EXCLUDED.publication_date,
    pdf_size = EXCLUDED.pdf_size,
    text_length = EXCLUDED.text_length,
    modified_at = now()
RETURNING id
"#;

const SELECT_SQL: &str = r#"
SELECT id, file_id, file_name, title, publication_date, url,
       pdf_size, pdf_path, text_length, text_path, created_at, modified_at
FROM pdf_data
WHERE file_id = $1
"#;

pub struct PgStore {
    options: PgConnectOptions,
    conn: Mutex<Option<PgConnection>>,
}

impl PgStore {
    pub fn new(config: &DbConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);
        Self::with_options(options)
    }

    /// Build from a `postgres://` URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let options = PgConnectOptions::from_str(url).context("Invalid database URL")?;
        Ok(Self::with_options(options))
    }

    fn with_options(options: PgConnectOptions) -> Self {
        Self {
            options,
            conn: Mutex::new(None),
        }
    }

    async fn connected<'a>(&self, slot: &'a mut Option<PgConnection>) -> Result<&'a mut PgConnection> {
        if slot.is_none() {
            let conn = PgConnection::connect_with(&self.options)
                .await
                .context("Failed to connect to database")?;
            *slot = Some(conn);
        }
        slot.as_mut()
            .ok_or_else(|| anyhow!("database connection unavailable"))
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn ping(&self) -> Result<()> {
        let mut slot = self.conn.lock().await;
        let conn = self.connected(&mut slot).await?;
        let result: Result<String, sqlx::Error> = sqlx::query_scalar("SELECT version()")
            .fetch_one(&mut *conn)
            .await;
        if let Err(e) = result {
            *slot = None;
            return Err(e).context("Database ping failed");
        }
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        let mut slot = self.conn.lock().await;
        let conn = self.connected(&mut slot).await?;
        sqlx::query(CREATE_TABLE_SQL)
            .execute(&mut *conn)
            .await
            .context("Error creating schema")?;
        Ok(())
    }

    async fn upsert(&self, record: &EnrichedRecord) -> Result<i64> {
        let att = record.attachment();
        let mut slot = self.conn.lock().await;
        let conn = self.connected(&mut slot).await?;
        let id: i64 = sqlx::query_scalar(UPSERT_SQL)
            .bind(&att.id)
            .bind(&att.name)
            .bind(&record.title)
            .bind(&record.publication_date)
            .bind(&att.url)
            .bind(att.size)
            .bind(record.extracted.file.local_path.display().to_string())
            .bind(record.extracted.text_length)
            .bind(record.extracted.text_path.display().to_string())
            .fetch_one(&mut *conn)
            .await?;
        Ok(id)
    }

    async fn get(&self, file_id: &str) -> Result<Option<PersistedRow>> {
        let mut slot = self.conn.lock().await;
        let conn = self.connected(&mut slot).await?;
        let row = sqlx::query_as::<_, PersistedRow>(SELECT_SQL)
            .bind(file_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }
}
