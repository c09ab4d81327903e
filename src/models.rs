//! Core data models used throughout the harvest pipeline.
//!
//! Each stage consumes the record produced by the previous one and wraps it:
//! [`AttachmentRef`] → [`LocalFile`] → [`ExtractedText`] → [`EnrichedRecord`].
//! [`PersistedRow`] is what the store hands back.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::PathBuf;

/// A remote file attached to a channel message, before download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    /// External file identifier (unique and stable across runs).
    pub id: String,
    /// Display name as uploaded, e.g. `paper.pdf`.
    pub name: String,
    /// Private download URL; requires the bot token.
    pub url: String,
    /// Declared size in bytes.
    pub size: i64,
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Declared file type, e.g. `pdf`.
    pub file_type: String,
}

/// An attachment whose bytes are on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub attachment: AttachmentRef,
    pub local_path: PathBuf,
}

/// A local file plus the text pulled out of it.
///
/// `text_length` is always the character count of `text`. Empty text is a
/// normal outcome for unreadable documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub file: LocalFile,
    pub text: String,
    pub text_length: i64,
    pub text_path: PathBuf,
}

impl ExtractedText {
    pub fn new(file: LocalFile, text: String, text_path: PathBuf) -> Self {
        let text_length = text.chars().count() as i64;
        Self {
            file,
            text,
            text_length,
            text_path,
        }
    }

    pub fn file_id(&self) -> &str {
        &self.file.attachment.id
    }
}

/// Bibliographic fields inferred by the language model.
///
/// Either field is `None` when the model could not determine it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub publication_date: Option<String>,
}

/// Extracted text plus inferred metadata, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRecord {
    pub extracted: ExtractedText,
    pub title: Option<String>,
    pub publication_date: Option<String>,
}

impl EnrichedRecord {
    pub fn new(extracted: ExtractedText, metadata: DocumentMetadata) -> Self {
        Self {
            extracted,
            title: metadata.title,
            publication_date: metadata.publication_date,
        }
    }

    pub fn attachment(&self) -> &AttachmentRef {
        &self.extracted.file.attachment
    }
}

/// A row of the `pdf_data` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PersistedRow {
    pub id: i64,
    pub file_id: String,
    pub file_name: String,
    pub title: Option<String>,
    pub publication_date: Option<String>,
    pub url: Option<String>,
    pub pdf_size: Option<i64>,
    pub pdf_path: Option<String>,
    pub text_length: Option<i64>,
    pub text_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}
