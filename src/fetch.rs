//! Attachment fetcher.
//!
//! Downloads attachments into a local directory as `{id}_{name}`. A file
//! that is already present is reused without a network call, so repeated
//! runs only download what is new.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::{AttachmentRef, LocalFile};
use crate::slack::AttachmentSource;

/// Result of one fetch pass.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Files now on disk, in input order.
    pub files: Vec<LocalFile>,
    pub downloaded: usize,
    /// Already present from an earlier run.
    pub reused: usize,
    pub failed: usize,
}

/// Deterministic local file name for an attachment.
///
/// The id prefix keeps same-named uploads apart. Path separators in the
/// display name are replaced so the file always lands directly in `dir`.
pub fn local_file_name(attachment: &AttachmentRef) -> String {
    let name: String = attachment
        .name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{}_{}", attachment.id, name)
}

/// Fetch every attachment into `dir`, creating it if needed.
///
/// Per-file failures are logged and counted; only a failure to create `dir`
/// is returned as an error.
pub async fn fetch_attachments(
    source: &dyn AttachmentSource,
    dir: &Path,
    attachments: &[AttachmentRef],
) -> Result<FetchOutcome> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create storage directory: {}", dir.display()))?;

    let mut outcome = FetchOutcome::default();

    for attachment in attachments {
        let path = dir.join(local_file_name(attachment));

        let exists = match tokio::fs::try_exists(&path).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(stage = "fetch", file_id = %attachment.id, path = %path.display(), error = %e, "Could not check for existing file, downloading");
                false
            }
        };
        if exists {
            info!(stage = "fetch", file_id = %attachment.id, path = %path.display(), "Already downloaded, skipping");
            outcome.reused += 1;
            outcome.files.push(LocalFile {
                attachment: attachment.clone(),
                local_path: path,
            });
            continue;
        }

        match download_to(source, attachment, &path).await {
            Ok(bytes) => {
                info!(stage = "fetch", file_id = %attachment.id, bytes, path = %path.display(), "Downloaded");
                outcome.downloaded += 1;
                outcome.files.push(LocalFile {
                    attachment: attachment.clone(),
                    local_path: path,
                });
            }
            Err(e) => {
                warn!(stage = "fetch", file_id = %attachment.id, name = %attachment.name, error = %format!("{:#}", e), "Failed to download file");
                outcome.failed += 1;
            }
        }
    }

    Ok(outcome)
}

async fn download_to(
    source: &dyn AttachmentSource,
    attachment: &AttachmentRef,
    path: &Path,
) -> Result<usize> {
    let bytes = source.download(attachment).await?;

    let partial = partial_path(path);
    tokio::fs::write(&partial, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", partial.display()))?;
    if let Err(e) = tokio::fs::rename(&partial, path).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e).with_context(|| format!("Failed to move file into {}", path.display()));
    }

    Ok(bytes.len())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
