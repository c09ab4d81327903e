//! PDF text extraction.
//!
//! Each local PDF is read, its pages are extracted in document order with
//! `pdf-extract`, and the joined text is written next to the PDF as
//! `<stem>.txt`. Extraction runs on tokio's blocking pool, bounded by a
//! semaphore so at most `workers` files are parsed at once.
//!
//! Failure is never propagated: a corrupt or unreadable file yields empty
//! text (length 0) and an empty sibling file.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, warn, Span};

use crate::error::ExtractError;
use crate::models::{ExtractedText, LocalFile};

/// Placed between consecutive pages (form feed, as `pdftotext` does).
pub const PAGE_SEPARATOR: &str = "\x0c";

/// Extension of the sibling text file.
pub const TEXT_EXTENSION: &str = "txt";

/// Extract every file on a pool of `workers` threads.
///
/// Output order matches input order regardless of which file finishes first.
pub async fn extract_all(files: Vec<LocalFile>, workers: usize) -> Vec<ExtractedText> {
    if files.is_empty() {
        info!(stage = "extract", "No files to process");
        return Vec::new();
    }

    info!(stage = "extract", files = files.len(), workers, "Extracting PDF text");

    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let dispatch = tracing::dispatcher::get_default(|d| d.clone());
    let mut handles = Vec::with_capacity(files.len());

    for file in files {
        let permit = permits.clone().acquire_owned().await.ok();
        let dispatch = dispatch.clone();
        let span = Span::current();
        let fallback = file.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            tracing::dispatcher::with_default(&dispatch, || span.in_scope(|| process_file(file)))
        });
        handles.push((fallback, handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (fallback, handle) in handles {
        match handle.await {
            Ok(record) => results.push(record),
            Err(e) => {
                warn!(stage = "extract", file_id = %fallback.attachment.id, error = %e, "Extraction worker failed");
                results.push(empty_record(fallback));
            }
        }
    }
    results
}

/// Extract one file and write its sibling text file.
pub fn process_file(file: LocalFile) -> ExtractedText {
    let path = file.local_path.clone();
    let name = display_name(&path);

    let text = match read_pdf_text(&path) {
        Ok(text) => text,
        Err(e) => {
            warn!(stage = "extract", file = %name, error = %e, "Could not process PDF file");
            String::new()
        }
    };

    let text_path = text_path_for(&path);
    if let Err(e) = std::fs::write(&text_path, &text) {
        warn!(stage = "extract", file = %name, path = %text_path.display(), error = %e, "Could not write text file");
    }

    let record = ExtractedText::new(file, text, text_path);
    info!(stage = "extract", file = %name, chars = record.text_length, "Extracted text");
    record
}

/// Path of the text file that sits next to `pdf_path`.
///
/// Never equal to `pdf_path`: a download already named `*.txt` gets a second
/// `.txt` suffix instead of having its extension replaced.
pub fn text_path_for(pdf_path: &Path) -> PathBuf {
    let already_text = pdf_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(TEXT_EXTENSION));
    if !already_text {
        return pdf_path.with_extension(TEXT_EXTENSION);
    }
    let mut name = pdf_path.as_os_str().to_owned();
    name.push(".");
    name.push(TEXT_EXTENSION);
    PathBuf::from(name)
}

pub fn read_pdf_text(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let pages = extract_pages(&bytes)?;
    Ok(pages.join(PAGE_SEPARATOR))
}

/// Per-page text in document order.
///
/// `pdf-extract` can panic on malformed input; that is reported as an error.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    match catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    })) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Panicked),
    }
}

fn empty_record(file: LocalFile) -> ExtractedText {
    let text_path = text_path_for(&file.local_path);
    if let Err(e) = std::fs::write(&text_path, "") {
        warn!(stage = "extract", path = %text_path.display(), error = %e, "Could not write text file");
    }
    ExtractedText::new(file, String::new(), text_path)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::attachment;

    /// Minimal PDF with one Helvetica text run per page.
    fn pdf_with_pages(phrases: &[&str]) -> Vec<u8> {
        let n = phrases.len();
        let font_obj = 3 + 2 * n;
        let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();

        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), n),
        ];
        for (i, phrase) in phrases.iter().enumerate() {
            let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 {} 0 R >> >> >>",
                4 + 2 * i,
                font_obj
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            ));
        }
        objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, body).as_bytes());
        }
        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for off in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_start
            )
            .as_bytes(),
        );
        out
    }

    fn local(dir: &Path, id: &str, bytes: &[u8]) -> LocalFile {
        let path = dir.join(format!("{}_paper.pdf", id));
        std::fs::write(&path, bytes).unwrap();
        LocalFile {
            attachment: attachment(id, "paper.pdf"),
            local_path: path,
        }
    }

    #[test]
    fn pages_joined_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let file = local(
            tmp.path(),
            "F1",
            &pdf_with_pages(&["first page phrase", "second page phrase"]),
        );

        let rec = process_file(file);
        let first = rec.text.find("first page phrase").expect("page 1 text");
        let second = rec.text.find("second page phrase").expect("page 2 text");
        let sep = rec.text.find(PAGE_SEPARATOR).expect("page separator");
        assert!(first < sep && sep < second);
        assert_eq!(rec.text_length, rec.text.chars().count() as i64);
        assert_eq!(rec.text_path, tmp.path().join("F1_paper.txt"));
        assert_eq!(std::fs::read_to_string(&rec.text_path).unwrap(), rec.text);
    }

    #[test]
    fn text_named_download_keeps_its_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes = pdf_with_pages(&["notes in disguise"]);
        let path = tmp.path().join("F1_notes.TXT");
        std::fs::write(&path, &bytes).unwrap();
        let file = LocalFile {
            attachment: attachment("F1", "notes.TXT"),
            local_path: path.clone(),
        };

        let rec = process_file(file);
        assert_eq!(rec.text_path, tmp.path().join("F1_notes.TXT.txt"));
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
        assert!(rec.text.contains("notes in disguise"));
        assert_eq!(std::fs::read_to_string(&rec.text_path).unwrap(), rec.text);
    }

    #[test]
    fn text_path_replaces_other_extensions() {
        assert_eq!(
            text_path_for(Path::new("/data/F1_paper.pdf")),
            PathBuf::from("/data/F1_paper.txt")
        );
        assert_eq!(
            text_path_for(Path::new("/data/F2_draft")),
            PathBuf::from("/data/F2_draft.txt")
        );
        assert_eq!(
            text_path_for(Path::new("/data/F3_notes.txt")),
            PathBuf::from("/data/F3_notes.txt.txt")
        );
    }

    #[test]
    fn corrupt_pdf_yields_empty_text_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = local(tmp.path(), "F2", b"this is not a pdf at all");

        let rec = process_file(file);
        assert_eq!(rec.text, "");
        assert_eq!(rec.text_length, 0);
        assert!(rec.text_path.exists());
        assert_eq!(std::fs::read_to_string(&rec.text_path).unwrap(), "");
    }

    #[test]
    fn missing_file_yields_empty_text() {
        let tmp = tempfile::tempdir().unwrap();
        let file = LocalFile {
            attachment: attachment("F3", "gone.pdf"),
            local_path: tmp.path().join("F3_gone.pdf"),
        };
        let rec = process_file(file);
        assert_eq!(rec.text_length, 0);
        assert!(tmp.path().join("F3_gone.txt").exists());
    }

    #[test]
    fn invalid_bytes_return_error() {
        assert!(extract_pages(b"not a pdf").is_err());
    }

    #[tokio::test]
    async fn empty_input_returns_empty() {
        assert!(extract_all(Vec::new(), 3).await.is_empty());
    }

    #[tokio::test]
    async fn output_order_matches_input() {
        let tmp = tempfile::tempdir().unwrap();
        let files: Vec<LocalFile> = (0..6)
            .map(|i| {
                let bytes = if i % 2 == 0 {
                    pdf_with_pages(&[&format!("document number {}", i)])
                } else {
                    b"garbage".to_vec()
                };
                local(tmp.path(), &format!("F{}", i), &bytes)
            })
            .collect();
        let ids: Vec<String> = files.iter().map(|f| f.attachment.id.clone()).collect();

        let out = extract_all(files, 2).await;
        let out_ids: Vec<String> = out.iter().map(|r| r.file_id().to_string()).collect();
        assert_eq!(out_ids, ids);
        assert!(out[0].text.contains("document number 0"));
        assert_eq!(out[1].text_length, 0);
    }
}
