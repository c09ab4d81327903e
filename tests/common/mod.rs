#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use paper_harvest::clock::Sleeper;
use paper_harvest::config::Config;

/// Returns at once and remembers what was asked for.
#[derive(Default)]
pub struct NoSleep {
    slept: Mutex<Vec<Duration>>,
}

impl NoSleep {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

pub fn no_sleep() -> Arc<NoSleep> {
    Arc::new(NoSleep::default())
}

/// Config pointing both remote services at `base` and storage at `root`.
pub fn test_config(base: &str, root: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.slack.bot_token = "xoxb-test".into();
    cfg.slack.channel = "research".into();
    cfg.slack.api_base = base.to_string();
    cfg.llm.api_key = "sk-test".into();
    cfg.llm.base_url = base.to_string();
    cfg.llm.pause_ms = 0;
    cfg.storage.root = root.to_path_buf();
    cfg.extract.workers = 2;
    cfg.db.ready_attempts = 1;
    cfg
}

/// Minimal PDF with one Helvetica text run per page.
pub fn pdf_with_pages(phrases: &[&str]) -> Vec<u8> {
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
