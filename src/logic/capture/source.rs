//! Capture Sources
//!
//! Adapters that hand the engine a fresh `Capture` for a target.
//! Browser automation lives outside this crate; `FileCaptureSource` picks up
//! whatever the browser job last wrote. `HttpCaptureSource` fetches the raw
//! page body for hash-only monitoring.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{Capture, CaptureError};
use crate::logic::config::TargetConfig;
use crate::logic::snapshot::sanitize_target_id;

const CAPTURE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "html"];
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const FETCH_TIMEOUT_SECS: u64 = 10;

#[async_trait]
pub trait CaptureSource: Send + Sync {
    async fn capture(&self, target: &TargetConfig) -> Result<Capture, CaptureError>;
}

// ============================================================================
// FILE SOURCE
// ============================================================================

/// Reads `<dir>/<target>.{png,jpg,jpeg,html}` or the target's explicit file
pub struct FileCaptureSource {
    dir: PathBuf,
}

impl FileCaptureSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn locate(&self, target: &TargetConfig) -> Option<PathBuf> {
        if let Some(explicit) = &target.capture_file {
            let path = if explicit.is_absolute() {
                explicit.clone()
            } else {
                self.dir.join(explicit)
            };
            return path.exists().then_some(path);
        }

        let stem = sanitize_target_id(&target.id);
        CAPTURE_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}.{}", stem, ext)))
            .find(|p| p.exists())
    }
}

#[async_trait]
impl CaptureSource for FileCaptureSource {
    async fn capture(&self, target: &TargetConfig) -> Result<Capture, CaptureError> {
        let path = self
            .locate(target)
            .ok_or_else(|| CaptureError::Missing(target.id.clone()))?;

        let bytes = tokio::fs::read(&path).await?;
        let captured_at = modified_at(&path).await.unwrap_or_else(chrono::Utc::now);

        log::debug!("[{}] read capture {:?} ({} bytes)", target.id, path, bytes.len());
        let capture = Capture::new(target.id.clone(), bytes, captured_at);
        capture.ensure_usable()?;
        Ok(capture)
    }
}

async fn modified_at(path: &Path) -> Option<chrono::DateTime<chrono::Utc>> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    meta.modified().ok().map(chrono::DateTime::<chrono::Utc>::from)
}

// ============================================================================
// HTTP SOURCE
// ============================================================================

/// Fetches the listing page body and strips per-request noise
pub struct HttpCaptureSource {
    client: reqwest::Client,
}

impl HttpCaptureSource {
    pub fn new() -> Result<Self, CaptureError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| CaptureError::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CaptureSource for HttpCaptureSource {
    async fn capture(&self, target: &TargetConfig) -> Result<Capture, CaptureError> {
        let response = self
            .client
            .get(&target.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CaptureError::Http(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| CaptureError::Http(e.to_string()))?;

        let capture = Capture::now(target.id.clone(), normalize_page(&body).into_bytes());
        capture.ensure_usable()?;
        Ok(capture)
    }
}

static NOISE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}", "SESSIONID"),
        (r"[a-f0-9]{32}", "SESSIONID"),
        (r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+Z?", "TIMESTAMP"),
        (r"_[0-9]{13}", "_TIMESTAMP"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Replace session ids and timestamps that change on every request
pub fn normalize_page(body: &str) -> String {
    NOISE_PATTERNS
        .iter()
        .fold(body.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}
