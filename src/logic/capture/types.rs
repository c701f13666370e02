//! Capture Types
//!
//! One raw observation of a target. Immutable once produced.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ============================================================================
// CAPTURE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    target_id: String,
    bytes: Vec<u8>,
    captured_at: DateTime<Utc>,
}

impl Capture {
    pub fn new(target_id: impl Into<String>, bytes: Vec<u8>, captured_at: DateTime<Utc>) -> Self {
        Self {
            target_id: target_id.into(),
            bytes,
            captured_at,
        }
    }

    /// Capture stamped with the current time
    pub fn now(target_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(target_id, bytes, Utc::now())
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// SHA-256 of the raw bytes, lowercase hex
    pub fn content_hash(&self) -> String {
        content_hash(&self.bytes)
    }

    /// Reject captures that cannot be compared at all
    pub fn ensure_usable(&self) -> Result<(), CaptureError> {
        if self.bytes.is_empty() {
            return Err(CaptureError::Unusable {
                target: self.target_id.clone(),
                reason: "capture is empty".to_string(),
            });
        }
        Ok(())
    }
}

pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture for '{target}' unusable: {reason}")]
    Unusable { target: String, reason: String },

    #[error("no capture found for '{0}'")]
    Missing(String),

    #[error("capture IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture fetch failed: {0}")]
    Http(String),
}
