//! Classifier Types
//!
//! Core types for semantic classification.
//! No logic beyond small helpers.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// VERDICT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassifierVerdict {
    Change,
    NoChange,
    Uncertain,
}

impl ClassifierVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierVerdict::Change => "CHANGE",
            ClassifierVerdict::NoChange => "NO_CHANGE",
            ClassifierVerdict::Uncertain => "UNCERTAIN",
        }
    }
}

impl std::fmt::Display for ClassifierVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// FALLBACK LEVEL
// ============================================================================

/// How far the classification strategy degraded
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackLevel {
    /// Semantic classification answered
    Full,
    /// Classifier unavailable, pixel fraction vs threshold
    PixelOnly,
    /// Captures unusable as images, content hash equality
    HashOnly,
}

impl FallbackLevel {
    pub fn level(&self) -> u8 {
        match self {
            FallbackLevel::Full => 1,
            FallbackLevel::PixelOnly => 2,
            FallbackLevel::HashOnly => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackLevel::Full => "full",
            FallbackLevel::PixelOnly => "pixel_only",
            FallbackLevel::HashOnly => "hash_only",
        }
    }
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub verdict: ClassifierVerdict,
    pub rationale: String,
    /// Any parsed CHANGE / NO_CHANGE answer is confident; UNCERTAIN is not
    pub confident: bool,
    pub fallback_level: FallbackLevel,
}

impl ClassificationResult {
    pub fn full(verdict: ClassifierVerdict, rationale: impl Into<String>) -> Self {
        Self {
            verdict,
            rationale: rationale.into(),
            confident: verdict != ClassifierVerdict::Uncertain,
            fallback_level: FallbackLevel::Full,
        }
    }

    /// Level 2: threshold the pixel fraction
    pub fn pixel_only(changed_fraction: f32, change_threshold: f32, reason: &str) -> Self {
        let verdict = if changed_fraction > change_threshold {
            ClassifierVerdict::Change
        } else {
            ClassifierVerdict::NoChange
        };

        Self {
            verdict,
            rationale: format!(
                "Degraded mode ({}): {:.3}% pixels changed (threshold: {:.3}%)",
                reason,
                changed_fraction * 100.0,
                change_threshold * 100.0
            ),
            confident: true,
            fallback_level: FallbackLevel::PixelOnly,
        }
    }

    /// Level 3: only the content hash can be trusted
    pub fn hash_only(same_hash: bool) -> Self {
        let (verdict, rationale) = if same_hash {
            (ClassifierVerdict::NoChange, "Degraded mode (hash only): content hash unchanged")
        } else {
            (ClassifierVerdict::Change, "Degraded mode (hash only): content hash changed")
        };

        Self {
            verdict,
            rationale: rationale.to_string(),
            confident: true,
            fallback_level: FallbackLevel::HashOnly,
        }
    }
}

// ============================================================================
// REQUEST
// ============================================================================

/// Everything the external service sees for one comparison
#[derive(Debug, Clone)]
pub struct ClassificationRequest<'a> {
    pub target_id: &'a str,
    /// Human-readable label for the prompt (company / page name)
    pub context: &'a str,
    pub before: &'a [u8],
    pub after: &'a [u8],
    pub changed_fraction: f32,
    pub instruction: String,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("classifier quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("classifier rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("classifier unavailable (HTTP {status})")]
    Unavailable { status: u16 },

    #[error("classifier rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("classifier rejected credentials")]
    Unauthorized,

    #[error("classifier transport error: {0}")]
    Transport(String),

    #[error("malformed classifier response: {0}")]
    Malformed(String),

    #[error("classifier cannot read input: {0}")]
    UnsupportedInput(String),
}

impl ClassifierError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClassifierError::Timeout(_)
                | ClassifierError::RateLimited { .. }
                | ClassifierError::Unavailable { .. }
                | ClassifierError::Transport(_)
        )
    }

    pub fn suggested_backoff(&self) -> Option<Duration> {
        match self {
            ClassifierError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
