//! Notify Module - Outbound change alerts
//!
//! One `Notification` per confirmed change episode. Delivery is best effort:
//! failures are returned to the caller, which logs them and moves on.
//!
//! ## Structure
//! - `telegram`: Telegram Bot API adapter and HTML message formatting
//! - `LogNotifier`: writes the alert to the log only

pub mod telegram;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::classifier::FallbackLevel;
use crate::logic::policy::DecisionVerdict;

pub use telegram::TelegramNotifier;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub target_id: String,
    /// Display name of the listing page
    pub label: String,
    pub url: String,
    pub verdict: DecisionVerdict,
    pub rationale: String,
    pub timestamp: DateTime<Utc>,
    pub changed_fraction: f32,
    /// `None` when the classifier was not consulted
    pub fallback_level: Option<FallbackLevel>,
    pub change_threshold: f32,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier not configured: {0}")]
    NotConfigured(String),

    #[error("notification rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("notification transport error: {0}")]
    Transport(String),
}

/// Delivery channel for confirmed changes
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;

    fn name(&self) -> &str;
}

// ============================================================================
// LOG NOTIFIER
// ============================================================================

/// Used when no delivery channel is configured
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: &Notification) -> Result<(), NotifyError> {
        log::warn!(
            "[{}] {} on {} ({:.2}% of pixels): {} <{}>",
            n.target_id,
            n.verdict,
            n.label,
            n.changed_fraction * 100.0,
            n.rationale,
            n.url
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
