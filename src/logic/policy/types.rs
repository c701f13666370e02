//! Policy Types
//!
//! Core types for change decisions.
//! No logic here - data structures only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// VERDICT
// ============================================================================

/// Final per-cycle verdict for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionVerdict {
    /// First observation, baseline recorded only
    ColdStart,
    /// Nothing meaningful changed
    NoChange,
    /// Positive signal seen, waiting for confirmation
    Pending,
    /// Change held for the whole confirmation window
    ConfirmedChange,
}

impl DecisionVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionVerdict::ColdStart => "COLD_START",
            DecisionVerdict::NoChange => "NO_CHANGE",
            DecisionVerdict::Pending => "PENDING",
            DecisionVerdict::ConfirmedChange => "CONFIRMED_CHANGE",
        }
    }
}

impl std::fmt::Display for DecisionVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// SIGNAL
// ============================================================================

/// Effective evidence of one cycle after classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Positive,
    Negative,
    Uncertain,
}

// ============================================================================
// STATE CARRIED BETWEEN CYCLES
// ============================================================================

/// The slice of the stored snapshot the policy needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorState {
    pub verdict: DecisionVerdict,
    pub consecutive_count: u32,
    pub uncertain_streak: u32,
    /// A notification already went out for the current run of positives
    pub episode_notified: bool,
}

impl Default for PriorState {
    fn default() -> Self {
        Self {
            verdict: DecisionVerdict::NoChange,
            consecutive_count: 0,
            uncertain_streak: 0,
            episode_notified: false,
        }
    }
}

// ============================================================================
// DECISION RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub target_id: String,
    pub decided_at: DateTime<Utc>,
    pub verdict: DecisionVerdict,
    pub consecutive_count: u32,
    #[serde(default)]
    pub uncertain_streak: u32,
    #[serde(default)]
    pub episode_notified: bool,
    /// Emit exactly one notification for this record
    pub notify: bool,
    pub signal: Option<Signal>,
    pub rationale: String,
}

impl DecisionRecord {
    pub fn state(&self) -> PriorState {
        PriorState {
            verdict: self.verdict,
            consecutive_count: self.consecutive_count,
            uncertain_streak: self.uncertain_streak,
            episode_notified: self.episode_notified,
        }
    }
}
