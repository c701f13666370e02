//! Policy Engine
//!
//! Decision logic only - no type definitions.
//! Input: ComparisonResult + optional ClassificationResult + prior state
//! Output: DecisionRecord

use chrono::{DateTime, Utc};

use crate::logic::classifier::{ClassificationResult, ClassifierVerdict};
use crate::logic::diff::ComparisonResult;
use super::config::PolicyConfig;
use super::types::*;

// ============================================================================
// SIGNAL
// ============================================================================

/// Collapse one cycle's evidence into a single signal
pub fn effective_signal(
    comparison: &ComparisonResult,
    classification: Option<&ClassificationResult>,
    config: &PolicyConfig,
) -> Signal {
    if comparison.same_content {
        return Signal::Negative;
    }

    match classification {
        Some(c) if !c.confident || c.verdict == ClassifierVerdict::Uncertain => Signal::Uncertain,
        Some(c) if c.verdict == ClassifierVerdict::Change => Signal::Positive,
        Some(_) => Signal::Negative,
        None if comparison.changed_fraction > config.change_threshold => Signal::Positive,
        None => Signal::Negative,
    }
}

fn evidence(comparison: &ComparisonResult, classification: Option<&ClassificationResult>) -> String {
    match classification {
        Some(c) => format!("{} [{}] {}", c.verdict, c.fallback_level.as_str(), c.rationale),
        None => comparison.describe(),
    }
}

// ============================================================================
// MAIN DECISION FUNCTION
// ============================================================================

/// Decide this cycle's verdict. Pure: the caller persists the result.
pub fn decide(
    target_id: &str,
    comparison: &ComparisonResult,
    classification: Option<&ClassificationResult>,
    prior: Option<&PriorState>,
    config: &PolicyConfig,
    now: DateTime<Utc>,
) -> DecisionRecord {
    let mut record = DecisionRecord {
        target_id: target_id.to_string(),
        decided_at: now,
        verdict: DecisionVerdict::ColdStart,
        consecutive_count: 0,
        uncertain_streak: 0,
        episode_notified: false,
        notify: false,
        signal: None,
        rationale: String::new(),
    };

    let prior = match prior {
        Some(p) => p,
        None => {
            record.rationale = "First observation, baseline recorded".to_string();
            return record;
        }
    };

    let signal = effective_signal(comparison, classification, config);
    let why = evidence(comparison, classification);
    let window = config.window();
    record.signal = Some(signal);

    match signal {
        Signal::Negative => {
            record.verdict = DecisionVerdict::NoChange;
            record.rationale = why;
        }

        Signal::Positive => {
            let count = prior.consecutive_count + 1;

            if count >= window {
                // Counter restarts; the latch keeps a persisting change from re-notifying
                record.verdict = DecisionVerdict::ConfirmedChange;
                record.notify = !prior.episode_notified;
                record.episode_notified = true;
                record.rationale = format!("Confirmed after {} consecutive cycles: {}", count, why);
            } else {
                record.verdict = DecisionVerdict::Pending;
                record.consecutive_count = count;
                record.episode_notified = prior.episode_notified;
                record.rationale = format!("Pending {}/{}: {}", count, window, why);
            }
        }

        Signal::Uncertain if prior.consecutive_count > 0 => {
            let streak = prior.uncertain_streak + 1;

            if streak > config.uncertainty_grace_cycles {
                record.verdict = DecisionVerdict::NoChange;
                record.rationale = format!(
                    "Pending change dropped after {} uncertain cycles: {}",
                    streak, why
                );
            } else {
                record.verdict = DecisionVerdict::Pending;
                record.consecutive_count = prior.consecutive_count;
                record.uncertain_streak = streak;
                record.episode_notified = prior.episode_notified;
                record.rationale = format!(
                    "Pending {}/{} paused ({} uncertain): {}",
                    prior.consecutive_count, window, streak, why
                );
            }
        }

        Signal::Uncertain => {
            record.verdict = DecisionVerdict::NoChange;
            record.rationale = format!("Uncertain with nothing pending: {}", why);
        }
    }

    record
}

// ============================================================================
// TESTS
// ============================================================================
