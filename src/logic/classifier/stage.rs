//! Semantic stage with graceful degradation
//!
//! Wraps a `ChangeClassifier` and decides, per comparison, whether to call it
//! at all and what to answer when it cannot be used:
//! - skipped: no classifier, identical content, or change below the noise floor
//! - level 1: classifier answered
//! - level 2: classifier failed, timed out, hit quota, or the run budget is spent
//! - level 3: captures are not comparable as images

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CHANGE_THRESHOLD, DEFAULT_CLASSIFIER_MAX_CALLS, DEFAULT_CLASSIFIER_TIMEOUT_SECS,
    DEFAULT_NOISE_FLOOR,
};
use crate::logic::capture::Capture;
use crate::logic::diff::ComparisonResult;

use super::prompt::{instruction, parse_response};
use super::retry::RetryPolicy;
use super::types::{ClassificationRequest, ClassificationResult};
use super::ChangeClassifier;

// ============================================================================
// CALL BUDGET
// ============================================================================

/// Caps classifier invocations for one run, shared by all targets
#[derive(Debug)]
pub struct CallBudget {
    limit: u32,
    used: AtomicU32,
}

impl CallBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            used: AtomicU32::new(0),
        }
    }

    /// Take one call from the budget, false once it is spent
    pub fn try_acquire(&self) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.limit).then_some(used + 1)
            })
            .is_ok()
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used())
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone)]
pub struct StageSettings {
    pub noise_floor: f32,
    pub change_threshold: f32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub max_calls: u32,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            noise_floor: DEFAULT_NOISE_FLOOR,
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
            timeout: Duration::from_secs(DEFAULT_CLASSIFIER_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            max_calls: DEFAULT_CLASSIFIER_MAX_CALLS,
        }
    }
}

// ============================================================================
// STAGE
// ============================================================================

pub struct SemanticStage {
    classifier: Option<Arc<dyn ChangeClassifier>>,
    settings: StageSettings,
    budget: CallBudget,
}

impl SemanticStage {
    pub fn new(classifier: Arc<dyn ChangeClassifier>, settings: StageSettings) -> Self {
        let budget = CallBudget::new(settings.max_calls);
        Self {
            classifier: Some(classifier),
            settings,
            budget,
        }
    }

    /// No classifier: the policy falls back to the pixel threshold
    pub fn disabled(settings: StageSettings) -> Self {
        let budget = CallBudget::new(0);
        Self {
            classifier: None,
            settings,
            budget,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn budget(&self) -> &CallBudget {
        &self.budget
    }

    pub fn settings(&self) -> &StageSettings {
        &self.settings
    }

    /// Classify one comparison. `None` means the stage was skipped.
    pub async fn classify(
        &self,
        context: &str,
        old: Option<&Capture>,
        new: &Capture,
        comparison: &ComparisonResult,
    ) -> Option<ClassificationResult> {
        let target_id = new.target_id();

        if comparison.same_content {
            return None;
        }

        let classifier = self.classifier.as_ref()?;

        let old = match old {
            Some(old) if !comparison.dimension_mismatch => old,
            _ => {
                log::info!("[{}] captures not comparable as images, using content hash", target_id);
                return Some(ClassificationResult::hash_only(comparison.same_content));
            }
        };

        if comparison.changed_fraction <= self.settings.noise_floor {
            log::debug!(
                "[{}] {:.4}% changed is below the noise floor, classifier skipped",
                target_id,
                comparison.percent()
            );
            return None;
        }

        if !self.budget.try_acquire() {
            log::warn!(
                "[{}] classifier budget of {} calls spent, degrading to pixel threshold",
                target_id,
                self.budget.limit()
            );
            return Some(self.pixel_fallback(comparison, "call budget spent"));
        }

        let request = ClassificationRequest {
            target_id,
            context,
            before: old.bytes(),
            after: new.bytes(),
            changed_fraction: comparison.changed_fraction,
            instruction: instruction(context, comparison.changed_fraction),
        };

        let outcome = self
            .settings
            .retry
            .run(target_id, self.settings.timeout, || classifier.classify(&request))
            .await;

        match outcome {
            Ok(text) => {
                let (verdict, rationale) = parse_response(&text);
                log::info!(
                    "[{}] {} says {}: {}",
                    target_id,
                    classifier.name(),
                    verdict,
                    rationale
                );
                Some(ClassificationResult::full(verdict, rationale))
            }
            Err(e) => {
                log::warn!(
                    "[{}] {} unavailable ({}), degrading to pixel threshold",
                    target_id,
                    classifier.name(),
                    e
                );
                Some(self.pixel_fallback(comparison, &e.to_string()))
            }
        }
    }

    fn pixel_fallback(&self, comparison: &ComparisonResult, reason: &str) -> ClassificationResult {
        ClassificationResult::pixel_only(
            comparison.changed_fraction,
            self.settings.change_threshold,
            reason,
        )
    }
}
