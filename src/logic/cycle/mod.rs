//! Cycle Module - One pass over all targets
//!
//! Each target runs as its own task:
//! capture -> load baseline -> diff -> classify -> decide -> notify -> persist.
//! A target that fails or panics is reported as skipped and never touches
//! its stored snapshot. Notification precedes the save, so a crash in
//! between repeats the alert on the next run rather than losing it.

pub mod report;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;

use crate::logic::capture::{CaptureError, CaptureSource};
use crate::logic::classifier::SemanticStage;
use crate::logic::config::TargetConfig;
use crate::logic::diff::{image_digest, ComparisonResult, DiffEngine};
use crate::logic::journal::DecisionJournal;
use crate::logic::notify::{Notification, Notifier};
use crate::logic::policy::{decide, DecisionRecord, PolicyConfig};
use crate::logic::snapshot::{target_file_stem, Snapshot, SnapshotStore};

pub use report::{RunReport, TargetReport, TargetStatus};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("blocking task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),

    #[error("target task aborted: {0}")]
    Aborted(String),
}

// ============================================================================
// CONTEXT
// ============================================================================

/// Everything a cycle needs, shared by all target tasks
pub struct CycleContext {
    pub store: Arc<dyn SnapshotStore>,
    pub source: Arc<dyn CaptureSource>,
    pub stage: SemanticStage,
    pub notifier: Arc<dyn Notifier>,
    pub diff: DiffEngine,
    pub policy: PolicyConfig,
    pub retain_payload: bool,
    /// Write diff masks here when set
    pub debug_dir: Option<PathBuf>,
    pub journal: Option<DecisionJournal>,
}

impl CycleContext {
    pub fn detection_method(&self) -> &'static str {
        match (self.stage.is_enabled(), self.retain_payload) {
            (true, true) => "screenshot+ai",
            (false, true) => "screenshot",
            (_, false) => "hash",
        }
    }
}

// ============================================================================
// RUN
// ============================================================================

/// Process every target concurrently and collect a report
pub async fn run_cycle(ctx: Arc<CycleContext>, targets: &[TargetConfig]) -> RunReport {
    let mut report = RunReport::new(ctx.detection_method(), ctx.policy.change_threshold);
    log::info!("Checking {} targets ({})", targets.len(), report.detection_method);

    let mut set = JoinSet::new();
    for (index, target) in targets.iter().cloned().enumerate() {
        let ctx = ctx.clone();
        set.spawn(async move {
            let id = target.id.clone();
            // Inner task so a panic surfaces as a JoinError we can attribute
            let result = match tokio::spawn(process_target(ctx, target)).await {
                Ok(result) => result,
                Err(e) => Err(TargetError::Aborted(e.to_string())),
            };
            (index, id, result)
        });
    }

    let mut outcomes = Vec::with_capacity(targets.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => log::error!("Target task lost: {}", e),
        }
    }
    outcomes.sort_by_key(|(index, _, _)| *index);

    for (_, id, result) in outcomes {
        match result {
            Ok(target_report) => report.push(target_report),
            Err(e) => {
                log::error!("[{}] skipped: {}", id, e);
                report.push(TargetReport::skipped(id, e.to_string()));
            }
        }
    }

    report.finish();
    log::info!(
        "Cycle done: {} checked, {} confirmed, {} skipped, {} classifier calls",
        report.checked(),
        report.changes(),
        report.skipped(),
        ctx.stage.budget().used()
    );
    report
}

async fn process_target(ctx: Arc<CycleContext>, target: TargetConfig) -> Result<TargetReport, TargetError> {
    let capture = ctx.source.capture(&target).await?;
    capture.ensure_usable()?;

    // Store I/O and pixel work stay off the async workers
    let (baseline, capture, comparison) = {
        let ctx = ctx.clone();
        let id = target.id.clone();
        tokio::task::spawn_blocking(move || {
            let baseline = ctx.store.load(&id);
            let comparison = match &baseline {
                Some(snapshot) => ctx.diff.compare_with_snapshot(snapshot, &capture),
                None => ComparisonResult::identical(),
            };
            (baseline, capture, comparison)
        })
        .await?
    };

    let prior = baseline.as_ref().map(Snapshot::prior_state);
    let old = baseline.as_ref().and_then(Snapshot::to_capture);

    let classification = match &baseline {
        Some(_) => {
            ctx.stage
                .classify(target.label(), old.as_ref(), &capture, &comparison)
                .await
        }
        None => None,
    };

    let record = decide(
        &target.id,
        &comparison,
        classification.as_ref(),
        prior.as_ref(),
        &ctx.policy,
        chrono::Utc::now(),
    );

    log::info!(
        "[{}] {} ({}): {}",
        target.id,
        record.verdict,
        comparison.describe(),
        record.rationale
    );

    let mut notified = false;
    if record.notify {
        let notification = Notification {
            target_id: target.id.clone(),
            label: target.label().to_string(),
            url: target.url.clone(),
            verdict: record.verdict,
            rationale: classification
                .as_ref()
                .map(|c| c.rationale.clone())
                .unwrap_or_else(|| comparison.describe()),
            timestamp: record.decided_at,
            changed_fraction: comparison.changed_fraction,
            fallback_level: classification.as_ref().map(|c| c.fallback_level),
            change_threshold: ctx.policy.change_threshold,
        };
        notified = send_notification(&ctx.notifier, notification).await;
    }

    let same_content = comparison.same_content;
    let saved = {
        let ctx = ctx.clone();
        let id = target.id.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || {
            if let (Some(dir), Some(old)) = (&ctx.debug_dir, &old) {
                if !same_content {
                    write_debug_mask(&ctx.diff, dir, &id, old.bytes(), capture.bytes());
                }
            }
            let snapshot = Snapshot::from_capture(&capture, image_digest(capture.bytes()), &record, ctx.retain_payload);
            ctx.store.save(&id, &snapshot)
        })
        .await?
    };

    let changed_fraction = baseline.is_some().then_some(comparison.changed_fraction);
    let fallback_level = classification.map(|c| c.fallback_level);

    if let Err(e) = saved {
        // Prior baseline stays, so a sent alert repeats on the next run
        let detail = if notified {
            format!("snapshot not saved after notification was sent: {}", e)
        } else {
            format!("snapshot not saved: {}", e)
        };
        return Ok(TargetReport {
            verdict: Some(record.verdict),
            notified,
            changed_fraction,
            fallback_level,
            ..TargetReport::skipped(target.id, detail)
        });
    }

    journal(&ctx, &record);

    Ok(TargetReport {
        target_id: target.id,
        status: TargetStatus::Decided,
        verdict: Some(record.verdict),
        notified,
        changed_fraction,
        fallback_level,
        detail: record.rationale,
    })
}

/// Delivery runs on the blocking pool; failure is logged, never fatal
async fn send_notification(notifier: &Arc<dyn Notifier>, notification: Notification) -> bool {
    let notifier = notifier.clone();
    let target_id = notification.target_id.clone();

    match tokio::task::spawn_blocking(move || notifier.notify(&notification)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::error!("[{}] notification failed: {}", target_id, e);
            false
        }
        Err(e) => {
            log::error!("[{}] notifier task failed: {}", target_id, e);
            false
        }
    }
}

fn write_debug_mask(diff: &DiffEngine, dir: &std::path::Path, target_id: &str, old: &[u8], new: &[u8]) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        log::warn!("[{}] cannot create debug dir {:?}: {}", target_id, dir, e);
        return;
    }

    let name = format!(
        "{}_{}_diff.png",
        target_file_stem(target_id),
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    );
    match diff.write_diff_mask(old, new, &dir.join(&name)) {
        Ok(true) => log::debug!("[{}] diff mask saved as {}", target_id, name),
        Ok(false) => {}
        Err(e) => log::warn!("[{}] diff mask not saved: {}", target_id, e),
    }
}

fn journal(ctx: &CycleContext, record: &DecisionRecord) {
    if let Some(journal) = &ctx.journal {
        if let Err(e) = journal.record(record) {
            log::warn!("[{}] decision not journaled: {}", record.target_id, e);
        }
    }
}
