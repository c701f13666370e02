//! Run Report
//!
//! Per-run outcome of every target, persisted as `state.json` with a
//! running check counter carried over from the previous report.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::classifier::FallbackLevel;
use crate::logic::policy::DecisionVerdict;

const STATE_FILE: &str = "state.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Decided,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetReport {
    pub target_id: String,
    pub status: TargetStatus,
    pub verdict: Option<DecisionVerdict>,
    pub notified: bool,
    pub changed_fraction: Option<f32>,
    pub fallback_level: Option<FallbackLevel>,
    /// Rationale when decided, diagnostic when skipped
    pub detail: String,
}

impl TargetReport {
    pub fn skipped(target_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            status: TargetStatus::Skipped,
            verdict: None,
            notified: false,
            changed_fraction: None,
            fallback_level: None,
            detail: reason.into(),
        }
    }

    pub fn is_change(&self) -> bool {
        self.verdict == Some(DecisionVerdict::ConfirmedChange)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub detection_method: String,
    pub change_threshold: f32,
    #[serde(default)]
    pub total_checks: u64,
    pub targets: Vec<TargetReport>,
}

impl RunReport {
    pub fn new(detection_method: impl Into<String>, change_threshold: f32) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            detection_method: detection_method.into(),
            change_threshold,
            total_checks: 0,
            targets: Vec::new(),
        }
    }

    pub fn push(&mut self, report: TargetReport) {
        self.targets.push(report);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn target(&self, id: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|t| t.target_id == id)
    }

    pub fn checked(&self) -> usize {
        self.count(|t| t.status == TargetStatus::Decided)
    }

    pub fn changes(&self) -> usize {
        self.count(TargetReport::is_change)
    }

    pub fn notified(&self) -> usize {
        self.count(|t| t.notified)
    }

    pub fn cold_starts(&self) -> usize {
        self.count(|t| t.verdict == Some(DecisionVerdict::ColdStart))
    }

    pub fn skipped(&self) -> usize {
        self.count(|t| t.status == TargetStatus::Skipped)
    }

    fn count(&self, f: impl Fn(&TargetReport) -> bool) -> usize {
        self.targets.iter().filter(|t| f(t)).count()
    }

    pub fn log_summary(&self) {
        log::info!("Run summary:");
        log::info!("  Detection method: {}", self.detection_method);
        log::info!("  Change threshold: {:.3}%", self.change_threshold * 100.0);
        log::info!("  Targets checked: {}", self.checked());
        log::info!("  Confirmed changes: {} ({} notified)", self.changes(), self.notified());
        log::info!("  Cold starts: {}", self.cold_starts());
        log::info!("  Skipped: {}", self.skipped());
        for t in self.targets.iter().filter(|t| t.status == TargetStatus::Skipped) {
            log::warn!("  [{}] skipped: {}", t.target_id, t.detail);
        }
    }

    pub fn state_path(dir: &Path) -> PathBuf {
        dir.join(STATE_FILE)
    }

    /// Previous report, if one exists and parses
    pub fn load(path: &Path) -> Option<Self> {
        let raw = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(report) => Some(report),
            Err(e) => {
                log::warn!("Ignoring unreadable run state {:?}: {}", path, e);
                None
            }
        }
    }

    /// Write `state.json`, continuing the previous check counter
    pub fn persist(&mut self, path: &Path) -> std::io::Result<()> {
        self.total_checks = Self::load(path).map(|prev| prev.total_checks).unwrap_or(0) + 1;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decided(id: &str, verdict: DecisionVerdict, notified: bool) -> TargetReport {
        TargetReport {
            target_id: id.to_string(),
            status: TargetStatus::Decided,
            verdict: Some(verdict),
            notified,
            changed_fraction: Some(0.01),
            fallback_level: None,
            detail: String::new(),
        }
    }

    #[test]
    fn test_counters() {
        let mut report = RunReport::new("screenshot", 0.005);
        report.push(decided("nvidia", DecisionVerdict::ConfirmedChange, true));
        report.push(decided("intel", DecisionVerdict::ColdStart, false));
        report.push(TargetReport::skipped("amd", "capture missing"));

        assert_eq!(report.checked(), 2);
        assert_eq!(report.changes(), 1);
        assert_eq!(report.notified(), 1);
        assert_eq!(report.cold_starts(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.target("amd").map(|t| t.status), Some(TargetStatus::Skipped));
    }

    #[test]
    fn test_total_checks_carry_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = RunReport::state_path(dir.path());

        for expected in 1..=3 {
            let mut report = RunReport::new("screenshot", 0.005);
            report.finish();
            report.persist(&path).unwrap();
            assert_eq!(report.total_checks, expected);
        }

        assert_eq!(RunReport::load(&path).map(|r| r.total_checks), Some(3));
    }

    #[test]
    fn test_corrupt_state_restarts_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = RunReport::state_path(dir.path());
        std::fs::write(&path, "not json").unwrap();

        let mut report = RunReport::new("hash", 0.005);
        report.persist(&path).unwrap();
        assert_eq!(report.total_checks, 1);
    }
}
