//! Watch Configuration
//!
//! Everything one run needs: engine thresholds, the target list, and which
//! store, capture source and notifier to build. Loaded from `.env`, then an
//! optional JSON file, then environment overrides, then validated.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{self, *};
use crate::logic::classifier::{RetryPolicy, StageSettings};
use crate::logic::policy::PolicyConfig;
use crate::logic::snapshot::sanitize_target_id;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// ENGINE SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub change_threshold: f32,
    pub confirmation_window: u32,
    pub uncertainty_grace_cycles: u32,
    pub noise_floor: f32,
    pub pixel_tolerance: u8,
    pub classifier_enabled: bool,
    pub classifier_timeout_secs: u64,
    pub classifier_max_retries: u32,
    pub classifier_max_calls: u32,
    pub gemini_model: String,
    /// Keep the raw capture in the snapshot for the next pixel diff
    pub retain_payload: bool,
    pub save_debug_images: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
            confirmation_window: DEFAULT_CONFIRMATION_WINDOW,
            uncertainty_grace_cycles: DEFAULT_UNCERTAINTY_GRACE_CYCLES,
            noise_floor: DEFAULT_NOISE_FLOOR,
            pixel_tolerance: DEFAULT_PIXEL_TOLERANCE,
            classifier_enabled: true,
            classifier_timeout_secs: DEFAULT_CLASSIFIER_TIMEOUT_SECS,
            classifier_max_retries: DEFAULT_CLASSIFIER_MAX_RETRIES,
            classifier_max_calls: DEFAULT_CLASSIFIER_MAX_CALLS,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            retain_payload: true,
            save_debug_images: false,
        }
    }
}

impl EngineSettings {
    pub fn policy(&self) -> PolicyConfig {
        PolicyConfig {
            change_threshold: self.change_threshold,
            confirmation_window: self.confirmation_window,
            uncertainty_grace_cycles: self.uncertainty_grace_cycles,
        }
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier_timeout_secs)
    }

    pub fn stage(&self) -> StageSettings {
        StageSettings {
            noise_floor: self.noise_floor,
            change_threshold: self.change_threshold,
            timeout: self.classifier_timeout(),
            retry: RetryPolicy::new(self.classifier_max_retries),
            max_calls: self.classifier_max_calls,
        }
    }
}

// ============================================================================
// TARGETS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub id: String,
    pub url: String,
    /// Display name for prompts and notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Explicit capture file, otherwise `<captures_dir>/<id>.*`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_file: Option<PathBuf>,
}

impl TargetConfig {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            name: None,
            capture_file: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Student listings watched when no config file exists
pub fn default_targets() -> Vec<TargetConfig> {
    vec![
        TargetConfig::new(
            "nvidia",
            "https://nvidia.wd5.myworkdayjobs.com/NVIDIAExternalCareerSite?q=Student&locationHierarchy1=2fcb99c455831013ea52bbe14cf9326c",
        )
        .with_name("NVIDIA"),
        TargetConfig::new(
            "intel",
            "https://intel.wd1.myworkdayjobs.com/en-US/External?q=student&locations=1e4a4eb3adf1013563ba9174bf817fcd",
        )
        .with_name("Intel"),
    ]
}

// ============================================================================
// ADAPTER SETTINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub kind: StoreKind,
    /// Snapshot directory (json) or database file (sqlite)
    pub path: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            kind: StoreKind::Json,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Screenshots written by the external browser job
    Files,
    /// Raw page body, hash comparison only
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub mode: CaptureMode,
    pub captures_dir: PathBuf,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Files,
            captures_dir: PathBuf::from("captures"),
        }
    }
}

/// Secrets come from the environment only and are never written back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Secrets {
    pub gemini_api_key: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

// ============================================================================
// WATCH CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub engine: EngineSettings,
    pub targets: Vec<TargetConfig>,
    pub store: StoreSettings,
    pub capture: CaptureSettings,
    /// Directory for state.json, the decision journal and debug images
    pub data_dir: Option<PathBuf>,
    #[serde(skip)]
    pub secrets: Secrets,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            targets: default_targets(),
            store: StoreSettings::default(),
            capture: CaptureSettings::default(),
            data_dir: None,
            secrets: Secrets::default(),
        }
    }
}

impl WatchConfig {
    /// `.env`, config file from `CAREERWATCH_CONFIG`, env overrides, validation
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }
        Self::load_from(Path::new(&constants::get_config_path()))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let parsed = Self::from_json(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            log::info!("Loaded config from {}", path.display());
            parsed
        } else {
            log::info!("No config file at {}, using built-in targets", path.display());
            Self::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Environment wins over the file for every variable that is set
    pub fn apply_env(&mut self) {
        let is_set = |key: &str| std::env::var_os(key).is_some();

        if is_set("CHANGE_THRESHOLD") {
            self.engine.change_threshold = constants::get_change_threshold();
        }
        if is_set("CONFIRMATION_WINDOW") {
            self.engine.confirmation_window = constants::get_confirmation_window();
        }
        if is_set("USE_AI_ANALYSIS") {
            self.engine.classifier_enabled = constants::is_ai_analysis_enabled();
        }
        if is_set("SAVE_DEBUG_IMAGES") {
            self.engine.save_debug_images = constants::is_debug_images_enabled();
        }

        self.secrets = Secrets {
            gemini_api_key: constants::get_gemini_api_key(),
            telegram_bot_token: constants::get_telegram_bot_token(),
            telegram_chat_id: constants::get_telegram_chat_id(),
        };
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let e = &self.engine;

        if !(e.change_threshold > 0.0 && e.change_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "change_threshold must be in (0, 1], got {}",
                e.change_threshold
            )));
        }
        if !(0.0..=1.0).contains(&e.noise_floor) {
            return Err(ConfigError::Invalid(format!(
                "noise_floor must be in [0, 1], got {}",
                e.noise_floor
            )));
        }
        if e.noise_floor > e.change_threshold {
            return Err(ConfigError::Invalid(format!(
                "noise_floor {} is above change_threshold {}",
                e.noise_floor, e.change_threshold
            )));
        }
        if e.confirmation_window == 0 {
            return Err(ConfigError::Invalid("confirmation_window must be at least 1".into()));
        }
        if e.classifier_timeout_secs == 0 {
            return Err(ConfigError::Invalid("classifier_timeout_secs must be positive".into()));
        }
        if self.targets.is_empty() {
            return Err(ConfigError::Invalid("no targets configured".into()));
        }

        let mut seen = HashSet::new();
        // Capture files are named after the sanitized id
        let mut stems: HashMap<String, &str> = HashMap::new();
        for target in &self.targets {
            if target.id.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("target with url {} has an empty id", target.url)));
            }
            if !seen.insert(target.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate target id '{}'", target.id)));
            }
            if let Some(other) = stems.insert(sanitize_target_id(&target.id), target.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "target ids '{}' and '{}' map to the same file name",
                    other, target.id
                )));
            }
        }

        Ok(())
    }

    pub fn target(&self, id: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_NAME)
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.target("nvidia").map(|t| t.label()), Some("NVIDIA"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = WatchConfig::from_json(
            r#"{
                "engine": {"confirmation_window": 3},
                "targets": [{"id": "amd", "url": "https://careers.amd.com"}],
                "store": {"kind": "sqlite", "path": "/tmp/cw.db"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.engine.confirmation_window, 3);
        assert_eq!(config.engine.change_threshold, DEFAULT_CHANGE_THRESHOLD);
        assert_eq!(config.targets[0].label(), "amd");
        assert_eq!(config.store.kind, StoreKind::Sqlite);
        assert_eq!(config.capture.mode, CaptureMode::Files);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_threshold() {
        for threshold in [0.0, -0.1, 1.5] {
            let mut config = WatchConfig::default();
            config.engine.change_threshold = threshold;
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_rejects_zero_window_and_timeout() {
        let mut config = WatchConfig::default();
        config.engine.confirmation_window = 0;
        assert!(config.validate().is_err());

        let mut config = WatchConfig::default();
        config.engine.classifier_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_and_empty_ids() {
        let mut config = WatchConfig::default();
        config.targets.push(TargetConfig::new("nvidia", "https://example.com"));
        assert!(config.validate().is_err());

        let mut config = WatchConfig::default();
        config.targets = vec![TargetConfig::new(" ", "https://example.com")];
        assert!(config.validate().is_err());

        let mut config = WatchConfig::default();
        config.targets.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_ids_sharing_a_file_name() {
        let mut config = WatchConfig::default();
        config.targets = vec![
            TargetConfig::new("acme.jobs", "https://acme.example/jobs"),
            TargetConfig::new("acme_jobs", "https://acme.example/careers"),
        ];
        match config.validate() {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("acme.jobs") && msg.contains("acme_jobs")),
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_noise_floor_above_threshold() {
        let mut config = WatchConfig::default();
        config.engine.change_threshold = 0.005;
        config.engine.noise_floor = 0.01;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.engine.noise_floor = 0.005;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("careerwatch.json");

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(WatchConfig::load_from(&path), Err(ConfigError::Parse { .. })));

        std::fs::write(&path, r#"{"targets": []}"#).unwrap();
        assert!(matches!(WatchConfig::load_from(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut config = WatchConfig::default();
        config.secrets.gemini_api_key = Some("secret-key".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret-key"));
    }

    #[test]
    fn test_engine_settings_derive_stage_and_policy() {
        let engine = EngineSettings {
            classifier_max_retries: 4,
            classifier_timeout_secs: 7,
            ..Default::default()
        };
        let stage = engine.stage();
        assert_eq!(stage.retry.max_retries, 4);
        assert_eq!(stage.timeout, Duration::from_secs(7));
        assert_eq!(engine.policy(), PolicyConfig::default());
    }
}
