//! Policy Configuration
//!
//! Thresholds for change decisions.
//! Loaded from the watch config or set at runtime.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CHANGE_THRESHOLD, DEFAULT_CONFIRMATION_WINDOW, DEFAULT_UNCERTAINTY_GRACE_CYCLES,
};

// ============================================================================
// POLICY CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Changed fraction above which an unclassified cycle counts as positive
    pub change_threshold: f32,
    /// Consecutive positive cycles needed to confirm a change
    pub confirmation_window: u32,
    /// UNCERTAIN cycles a pending change survives before it resets
    pub uncertainty_grace_cycles: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
            confirmation_window: DEFAULT_CONFIRMATION_WINDOW,
            uncertainty_grace_cycles: DEFAULT_UNCERTAINTY_GRACE_CYCLES,
        }
    }
}

impl PolicyConfig {
    /// Notify on the first positive cycle
    pub fn immediate() -> Self {
        Self {
            confirmation_window: 1,
            ..Default::default()
        }
    }

    /// Window of zero behaves like one
    pub fn window(&self) -> u32 {
        self.confirmation_window.max(1)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PolicyConfig::default();
        assert_eq!(config.change_threshold, 0.005);
        assert_eq!(config.confirmation_window, 2);
        assert_eq!(config.uncertainty_grace_cycles, 2);
    }

    #[test]
    fn test_immediate_config() {
        assert_eq!(PolicyConfig::immediate().window(), 1);
    }

    #[test]
    fn test_zero_window_is_clamped() {
        let config = PolicyConfig {
            confirmation_window: 0,
            ..Default::default()
        };
        assert_eq!(config.window(), 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PolicyConfig = serde_json::from_str(r#"{"confirmation_window": 3}"#).unwrap();
        assert_eq!(config.confirmation_window, 3);
        assert_eq!(config.change_threshold, 0.005);
    }
}
