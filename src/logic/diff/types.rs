//! Diff Types
//!
//! Output of the pure comparison step. No logic beyond constructors.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Fraction of the common canvas that differs (0.0 - 1.0)
    pub changed_fraction: f32,
    /// Raw bytes hash identically; nothing else was computed
    pub same_content: bool,
    /// Captures could not be compared pixel by pixel
    pub dimension_mismatch: bool,
    pub changed_pixels: u64,
    pub total_pixels: u64,
    pub old_dims: Option<(u32, u32)>,
    pub new_dims: Option<(u32, u32)>,
}

impl ComparisonResult {
    /// Hash short-circuit
    pub fn identical() -> Self {
        Self {
            changed_fraction: 0.0,
            same_content: true,
            dimension_mismatch: false,
            changed_pixels: 0,
            total_pixels: 0,
            old_dims: None,
            new_dims: None,
        }
    }

    /// Not comparable in kind; callers must treat it as a potential change
    pub fn incomparable() -> Self {
        Self {
            changed_fraction: 1.0,
            same_content: false,
            dimension_mismatch: true,
            changed_pixels: 0,
            total_pixels: 0,
            old_dims: None,
            new_dims: None,
        }
    }

    pub fn pixels(
        changed_pixels: u64,
        total_pixels: u64,
        old_dims: (u32, u32),
        new_dims: (u32, u32),
    ) -> Self {
        let changed_fraction = if total_pixels == 0 {
            0.0
        } else {
            (changed_pixels as f64 / total_pixels as f64) as f32
        };

        Self {
            changed_fraction,
            same_content: false,
            dimension_mismatch: false,
            changed_pixels,
            total_pixels,
            old_dims: Some(old_dims),
            new_dims: Some(new_dims),
        }
    }

    /// Changed fraction as a percentage, for logs and messages
    pub fn percent(&self) -> f32 {
        self.changed_fraction * 100.0
    }

    pub fn size_changed(&self) -> bool {
        matches!((self.old_dims, self.new_dims), (Some(a), Some(b)) if a != b)
    }

    pub fn describe(&self) -> String {
        if self.same_content {
            "identical content hash".to_string()
        } else if self.dimension_mismatch {
            "captures not comparable as images".to_string()
        } else {
            format!(
                "{:.3}% pixels changed ({} of {})",
                self.percent(),
                self.changed_pixels,
                self.total_pixels
            )
        }
    }
}
