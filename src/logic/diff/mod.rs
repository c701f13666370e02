//! Diff Module - Pure capture comparison
//!
//! ## Structure
//! - `types`: `ComparisonResult`
//! - `canvas`: decoding, common-canvas alignment, pixel counting
//!
//! ## Algorithm
//! 1. Equal content hash -> short-circuit, fraction 0.
//! 2. Both decode as images -> fraction of canvas pixels differing beyond
//!    the per-pixel tolerance.
//! 3. Otherwise -> `dimension_mismatch`, fraction 1.0.
//!
//! No I/O, no retries, deterministic for identical inputs.

pub mod types;
pub mod canvas;
#[cfg(test)]
mod tests;

use std::path::Path;

use crate::constants::DEFAULT_PIXEL_TOLERANCE;
use crate::logic::capture::{content_hash, Capture};
use crate::logic::snapshot::Snapshot;

pub use types::ComparisonResult;
pub use canvas::image_digest;

#[derive(Debug, Clone, Copy)]
pub struct DiffEngine {
    pixel_tolerance: u8,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PIXEL_TOLERANCE)
    }
}

impl DiffEngine {
    pub fn new(pixel_tolerance: u8) -> Self {
        Self { pixel_tolerance }
    }

    pub fn pixel_tolerance(&self) -> u8 {
        self.pixel_tolerance
    }

    pub fn compare(&self, old: &Capture, new: &Capture) -> ComparisonResult {
        self.compare_bytes(old.bytes(), new.bytes())
    }

    pub fn compare_bytes(&self, old: &[u8], new: &[u8]) -> ComparisonResult {
        if content_hash(old) == content_hash(new) {
            return ComparisonResult::identical();
        }

        let (old_img, new_img) = match (canvas::decode(old), canvas::decode(new)) {
            (Some(a), Some(b)) => (a, b),
            _ => return ComparisonResult::incomparable(),
        };

        let (changed, total) = canvas::count_changed(&old_img, &new_img, self.pixel_tolerance);
        if total == 0 {
            return ComparisonResult::incomparable();
        }

        ComparisonResult::pixels(
            changed,
            total,
            old_img.dimensions(),
            new_img.dimensions(),
        )
    }

    /// Compare against a stored baseline. Without a retained payload only the
    /// hash can be checked.
    pub fn compare_with_snapshot(&self, baseline: &Snapshot, new: &Capture) -> ComparisonResult {
        match baseline.to_capture() {
            Some(old) => self.compare(&old, new),
            None if baseline.content_hash == new.content_hash() => ComparisonResult::identical(),
            None => ComparisonResult::incomparable(),
        }
    }

    /// Write a PNG mask of differing pixels. Returns false when the captures
    /// are not both images.
    pub fn write_diff_mask(&self, old: &[u8], new: &[u8], path: &Path) -> Result<bool, image::ImageError> {
        let (old_img, new_img) = match (canvas::decode(old), canvas::decode(new)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(false),
        };

        canvas::diff_mask(&old_img, &new_img, self.pixel_tolerance).save(path)?;
        Ok(true)
    }
}
