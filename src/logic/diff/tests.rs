use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use super::{image_digest, DiffEngine};
use crate::logic::capture::Capture;
use crate::logic::policy::{DecisionRecord, DecisionVerdict};
use crate::logic::snapshot::Snapshot;

const WHITE: [u8; 4] = [255, 255, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

fn png(width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| Rgba(pixel(x, y)));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn capture(bytes: Vec<u8>) -> Capture {
    Capture::now("nvidia", bytes)
}

#[test]
fn test_compare_same_capture_is_identical() {
    let engine = DiffEngine::default();
    for bytes in [png(20, 20, |_, _| WHITE), b"<html>jobs</html>".to_vec(), vec![0u8; 3]] {
        let c = capture(bytes);
        let result = engine.compare(&c, &c);
        assert!(result.same_content);
        assert_eq!(result.changed_fraction, 0.0);
        assert!(!result.dimension_mismatch);
    }
}

#[test]
fn test_compare_is_deterministic() {
    let engine = DiffEngine::default();
    let a = capture(png(50, 50, |_, _| WHITE));
    let b = capture(png(50, 50, |x, y| if x < 5 && y < 5 { BLACK } else { WHITE }));

    let first = engine.compare(&a, &b);
    for _ in 0..3 {
        assert_eq!(engine.compare(&a, &b), first);
    }
}

#[test]
fn test_compare_counts_changed_block() {
    let engine = DiffEngine::default();
    let old = capture(png(100, 100, |_, _| WHITE));
    let new = capture(png(100, 100, |x, y| if x < 10 && y < 10 { BLACK } else { WHITE }));

    let result = engine.compare(&old, &new);
    assert!(!result.same_content);
    assert!(!result.dimension_mismatch);
    assert_eq!(result.changed_pixels, 100);
    assert_eq!(result.total_pixels, 10_000);
    assert!((result.changed_fraction - 0.01).abs() < 1e-6);
}

#[test]
fn test_pixel_tolerance() {
    let old = capture(png(10, 10, |_, _| [100, 100, 100, 255]));
    let new = capture(png(10, 10, |_, _| [105, 100, 100, 255]));

    assert_eq!(DiffEngine::new(10).compare(&old, &new).changed_fraction, 0.0);
    assert_eq!(DiffEngine::new(0).compare(&old, &new).changed_fraction, 1.0);
}

#[test]
fn test_dimension_drift_alone_is_not_a_change() {
    let engine = DiffEngine::default();
    let old = capture(png(100, 100, |_, _| WHITE));
    let new = capture(png(100, 120, |_, _| WHITE));

    let result = engine.compare(&old, &new);
    assert!(!result.dimension_mismatch);
    assert!(result.size_changed());
    assert_eq!(result.changed_fraction, 0.0);
    assert_eq!(result.total_pixels, 100 * 120);
}

#[test]
fn test_grown_page_with_new_content_counts_new_area() {
    let engine = DiffEngine::default();
    let old = capture(png(100, 100, |_, _| WHITE));
    let new = capture(png(100, 200, |_, y| if y >= 100 { BLACK } else { WHITE }));

    let result = engine.compare(&old, &new);
    assert_eq!(result.changed_pixels, 100 * 100);
    assert!((result.changed_fraction - 0.5).abs() < 1e-6);
}

#[test]
fn test_malformed_capture_is_incomparable() {
    let engine = DiffEngine::default();
    let old = capture(png(10, 10, |_, _| WHITE));
    let new = capture(b"\x89PNG truncated".to_vec());

    let result = engine.compare(&old, &new);
    assert!(result.dimension_mismatch);
    assert_eq!(result.changed_fraction, 1.0);

    let html = engine.compare(&capture(b"<li>a</li>".to_vec()), &capture(b"<li>b</li>".to_vec()));
    assert!(html.dimension_mismatch);
    assert_eq!(html.changed_fraction, 1.0);
}

#[test]
fn test_compare_with_snapshot_without_payload() {
    let engine = DiffEngine::default();
    let bytes = b"<html>jobs</html>".to_vec();
    let current = capture(bytes.clone());

    let decision = DecisionRecord {
        target_id: "nvidia".to_string(),
        decided_at: chrono::Utc::now(),
        verdict: DecisionVerdict::NoChange,
        consecutive_count: 0,
        uncertain_streak: 0,
        episode_notified: false,
        notify: false,
        signal: None,
        rationale: String::new(),
    };
    let baseline = Snapshot::from_capture(&current, None, &decision, false);

    assert!(engine.compare_with_snapshot(&baseline, &current).same_content);

    let changed = capture(b"<html>more jobs</html>".to_vec());
    assert!(engine.compare_with_snapshot(&baseline, &changed).dimension_mismatch);
}

#[test]
fn test_image_digest() {
    let a = png(4, 4, |_, _| WHITE);
    let b = png(4, 4, |_, _| BLACK);

    let digest = image_digest(&a).unwrap();
    assert!(digest.starts_with("4x4:"));
    assert_eq!(image_digest(&a), Some(digest));
    assert_ne!(image_digest(&a), image_digest(&b));
    assert_eq!(image_digest(b"not an image"), None);
}

#[test]
fn test_write_diff_mask() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diff.png");
    let engine = DiffEngine::default();

    let old = png(10, 10, |_, _| WHITE);
    let new = png(10, 10, |x, _| if x == 0 { BLACK } else { WHITE });
    assert!(engine.write_diff_mask(&old, &new, &path).unwrap());
    assert!(path.exists());

    assert!(!engine.write_diff_mask(b"a", b"b", &dir.path().join("none.png")).unwrap());
}
