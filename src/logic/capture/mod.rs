//! Capture Module
//!
//! - `types`: `Capture`, `CaptureError`
//! - `source`: `CaptureSource` trait + file/HTTP adapters

pub mod types;
pub mod source;

pub use types::{content_hash, Capture, CaptureError};
pub use source::{normalize_page, CaptureSource, FileCaptureSource, HttpCaptureSource};
