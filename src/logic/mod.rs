//! Logic Module - Detection pipeline
//!
//! ## Pipeline
//! - `capture/` - Capture type and capture sources (files, HTTP)
//! - `snapshot/` - Baseline persistence (JSON files, SQLite, memory)
//! - `diff/` - Pure pixel / hash comparison
//! - `classifier/` - Semantic classification with fallback levels
//! - `policy/` - Confirmation window and notification latch
//! - `cycle/` - Orchestrates one pass over all targets
//!
//! ## Support
//! - `config` - Watch configuration and validation
//! - `notify/` - Telegram and log notifiers
//! - `journal` - Append-only decision log

// Pipeline
pub mod capture;
pub mod snapshot;
pub mod diff;
pub mod classifier;
pub mod policy;
pub mod cycle;

// Support
pub mod config;
pub mod notify;
pub mod journal;
