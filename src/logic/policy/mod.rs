//! Policy Module
//!
//! Turns one cycle's evidence plus the stored state into a verdict.
//! Confirmation gating lives here and nowhere else.
//!
//! ## Structure
//! - `types`: Core types (DecisionVerdict, Signal, PriorState, DecisionRecord)
//! - `config`: Policy thresholds
//! - `engine`: Decision logic
//!
//! ## Usage
//! ```ignore
//! use crate::logic::policy::{decide, PolicyConfig};
//!
//! let record = decide(target, &comparison, classification.as_ref(), prior.as_ref(), &config, now);
//! if record.notify {
//!     notifier.send(&notification)?;
//! }
//! ```

pub mod types;
pub mod config;
pub mod engine;

// Re-export main types for convenience
pub use types::{
    DecisionRecord,
    DecisionVerdict,
    PriorState,
    Signal,
};

pub use config::PolicyConfig;
pub use engine::{decide, effective_signal};
