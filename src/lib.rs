//! Careerwatch - change detection for career listing pages
//!
//! One run captures every configured listing page, compares it with the
//! stored baseline, optionally asks a vision model whether the difference is
//! a real change, and notifies once a change has held for the confirmation
//! window.

pub mod constants;
pub mod logic;
