//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Environment getters fall back to these values when a variable is unset
//! or does not parse.

/// Fraction of pixels that must differ before a cycle counts as positive
pub const DEFAULT_CHANGE_THRESHOLD: f32 = 0.005;

/// Consecutive positive cycles required before a change is confirmed
pub const DEFAULT_CONFIRMATION_WINDOW: u32 = 2;

/// Ambiguous cycles tolerated while a change is pending
pub const DEFAULT_UNCERTAINTY_GRACE_CYCLES: u32 = 2;

/// Below this fraction the classifier is never consulted
pub const DEFAULT_NOISE_FLOOR: f32 = 0.001;

/// Max per-channel difference still considered the same pixel
pub const DEFAULT_PIXEL_TOLERANCE: u8 = 10;

/// Classifier request timeout (seconds)
pub const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 30;

/// Retries after the first classifier attempt
pub const DEFAULT_CLASSIFIER_MAX_RETRIES: u32 = 2;

/// Classifier invocations allowed per run
pub const DEFAULT_CLASSIFIER_MAX_CALLS: u32 = 8;

/// Vision model used for semantic classification
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Config file looked up when `CAREERWATCH_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "careerwatch.json";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name (also the data directory name)
pub const APP_NAME: &str = "careerwatch";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Change threshold from `CHANGE_THRESHOLD`, given in percent (`0.5` = 0.5%)
pub fn get_change_threshold() -> f32 {
    std::env::var("CHANGE_THRESHOLD")
        .ok()
        .and_then(|s| parse_percent(&s))
        .unwrap_or(DEFAULT_CHANGE_THRESHOLD)
}

/// `"0.5"` -> `0.005`
pub fn parse_percent(raw: &str) -> Option<f32> {
    raw.trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v / 100.0)
}

/// Confirmation window from `CONFIRMATION_WINDOW`
pub fn get_confirmation_window() -> u32 {
    std::env::var("CONFIRMATION_WINDOW")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_CONFIRMATION_WINDOW)
}

/// Check if AI analysis is enabled (`USE_AI_ANALYSIS`, default true)
pub fn is_ai_analysis_enabled() -> bool {
    std::env::var("USE_AI_ANALYSIS")
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(true)
}

/// Gemini API key, if configured
pub fn get_gemini_api_key() -> Option<String> {
    non_empty_var("GEMINI_API_KEY")
}

/// Telegram bot token, if configured
pub fn get_telegram_bot_token() -> Option<String> {
    non_empty_var("TELEGRAM_BOT_TOKEN")
}

/// Telegram chat id, if configured
pub fn get_telegram_chat_id() -> Option<String> {
    non_empty_var("TELEGRAM_CHAT_ID")
}

/// Check if debug diff images should be written (`SAVE_DEBUG_IMAGES`)
pub fn is_debug_images_enabled() -> bool {
    std::env::var("SAVE_DEBUG_IMAGES")
        .map(|s| s.to_lowercase() == "true" || s == "1")
        .unwrap_or(false)
}

/// Config file path from `CAREERWATCH_CONFIG` or the default
pub fn get_config_path() -> String {
    std::env::var("CAREERWATCH_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string())
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
