//! Telegram Bot API notifier
//!
//! Sends an HTML formatted `sendMessage` through `ureq`. Blocking: callers
//! on the async runtime run it on the blocking pool.

use std::time::Duration;

use super::{Notification, Notifier, NotifyError};
use crate::logic::classifier::FallbackLevel;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const SEND_TIMEOUT_SECS: u64 = 10;

pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    api_base: String,
    agent: ureq::Agent,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build();

        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
            agent,
        }
    }

    /// Both credentials present and non-empty
    pub fn from_credentials(bot_token: Option<&str>, chat_id: Option<&str>) -> Result<Self, NotifyError> {
        match (bot_token, chat_id) {
            (Some(token), Some(chat)) if !token.is_empty() && !chat.is_empty() => Ok(Self::new(token, chat)),
            _ => Err(NotifyError::NotConfigured(
                "TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID are required".to_string(),
            )),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base.trim_end_matches('/'), self.bot_token)
    }

    fn payload(&self, notification: &Notification) -> serde_json::Value {
        serde_json::json!({
            "chat_id": self.chat_id,
            "text": format_message(notification),
            "parse_mode": "HTML",
            "disable_web_page_preview": false
        })
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.agent
            .post(&self.endpoint())
            .send_json(self.payload(notification));

        match response {
            Ok(_) => {
                log::info!("[{}] Telegram notification sent", notification.target_id);
                Ok(())
            }
            Err(ureq::Error::Status(status, resp)) => {
                let message = resp.into_string().unwrap_or_default();
                Err(NotifyError::Rejected { status, message })
            }
            Err(e) => Err(NotifyError::Transport(e.to_string())),
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn method_line(level: Option<FallbackLevel>) -> &'static str {
    match level {
        Some(FallbackLevel::Full) => "🤖 <b>AI Analysis</b>",
        Some(FallbackLevel::PixelOnly) => "⚠️ <b>Detection Method:</b> Pixel comparison (classifier unavailable)",
        Some(FallbackLevel::HashOnly) => "⚠️ <b>Detection Method:</b> Content hash only",
        None => "🔍 <b>Detection Method:</b> Pixel-based comparison only",
    }
}

/// HTML body for one confirmed change
pub fn format_message(n: &Notification) -> String {
    let label = escape_html(&n.label);
    let mut text = format!("📸 <b>Job Listing Update Detected!</b>\n\n🔥 <b>{}</b> jobs page has changed!\n\n", label);

    text.push_str(method_line(n.fallback_level));
    text.push('\n');
    if !n.rationale.is_empty() {
        text.push_str(&format!("📝 {}\n", escape_html(&n.rationale)));
    }

    text.push_str(&format!("📊 Change: {:.2}% of pixels\n", n.changed_fraction * 100.0));
    text.push_str(&format!(
        "🔗 <a href=\"{}\">Check {} Jobs</a>\n\n",
        escape_html(&n.url),
        label
    ));
    text.push_str(&format!("⏰ {}\n", n.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
    text.push_str(&format!(
        "🎯 Confirmed across consecutive checks (threshold: {:.2}%)",
        n.change_threshold * 100.0
    ));

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::policy::DecisionVerdict;
    use chrono::TimeZone;

    fn notification(level: Option<FallbackLevel>) -> Notification {
        Notification {
            target_id: "nvidia".into(),
            label: "NVIDIA".into(),
            url: "https://example.com/jobs?q=Student&loc=1".into(),
            verdict: DecisionVerdict::ConfirmedChange,
            rationale: "Two new <intern> roles".into(),
            timestamp: chrono::Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap(),
            changed_fraction: 0.0234,
            fallback_level: level,
            change_threshold: 0.005,
        }
    }

    #[test]
    fn test_format_message() {
        let text = format_message(&notification(Some(FallbackLevel::Full)));
        assert!(text.contains("<b>NVIDIA</b>"));
        assert!(text.contains("Two new &lt;intern&gt; roles"));
        assert!(text.contains("2.34% of pixels"));
        assert!(text.contains("href=\"https://example.com/jobs?q=Student&amp;loc=1\""));
        assert!(text.contains("2025-03-01 12:30:00 UTC"));
        assert!(text.contains("threshold: 0.50%"));
    }

    #[test]
    fn test_degraded_note() {
        let text = format_message(&notification(Some(FallbackLevel::PixelOnly)));
        assert!(text.contains("classifier unavailable"));

        let text = format_message(&notification(None));
        assert!(text.contains("Pixel-based comparison only"));
    }

    #[test]
    fn test_payload_shape() {
        let notifier = TelegramNotifier::new("123:abc", "42");
        let payload = notifier.payload(&notification(None));
        assert_eq!(payload["chat_id"], "42");
        assert_eq!(payload["parse_mode"], "HTML");
        assert_eq!(notifier.endpoint(), "https://api.telegram.org/bot123:abc/sendMessage");
    }

    #[test]
    fn test_requires_credentials() {
        assert!(TelegramNotifier::from_credentials(Some("t"), None).is_err());
        assert!(TelegramNotifier::from_credentials(Some(""), Some("1")).is_err());
        assert!(TelegramNotifier::from_credentials(Some("t"), Some("1")).is_ok());
    }

    #[test]
    fn test_unreachable_api_is_transport_error() {
        let notifier = TelegramNotifier::new("t", "1").with_api_base("http://127.0.0.1:1");
        assert!(matches!(
            notifier.notify(&notification(None)),
            Err(NotifyError::Transport(_))
        ));
    }
}
