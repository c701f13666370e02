//! Gemini vision adapter
//!
//! Posts both captures inline to the `generateContent` REST endpoint and
//! returns the raw text answer. Status codes are mapped onto
//! `ClassifierError` so the retry policy can tell transient from permanent.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::types::{ClassificationRequest, ClassifierError};
use super::ChangeClassifier;
use crate::constants::DEFAULT_GEMINI_MODEL;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct GeminiClassifier {
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl GeminiClassifier {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        Ok(Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: GEMINI_API_BASE.to_string(),
            timeout,
            http_client,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

fn mime_type(bytes: &[u8]) -> Result<&'static str, ClassifierError> {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => Ok("image/png"),
        Ok(image::ImageFormat::Jpeg) => Ok("image/jpeg"),
        _ => Err(ClassifierError::UnsupportedInput(
            "capture is not a PNG or JPEG image".to_string(),
        )),
    }
}

fn build_request(request: &ClassificationRequest<'_>) -> Result<GenerateRequest, ClassifierError> {
    let before = InlineData {
        mime_type: mime_type(request.before)?,
        data: STANDARD.encode(request.before),
    };
    let after = InlineData {
        mime_type: mime_type(request.after)?,
        data: STANDARD.encode(request.after),
    };

    Ok(GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text { text: request.instruction.clone() },
                Part::Text { text: "BEFORE screenshot:".to_string() },
                Part::Inline { inline_data: before },
                Part::Text { text: "AFTER screenshot:".to_string() },
                Part::Inline { inline_data: after },
            ],
        }],
        generation_config: GenerationConfig { temperature: 0.0 },
    })
}

/// Map a non-success status onto the error taxonomy
fn status_error(status: u16, body: &str, retry_after: Option<Duration>) -> ClassifierError {
    match status {
        401 | 403 => ClassifierError::Unauthorized,
        429 if body.to_ascii_lowercase().contains("quota") => {
            ClassifierError::QuotaExceeded(first_line(body))
        }
        429 => ClassifierError::RateLimited { retry_after },
        500..=599 => ClassifierError::Unavailable { status },
        _ => ClassifierError::Rejected {
            status,
            message: first_line(body),
        },
    }
}

fn first_line(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .chars()
        .take(160)
        .collect()
}

fn extract_text(response: GenerateResponse) -> Result<String, ClassifierError> {
    let text: Vec<String> = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .collect();

    if text.is_empty() {
        return Err(ClassifierError::Malformed("response has no text candidates".to_string()));
    }
    Ok(text.join("\n"))
}

#[async_trait]
impl ChangeClassifier for GeminiClassifier {
    async fn classify(&self, request: &ClassificationRequest<'_>) -> Result<String, ClassifierError> {
        let body = build_request(request)?;

        let response = self.http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout(self.timeout)
                } else {
                    ClassifierError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &text, retry_after));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;

        extract_text(parsed)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status_error(401, "", None), ClassifierError::Unauthorized));
        assert!(matches!(
            status_error(429, "You exceeded your current quota", None),
            ClassifierError::QuotaExceeded(_)
        ));
        assert!(matches!(
            status_error(429, "slow down", Some(Duration::from_secs(3))),
            ClassifierError::RateLimited { retry_after: Some(_) }
        ));
        assert!(matches!(status_error(503, "", None), ClassifierError::Unavailable { status: 503 }));
        assert!(matches!(status_error(400, "bad", None), ClassifierError::Rejected { status: 400, .. }));
    }

    #[test]
    fn test_retryability_of_mapped_statuses() {
        assert!(status_error(503, "", None).is_retryable());
        assert!(status_error(429, "slow down", None).is_retryable());
        assert!(!status_error(429, "quota exceeded", None).is_retryable());
        assert!(!status_error(403, "", None).is_retryable());
    }

    #[test]
    fn test_extract_text() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"VERDICT: CHANGE"},{"text":"New role."}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "VERDICT: CHANGE\nNew role.");

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(extract_text(empty), Err(ClassifierError::Malformed(_))));
    }

    #[test]
    fn test_request_body_shape() {
        let png: &[u8] = b"\x89PNG\r\n\x1a\n0000";
        let request = ClassificationRequest {
            target_id: "nvidia",
            context: "NVIDIA",
            before: png,
            after: png,
            changed_fraction: 0.02,
            instruction: "compare".to_string(),
        };

        let body = serde_json::to_value(build_request(&request).unwrap()).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "compare");
        assert_eq!(parts[2]["inline_data"]["mime_type"], "image/png");
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn test_non_image_is_rejected_before_sending() {
        let request = ClassificationRequest {
            target_id: "nvidia",
            context: "NVIDIA",
            before: b"<html></html>",
            after: b"<html></html>",
            changed_fraction: 1.0,
            instruction: String::new(),
        };
        assert!(matches!(build_request(&request), Err(ClassifierError::UnsupportedInput(_))));
    }

    #[test]
    fn test_endpoint() {
        let client = GeminiClassifier::new("key", Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost:9000/")
            .with_model("gemini-test");
        assert_eq!(client.endpoint(), "http://localhost:9000/models/gemini-test:generateContent");
    }
}
