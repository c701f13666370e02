//! Classifier Module - Semantic change classification
//!
//! Asks an external vision model whether the difference between two captures
//! is a real change to the listings, and degrades deterministically when the
//! model cannot be used.
//!
//! ## Structure
//! - `types`: verdicts, results, errors
//! - `prompt`: instruction text and verdict parsing
//! - `retry`: bounded retry with backoff
//! - `gemini`: Gemini REST adapter
//! - `stage`: call budget and fallback chain

pub mod types;
pub mod prompt;
pub mod retry;
pub mod gemini;
pub mod stage;

use async_trait::async_trait;

pub use types::{
    ClassificationRequest,
    ClassificationResult,
    ClassifierError,
    ClassifierVerdict,
    FallbackLevel,
};
pub use gemini::GeminiClassifier;
pub use retry::RetryPolicy;
pub use stage::{CallBudget, SemanticStage, StageSettings};

/// A replaceable semantic classifier. Returns the raw answer text.
#[async_trait]
pub trait ChangeClassifier: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest<'_>) -> Result<String, ClassifierError>;

    fn name(&self) -> &str {
        "classifier"
    }
}
