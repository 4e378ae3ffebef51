//! JSON contract of the upstream orchestrator.
//!
//! These types mirror the `/orchestrate` response body field-for-field.
//! Vocabulary fields (intent type, delivery status, ...) stay open
//! strings: the upstream grows its unions without notice and unknown
//! values must pass through rather than fail deserialization.

use serde::{Deserialize, Serialize};

/// Delivery status value that marks a successful classroom assignment.
pub const DELIVERY_ASSIGNED: &str = "assigned";

/// Request body for both `/orchestrate` and `/orchestrate/stream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrateRequest {
    /// Natural-language instruction
    pub prompt: String,

    /// Optional end-user token forwarded to the upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_token: Option<String>,
}

impl OrchestrateRequest {
    /// Request with no user token.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            user_token: None,
        }
    }
}

/// Detected intent block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentOutput {
    pub intent_type: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub num_questions: Option<u32>,
    pub confidence: f64,
}

/// Content-extraction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentOutput {
    pub key_topics: Vec<String>,
    pub summary: String,
}

/// Classroom delivery result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutput {
    pub delivery_status: String,
    pub platform: String,
    pub mode: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classroom_url: Option<String>,
}

impl DeliveryOutput {
    /// Whether this delivery reports a successful assignment.
    pub fn is_assigned(&self) -> bool {
        self.delivery_status == DELIVERY_ASSIGNED
    }
}

/// One generated quiz question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// Per-run result payload. Every field is optional; the upstream fills
/// in whatever the detected intent produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuizQuestion>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentOutput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryOutput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentOutput>,

    /// Keys the upstream added that this contract does not model yet
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Full `/orchestrate` response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestrateResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentOutput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<f64>,
}

impl OrchestrateResponse {
    /// Form URL, if any was produced.
    pub fn form_url(&self) -> Option<&str> {
        self.data.as_ref()?.form_url.as_deref()
    }

    /// Number of generated questions, if any were produced.
    pub fn question_count(&self) -> Option<usize> {
        Some(self.data.as_ref()?.questions.as_ref()?.len())
    }
}

/// The deterministic payload substituted when the upstream is
/// unreachable. Identical on every call.
pub fn mock_response() -> OrchestrateResponse {
    OrchestrateResponse {
        success: true,
        message: "Mock response (backend not reachable). Start the backend to get real results."
            .to_string(),
        intent: Some(IntentOutput {
            intent_type: "quiz_creation".to_string(),
            source: "manual_text".to_string(),
            target: "google_forms".to_string(),
            num_questions: Some(10),
            confidence: 0.72,
        }),
        data: Some(ResponseData {
            questions: Some(vec![QuizQuestion {
                question: "What is the primary concept covered in Chapter 5 Physics? (Mock)"
                    .to_string(),
                options: vec![
                    "Force".to_string(),
                    "Energy".to_string(),
                    "Momentum".to_string(),
                    "Waves".to_string(),
                ],
                correct_answer: "Energy".to_string(),
            }]),
            ..ResponseData::default()
        }),
        total_duration: None,
    }
}
