//! Standardized response bodies shared by the gateway and its upstreams.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Informational body used by liveness endpoints (`{"message": "..."}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Uniform error body returned to clients.
///
/// Every service on the platform answers failures with this shape, so the
/// gateway can relay upstream errors without reshaping them.
///
/// `stack` and `original_error` are diagnostic fields. They are only populated
/// when the emitting process runs in a non-production operating mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always the literal `"error"`.
    pub status: String,

    /// A human-readable message safe to show to the client.
    pub error: String,

    /// Structured context for the failure, e.g. per-field validation messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    #[serde(
        default,
        rename = "originalError",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_error: Option<OriginalError>,
}

/// Root cause of a wrapped failure, exposed in diagnostic mode only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorEnvelope {
    pub const STATUS: &'static str = "error";

    pub fn new(error: impl Into<String>) -> Self {
        Self {
            status: Self::STATUS.to_string(),
            error: error.into(),
            details: None,
            stack: None,
            original_error: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_original_error(mut self, original: OriginalError) -> Self {
        self.original_error = Some(original);
        self
    }

    /// Whether any diagnostic field is present.
    pub fn has_diagnostics(&self) -> bool {
        self.stack.is_some() || self.original_error.is_some()
    }

    // Common error constructors
    pub fn not_found() -> Self {
        Self::new("Resource not found")
    }
}
