use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::query::truncate_chars;

/// Maximum characters kept from trace input and output text.
pub const TRACE_EXCERPT_CHARS: usize = 500;

/// Observability record of one pipeline invocation. Write-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Unique ID.
    pub id: String,
    /// Operation name (e.g. "gateway.think").
    pub operation: String,
    /// Truncated input text.
    pub input_text: String,
    /// Truncated output text.
    pub output_text: String,
    /// Requester scope.
    pub scope: String,
    /// Wall-clock duration.
    pub duration_ms: f64,
    /// Structured flags (cache hit, rate limiting, route...).
    pub metadata: Value,
    /// When the trace was recorded.
    pub created_at: DateTime<Utc>,
}

impl Trace {
    pub fn new(operation: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            operation: operation.into(),
            input_text: String::new(),
            output_text: String::new(),
            scope: scope.into(),
            duration_ms: 0.0,
            metadata: Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_io(mut self, input: &str, output: &str) -> Self {
        self.input_text = truncate_chars(input, TRACE_EXCERPT_CHARS).to_string();
        self.output_text = truncate_chars(output, TRACE_EXCERPT_CHARS).to_string();
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}
