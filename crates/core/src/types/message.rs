use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Conversation Types
// =============================================================================

/// One `{role, content}` pair of a conversation sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role (system, user, assistant).
    pub role: String,
    /// Message content.
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

// =============================================================================
// Routing Types
// =============================================================================

/// Output of an external complexity classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Ordinal difficulty, 0 (trivial) upwards.
    pub level: u8,
    /// Whatever else the classifier reported (scores, labels, reasoning).
    #[serde(default)]
    pub metadata: Value,
}

impl Classification {
    pub fn level(level: u8) -> Self {
        Self {
            level,
            metadata: Value::Null,
        }
    }
}

/// The provider key a router picked for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    /// Registered provider key that served the call.
    pub key: String,
    /// Present when a classifier drove the decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
}

impl RouteDecision {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            classification: None,
        }
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }
}

/// Response from a provider.
///
/// Routing metadata travels with the response instead of living in router
/// state, so concurrent calls never observe each other's decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text.
    pub content: String,
    /// Set by routers; plain providers leave it empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteDecision>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            route: None,
        }
    }

    pub fn routed(mut self, route: RouteDecision) -> Self {
        self.route = Some(route);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_serialization_omits_missing_route() {
        let value = serde_json::to_value(Completion::text("hi")).expect("serialize");
        assert_eq!(value["content"], "hi");
        assert!(value.get("route").is_none());

        let routed = Completion::text("hi").routed(
            RouteDecision::new("quality").with_classification(Classification::level(3)),
        );
        let value = serde_json::to_value(routed).expect("serialize");
        assert_eq!(value["route"]["key"], "quality");
        assert_eq!(value["route"]["classification"]["level"], 3);
    }
}
