//! Identity distillation from stored memories.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use kore_bridge_core::{
    query::truncate_chars,
    types::{Identity, Memory},
    Error, Result,
};

/// Memories handed to the summarizer, at most.
pub const REFLECT_MEMORY_LIMIT: usize = 50;
/// Characters of raw summarizer output kept when it is not valid JSON.
pub const SUMMARY_FALLBACK_CHARS: usize = 500;
/// Summary stored when there is nothing to reflect on.
pub const EMPTY_SUMMARY: &str = "No memories yet.";

pub const REFLECT_INSTRUCTION: &str = r#"You are analyzing memories of an AI assistant to generate its identity profile.

Given the following memories, extract:
1. A concise summary of who this assistant is and what it focuses on (2-3 sentences max)
2. Key personality traits as keywords with confidence scores (0.0-1.0)
3. Relationships: who does this assistant interact with and how

Respond in this exact JSON format:
{"summary": "...", "traits": {"trait": score, ...}, "relationships": {"name": "description", ...}}

Be concise. Only include clear patterns, not speculation."#;

/// One line per memory: `- [kind] (salience=0.00) content`.
pub fn format_memories(memories: &[Memory]) -> String {
    memories
        .iter()
        .take(REFLECT_MEMORY_LIMIT)
        .map(|m| format!("- [{}] (salience={:.2}) {}", m.kind, m.salience, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the summarizer's JSON answer, unwrapping a fenced code block.
pub fn parse_identity(raw: &str) -> Result<Identity> {
    let mut body = raw;
    if raw.contains("```") {
        body = raw
            .split("```")
            .nth(1)
            .ok_or_else(|| Error::MalformedSummary("unterminated code fence".into()))?;
        body = body.strip_prefix("json").unwrap_or(body);
    }

    let parsed: Value = serde_json::from_str(body.trim())
        .map_err(|e| Error::MalformedSummary(e.to_string()))?;
    let object = parsed
        .as_object()
        .ok_or_else(|| Error::MalformedSummary("expected a JSON object".into()))?;

    Ok(Identity {
        summary: object
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        traits: entries(object, "traits", Value::as_f64),
        relationships: entries(object, "relationships", |v| v.as_str().map(str::to_string)),
    })
}

/// Entries of the object under `key` that `convert` accepts; others are skipped.
fn entries<T>(
    object: &Map<String, Value>,
    key: &str,
    convert: impl Fn(&Value) -> Option<T>,
) -> BTreeMap<String, T> {
    object
        .get(key)
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(name, value)| convert(value).map(|v| (name.clone(), v)))
                .collect()
        })
        .unwrap_or_default()
}

/// [`parse_identity`], keeping a prefix of the raw text as the summary on
/// failure.
pub fn identity_or_fallback(raw: &str) -> Identity {
    match parse_identity(raw) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = %e, "Summary was not valid identity JSON, keeping raw text");
            Identity::with_summary(truncate_chars(raw, SUMMARY_FALLBACK_CHARS))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kore_bridge_core::MemoryKind;

    #[test]
    fn test_parse_plain_json() {
        let identity = parse_identity(
            r#"{"summary": "Tutor.", "traits": {"patient": 0.9}, "relationships": {"ana": "student"}}"#,
        )
        .unwrap();
        assert_eq!(identity.summary, "Tutor.");
        assert_eq!(identity.traits["patient"], 0.9);
        assert_eq!(identity.relationships["ana"], "student");
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "Here you go:\n```json\n{\"summary\": \"Fenced.\"}\n```\nDone.";
        let identity = parse_identity(raw).unwrap();
        assert_eq!(identity.summary, "Fenced.");
        assert!(identity.traits.is_empty());
    }

    #[test]
    fn test_partial_fields_keep_the_rest() {
        let identity = parse_identity(
            r#"{"summary": null, "traits": {"curious": 0.8, "loud": "very"}, "relationships": {"ana": "student", "bob": 3}}"#,
        )
        .unwrap();
        assert_eq!(identity.summary, "");
        assert_eq!(identity.traits.len(), 1);
        assert_eq!(identity.traits["curious"], 0.8);
        assert_eq!(identity.relationships.len(), 1);
        assert_eq!(identity.relationships["ana"], "student");

        let identity = parse_identity(r#"{"summary": "Only a summary", "traits": null}"#).unwrap();
        assert_eq!(identity.summary, "Only a summary");
        assert!(identity.traits.is_empty());
    }

    #[test]
    fn test_non_object_json_is_malformed() {
        assert!(matches!(parse_identity("[1, 2, 3]"), Err(Error::MalformedSummary(_))));
    }

    #[test]
    fn test_non_json_falls_back_to_prefix() {
        let raw = "I think this assistant is curious. ".repeat(40);
        assert!(matches!(parse_identity(&raw), Err(Error::MalformedSummary(_))));

        let identity = identity_or_fallback(&raw);
        assert_eq!(identity.summary.chars().count(), SUMMARY_FALLBACK_CHARS);
        assert!(raw.starts_with(&identity.summary));
        assert!(identity.traits.is_empty());
        assert!(identity.relationships.is_empty());
    }

    #[test]
    fn test_format_memories() {
        let memory = Memory {
            id: "1".into(),
            content: "User: hi".into(),
            kind: MemoryKind::Episodic,
            source: "s".into(),
            tags: vec![],
            salience: 0.5,
            created_at: Utc::now(),
        };
        assert_eq!(format_memories(&[memory]), "- [episodic] (salience=0.50) User: hi");
    }
}
