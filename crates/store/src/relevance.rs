//! Keyword relevance used by the reference stores.
//!
//! A memory scores one point per distinct query token it contains, weighted
//! by its salience. Ties go to the most recent memory.

use std::cmp::Ordering;
use std::collections::HashSet;

use kore_bridge_core::{normalize, Memory};

/// Distinct lowercase alphanumeric tokens of `text`.
pub fn tokens(text: &str) -> HashSet<String> {
    normalize(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Overlap score of `memory` against pre-tokenized query terms.
pub fn score(terms: &HashSet<String>, memory: &Memory) -> f64 {
    let content = tokens(&memory.content);
    let overlap = terms.iter().filter(|t| content.contains(*t)).count();
    overlap as f64 * memory.salience
}

/// Rank `candidates` for `query` and keep the best `limit`.
///
/// An empty query ranks purely by recency. Otherwise memories sharing no
/// token with the query are dropped.
pub fn rank(candidates: Vec<Memory>, query: &str, limit: usize) -> Vec<Memory> {
    let terms = tokens(query);

    let mut scored: Vec<(f64, Memory)> = candidates
        .into_iter()
        .map(|m| (if terms.is_empty() { 0.0 } else { score(&terms, &m) }, m))
        .filter(|(s, _)| terms.is_empty() || *s > 0.0)
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.1.created_at.cmp(&a.1.created_at))
    });

    scored.into_iter().take(limit).map(|(_, m)| m).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use kore_bridge_core::MemoryKind;

    fn memory(content: &str, age_secs: i64) -> Memory {
        Memory {
            id: content.to_string(),
            content: content.to_string(),
            kind: MemoryKind::Semantic,
            source: "s".into(),
            tags: vec![],
            salience: 1.0,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_tokens_ignore_punctuation_and_case() {
        let t = tokens("Hello, WORLD! hello?");
        assert_eq!(t.len(), 2);
        assert!(t.contains("hello"));
        assert!(t.contains("world"));
    }

    #[test]
    fn test_rank_prefers_overlap_then_recency() {
        let memories = vec![
            memory("rust is fast", 30),
            memory("python is flexible", 20),
            memory("rust and python", 10),
            memory("unrelated", 0),
        ];

        let ranked = rank(memories, "rust python", 10);
        let ids: Vec<&str> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["rust and python", "python is flexible", "rust is fast"]);
    }

    #[test]
    fn test_empty_query_returns_most_recent() {
        let memories = vec![memory("old", 100), memory("new", 1), memory("mid", 50)];
        let ranked = rank(memories, "   ", 2);
        let ids: Vec<&str> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }
}
