use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

// =============================================================================
// Memory Types
// =============================================================================

/// Category of a stored memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// Something that happened (conversation turns).
    Episodic,
    /// A fact about the world or the user.
    #[default]
    Semantic,
    /// How to do something.
    Procedural,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            "procedural" => Ok(Self::Procedural),
            other => Err(Error::storage(format!("unknown memory kind '{}'", other))),
        }
    }
}

/// A memory as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Unique ID.
    pub id: String,
    /// The text content.
    pub content: String,
    /// Category.
    pub kind: MemoryKind,
    /// Scope that produced the memory.
    pub source: String,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Store-assigned importance in `[0, 1]`.
    pub salience: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Input to `MemoryStore::store`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMemory {
    pub content: String,
    pub kind: MemoryKind,
    pub source: String,
    pub tags: Vec<String>,
}

impl NewMemory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: MemoryKind::default(),
            source: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: MemoryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Self-description distilled from memories by `reflect`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Short prose summary.
    #[serde(default)]
    pub summary: String,
    /// Trait name to confidence score.
    #[serde(default)]
    pub traits: BTreeMap<String, f64>,
    /// Counterpart name to relationship description.
    #[serde(default)]
    pub relationships: BTreeMap<String, String>,
}

impl Identity {
    pub fn with_summary(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Default::default()
        }
    }

    /// The `n` highest-scoring trait names; equal scores keep name order.
    pub fn top_traits(&self, n: usize) -> Vec<&str> {
        let mut ranked: Vec<(&String, &f64)> = self.traits.iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.into_iter().take(n).map(|(name, _)| name.as_str()).collect()
    }
}
