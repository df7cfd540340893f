//! System context assembly.

use kore_bridge_core::types::{Identity, Memory};

/// Memories listed in the context, at most.
pub const CONTEXT_MEMORY_LIMIT: usize = 10;
/// Traits listed in the identity line, at most.
pub const CONTEXT_TRAIT_LIMIT: usize = 5;

const NO_IDENTITY: &str = "No established identity yet.";
const NO_MEMORIES: &str = "No relevant memories.";

/// Render the system message sent ahead of the user prompt.
///
/// Deterministic in its inputs: the same identity, memories and addendum
/// always produce the same text.
pub fn build_context(identity: &Identity, memories: &[Memory], extra_system: Option<&str>) -> String {
    let identity_text = identity_text(identity);

    let memory_text = memories
        .iter()
        .take(CONTEXT_MEMORY_LIMIT)
        .map(|m| format!("- {}", m.content))
        .collect::<Vec<_>>()
        .join("\n");

    let context = format!(
        "You are an AI assistant with persistent memory and evolving identity.\n\n\
         {}\n\n\
         Relevant memories:\n\
         {}\n\n\
         Use this context naturally. Don't explicitly mention \"my memories say...\" \u{2014} just be informed by them.",
        identity_text.as_deref().unwrap_or(NO_IDENTITY),
        if memory_text.is_empty() { NO_MEMORIES } else { memory_text.as_str() },
    );

    match extra_system.filter(|s| !s.is_empty()) {
        Some(extra) => format!("{}\n\n{}", extra, context),
        None => context,
    }
}

fn identity_text(identity: &Identity) -> Option<String> {
    if identity.summary.is_empty() {
        return None;
    }
    let mut text = format!("Your identity: {}", identity.summary);
    let top = identity.top_traits(CONTEXT_TRAIT_LIMIT);
    if !top.is_empty() {
        text.push_str(&format!("\nKey traits: {}", top.join(", ")));
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kore_bridge_core::MemoryKind;

    fn memory(content: &str) -> Memory {
        Memory {
            id: content.into(),
            content: content.into(),
            kind: MemoryKind::Semantic,
            source: "s".into(),
            tags: vec![],
            salience: 1.0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_context_uses_placeholders() {
        let context = build_context(&Identity::default(), &[], None);
        assert!(context.starts_with("You are an AI assistant with persistent memory"));
        assert!(context.contains("\n\nNo established identity yet.\n\n"));
        assert!(context.contains("Relevant memories:\nNo relevant memories.\n\n"));
    }

    #[test]
    fn test_identity_lists_top_five_traits() {
        let mut identity = Identity::with_summary("A math tutor.");
        for (name, score) in [("a", 0.1), ("b", 0.9), ("c", 0.8), ("d", 0.7), ("e", 0.6), ("f", 0.5)] {
            identity.traits.insert(name.into(), score);
        }
        let context = build_context(&identity, &[], None);
        assert!(context.contains("Your identity: A math tutor.\nKey traits: b, c, d, e, f\n"));
    }

    #[test]
    fn test_memories_capped_at_ten() {
        let memories: Vec<Memory> = (0..12).map(|i| memory(&format!("fact {}", i))).collect();
        let context = build_context(&Identity::default(), &memories, None);
        assert!(context.contains("- fact 0\n- fact 1\n"));
        assert!(context.contains("- fact 9\n\n"));
        assert!(!context.contains("fact 10"));
    }

    #[test]
    fn test_extra_system_is_prepended() {
        let context = build_context(&Identity::default(), &[], Some("Answer in French."));
        assert!(context.starts_with("Answer in French.\n\nYou are an AI assistant"));
        assert_eq!(
            build_context(&Identity::default(), &[], Some("")),
            build_context(&Identity::default(), &[], None)
        );
    }
}
