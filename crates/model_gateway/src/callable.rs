//! In-process provider backed by a closure.

use async_trait::async_trait;
use std::sync::Arc;

use kore_bridge_core::{
    traits::Provider,
    types::{ChatMessage, Completion},
    Result,
};

type CompleteFn = dyn Fn(&[ChatMessage]) -> Result<String> + Send + Sync;

/// Wraps any `Fn(&[ChatMessage]) -> Result<String>` as a [`Provider`].
///
/// Useful for local models, deterministic tests and demos. `summarize`
/// sends `[system: instruction, user: text]` through the same closure.
#[derive(Clone)]
pub struct CallableProvider {
    name: String,
    func: Arc<CompleteFn>,
}

impl CallableProvider {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Answers `"{prefix}: {last user message}"`.
    pub fn echo(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::new(format!("echo:{}", prefix), move |messages| {
            let last_user = messages
                .iter()
                .rev()
                .find(|m| m.role == "user")
                .map(|m| m.content.as_str())
                .unwrap_or_default();
            Ok(format!("{}: {}", prefix, last_user))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for CallableProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableProvider")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Provider for CallableProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        tracing::trace!(provider = %self.name, messages = messages.len(), "Calling in-process provider");
        (self.func)(messages).map(Completion::text)
    }

    async fn summarize(&self, text: &str, instruction: &str) -> Result<Completion> {
        self.complete(&[ChatMessage::system(instruction), ChatMessage::user(text)])
            .await
    }
}
