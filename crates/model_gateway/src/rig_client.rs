//! Rig LLM client adapter.
//!
//! Wraps Rig's Agent so hosted and local models implement [`Provider`].
//! System messages become the agent preamble; the remaining conversation is
//! sent as the prompt.

use async_trait::async_trait;

use kore_bridge_core::{
    traits::Provider,
    types::{ChatMessage, Completion},
    Error, Result,
};

// Import required Rig traits
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;

/// Backend family served through Rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigBackend {
    OpenAI,
    Anthropic,
    /// Local model served by Ollama (`OLLAMA_API_BASE_URL`).
    Ollama,
}

impl RigBackend {
    /// Environment variable the Rig client reads its credentials from.
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Ollama => "OLLAMA_API_BASE_URL",
        }
    }
}

/// Configuration for a Rig-backed provider.
#[derive(Debug, Clone)]
pub struct RigConfig {
    pub backend: RigBackend,
    /// Model name.
    pub model: String,
    /// Temperature (0.0 - 1.0).
    pub temperature: Option<f64>,
    /// Max tokens.
    pub max_tokens: u64,
}

impl RigConfig {
    fn with_backend(backend: RigBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature: None,
            max_tokens: 4096,
        }
    }

    pub fn openai(model: impl Into<String>) -> Self {
        Self::with_backend(RigBackend::OpenAI, model)
    }

    pub fn anthropic(model: impl Into<String>) -> Self {
        Self::with_backend(RigBackend::Anthropic, model)
    }

    pub fn ollama(model: impl Into<String>) -> Self {
        Self::with_backend(RigBackend::Ollama, model)
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temp: Option<f64>) -> Self {
        self.temperature = temp;
        self
    }
}

/// Split a conversation into the agent preamble and the prompt text.
///
/// A lone user turn is sent verbatim; longer conversations are flattened
/// into a role-labelled transcript.
fn split_messages(messages: &[ChatMessage]) -> (Option<String>, String) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .collect();
    let rest: Vec<&ChatMessage> = messages.iter().filter(|m| m.role != "system").collect();

    let preamble = (!system.is_empty()).then(|| system.join("\n\n"));

    let prompt = match rest.as_slice() {
        [only] if only.role == "user" => only.content.clone(),
        _ => {
            let mut prompt = String::new();
            for msg in rest {
                match msg.role.as_str() {
                    "user" => prompt.push_str(&format!("User: {}\n\n", msg.content)),
                    "assistant" => prompt.push_str(&format!("Assistant: {}\n\n", msg.content)),
                    other => prompt.push_str(&format!("{}: {}\n\n", other, msg.content)),
                }
            }
            prompt.trim_end().to_string()
        }
    };

    (preamble, prompt)
}

/// Rig-based provider.
pub struct RigProvider {
    config: RigConfig,
}

impl RigProvider {
    pub fn new(config: RigConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    fn ensure_env(&self) -> Result<()> {
        // Check env var first to avoid panic inside from_env
        let var = self.config.backend.env_var();
        if std::env::var(var).is_err() {
            return Err(Error::provider(format!("{} not set", var)));
        }
        Ok(())
    }

    async fn call_openai(&self, preamble: Option<&str>, prompt: &str) -> Result<String> {
        use rig::providers::openai;

        let client = openai::Client::from_env();
        let mut builder = client
            .agent(&self.config.model)
            .max_tokens(self.config.max_tokens);
        if let Some(system) = preamble {
            builder = builder.preamble(system);
        }
        if let Some(t) = self.config.temperature {
            builder = builder.temperature(t);
        }

        builder
            .build()
            .prompt(prompt)
            .await
            .map_err(|e| Error::provider(format!("OpenAI error: {}", e)))
    }

    async fn call_anthropic(&self, preamble: Option<&str>, prompt: &str) -> Result<String> {
        use rig::providers::anthropic;

        let client = anthropic::Client::from_env();
        let mut builder = client
            .agent(&self.config.model)
            .max_tokens(self.config.max_tokens);
        if let Some(system) = preamble {
            builder = builder.preamble(system);
        }
        if let Some(t) = self.config.temperature {
            builder = builder.temperature(t);
        }

        builder
            .build()
            .prompt(prompt)
            .await
            .map_err(|e| Error::provider(format!("Anthropic error: {}", e)))
    }

    async fn call_ollama(&self, preamble: Option<&str>, prompt: &str) -> Result<String> {
        use rig::providers::ollama;

        let client = ollama::Client::from_env();
        let mut builder = client.agent(&self.config.model);
        if let Some(system) = preamble {
            builder = builder.preamble(system);
        }
        if let Some(t) = self.config.temperature {
            builder = builder.temperature(t);
        }

        builder
            .build()
            .prompt(prompt)
            .await
            .map_err(|e| Error::provider(format!("Ollama error: {}", e)))
    }

    async fn call(&self, preamble: Option<&str>, prompt: &str) -> Result<String> {
        self.ensure_env()?;

        tracing::debug!(
            backend = ?self.config.backend,
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Calling LLM"
        );

        match self.config.backend {
            RigBackend::OpenAI => self.call_openai(preamble, prompt).await,
            RigBackend::Anthropic => self.call_anthropic(preamble, prompt).await,
            RigBackend::Ollama => self.call_ollama(preamble, prompt).await,
        }
    }
}

#[async_trait]
impl Provider for RigProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        let (preamble, prompt) = split_messages(messages);
        self.call(preamble.as_deref(), &prompt).await.map(Completion::text)
    }

    async fn summarize(&self, text: &str, instruction: &str) -> Result<Completion> {
        self.call(Some(instruction), text).await.map(Completion::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = RigConfig::anthropic("claude-3-5-haiku-latest").with_temperature(Some(0.2));
        assert_eq!(config.backend, RigBackend::Anthropic);
        assert_eq!(config.model, "claude-3-5-haiku-latest");
        assert_eq!(config.temperature, Some(0.2));
        assert_eq!(config.max_tokens, 4096);
    }

    #[test]
    fn test_split_single_turn() {
        let (preamble, prompt) = split_messages(&[
            ChatMessage::system("You are helpful"),
            ChatMessage::user("Hello"),
        ]);
        assert_eq!(preamble.as_deref(), Some("You are helpful"));
        assert_eq!(prompt, "Hello");
    }

    #[test]
    fn test_split_multi_turn_transcript() {
        let (preamble, prompt) = split_messages(&[
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello!"),
            ChatMessage::user("How are you?"),
        ]);
        assert!(preamble.is_none());
        assert_eq!(prompt, "User: Hi\n\nAssistant: Hello!\n\nUser: How are you?");
    }

    #[tokio::test]
    async fn test_missing_credentials_is_provider_error() {
        let provider = RigProvider::new(RigConfig::ollama("llama3"));
        if std::env::var("OLLAMA_API_BASE_URL").is_ok() {
            return;
        }
        let err = provider.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, Error::Provider(msg) if msg.contains("OLLAMA_API_BASE_URL")));
    }
}
