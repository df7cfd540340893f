use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub router: RouterConfig,
    pub experiment: ExperimentConfig,
    pub store: StoreConfig,
    pub telemetry: TelemetryConfig,
    /// Backends by routing key.
    pub providers: BTreeMap<String, ProviderSpec>,
}

/// Settings of the `think` pipeline.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    /// Seconds a cached response stays valid; 0 disables caching.
    pub cache_ttl_secs: f64,
    /// Identical queries allowed per window before falling back; 0 disables.
    pub rate_limit: u32,
    /// Rate-limit window in seconds.
    pub rate_window_secs: f64,
    /// Memories injected into the system context.
    pub recall_limit: usize,
    /// Characters kept from prompt and response in conversation memories.
    pub memory_excerpt_chars: usize,
    /// Scope used when the caller gives none.
    pub default_scope: String,
    /// Write a trace per request.
    pub enable_traces: bool,
    /// Serialize concurrent identical requests per (hash, scope).
    pub single_flight: bool,
}

impl GatewayConfig {
    pub fn caching_enabled(&self) -> bool {
        self.cache_ttl_secs > 0.0
    }

    pub fn rate_limiting_enabled(&self) -> bool {
        self.rate_limit > 0
    }

    /// Windows too large for a `Duration` saturate to `Duration::MAX`.
    pub fn rate_window(&self) -> Duration {
        Duration::try_from_secs_f64(self.rate_window_secs.max(0.0)).unwrap_or(Duration::MAX)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3600.0,
            rate_limit: 0,
            rate_window_secs: 3600.0,
            recall_limit: 10,
            memory_excerpt_chars: 200,
            default_scope: "conversation".into(),
            enable_traces: true,
            single_flight: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RouterConfig {
    /// Key used when the decision names an unregistered provider.
    /// Falls back to the first registered key when unset.
    pub default_key: Option<String>,
    /// Total message length at which the length heuristic picks "quality".
    pub length_threshold: usize,
    /// Provider key per complexity level; index is the level.
    pub complexity_keys: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_key: None,
            length_threshold: 500,
            complexity_keys: vec![
                "fast".to_string(),
                "fast".to_string(),
                "quality".to_string(),
                "quality".to_string(),
            ],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Write conversation memories during comparisons.
    pub remember: bool,
    /// Prompts in flight at once during `run_batch`.
    pub batch_concurrency: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            remember: false,
            batch_concurrency: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file; in-memory store when unset.
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub json_logs: bool,
    /// Service name reported to OpenTelemetry.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info,kore_bridge=debug".into(),
            json_logs: false,
            service_name: "kore-bridge".into(),
        }
    }
}

/// Backend definition, tagged by kind.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderSpec {
    /// In-process provider echoing the last user message behind a prefix.
    Echo { prefix: String },
    #[serde(rename = "openai")]
    OpenAi {
        model: String,
        #[serde(default)]
        temperature: Option<f64>,
    },
    Anthropic {
        model: String,
        #[serde(default)]
        temperature: Option<f64>,
    },
    /// Local model served by Ollama.
    Ollama {
        model: String,
        #[serde(default)]
        temperature: Option<f64>,
    },
}

impl AppConfig {
    /// Layered load: `config/default`, `config/{KORE_ENV}`, `config/local`,
    /// then `KORE__*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("KORE_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map KORE__GATEWAY__RATE_LIMIT=3 to gateway.rate_limit
            .add_source(Environment::with_prefix("KORE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Load a single file; the format follows its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }
}
