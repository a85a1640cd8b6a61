//! Layered configuration with collect-all-issues validation, in the style of
//! the rest of the ambient stack: `validate()` never bails on the first
//! problem, so an operator sees every misconfiguration in one pass.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{}] {}: {}", tag, self.field, self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default = "default_api_token_env")]
    pub api_token_env: String,
}

fn default_api_token_env() -> String {
    "AGENTCORE_API_TOKEN".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_allowed_origins: Vec::new(),
            api_token_env: default_api_token_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEntry {
    pub id: String,
    pub kind: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub default_model: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersConfig {
    #[serde(default)]
    pub entries: Vec<ProviderEntry>,
    #[serde(default)]
    pub require_one: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubsubConfig {
    #[serde(default = "default_buffer_capacity")]
    pub subscriber_buffer_capacity: usize,
    #[serde(default)]
    pub backpressure_policy: BackpressurePolicy,
}

fn default_buffer_capacity() -> usize {
    1000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    #[default]
    Block,
    Drop,
}

impl Default for PubsubConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer_capacity: default_buffer_capacity(),
            backpressure_policy: BackpressurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsConfig {
    #[serde(default)]
    pub global_allowed: Vec<String>,
    #[serde(default)]
    pub global_blocked: Vec<String>,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    num_cpus_fallback()
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            global_allowed: Vec::new(),
            global_blocked: Vec::new(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceConfig {
    pub database_path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: "./data/agentcore.sqlite3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentLoopConfig {
    #[serde(default = "default_input_channel_capacity")]
    pub input_channel_capacity: usize,
    #[serde(default = "default_max_turns_per_run")]
    pub max_turns_per_run: u32,
}

fn default_input_channel_capacity() -> usize {
    100
}

fn default_max_turns_per_run() -> u32 {
    25
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            input_channel_capacity: default_input_channel_capacity(),
            max_turns_per_run: default_max_turns_per_run(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub pubsub: PubsubConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub agent_loop: AgentLoopConfig,
}

impl Config {
    /// Validate every sub-config and return all issues found; an empty
    /// result with no `ConfigSeverity::Error` entries means the config is
    /// safe to boot with (warnings are advisory).
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut issues = Vec::new();

        if self.server.host.is_empty() {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".to_string(),
                message: "host must not be empty".to_string(),
            });
        }
        if self.server.port == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".to_string(),
                message: "port must be nonzero".to_string(),
            });
        }
        if self
            .server
            .cors_allowed_origins
            .iter()
            .any(|o| o == "*")
        {
            issues.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors_allowed_origins".to_string(),
                message: "wildcard CORS origin allows any site to call this API".to_string(),
            });
        }

        let mut seen_ids = std::collections::HashSet::new();
        for entry in &self.providers.entries {
            if entry.id.is_empty() {
                issues.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "providers.entries[].id".to_string(),
                    message: "provider id must not be empty".to_string(),
                });
            } else if !seen_ids.insert(entry.id.clone()) {
                issues.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("providers.entries[{}].id", entry.id),
                    message: format!("duplicate provider id '{}'", entry.id),
                });
            }
            if entry.base_url.is_empty() {
                issues.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("providers.entries[{}].base_url", entry.id),
                    message: "base_url must not be empty".to_string(),
                });
            } else if !entry.base_url.starts_with("http://") && !entry.base_url.starts_with("https://") {
                issues.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("providers.entries[{}].base_url", entry.id),
                    message: "base_url must be an http(s) URL".to_string(),
                });
            }
            if entry.api_key.is_none() && entry.api_key_env.is_none() {
                issues.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("providers.entries[{}]", entry.id),
                    message: "no api_key or api_key_env configured; provider calls will fail auth"
                        .to_string(),
                });
            }
        }
        if self.providers.require_one && self.providers.entries.is_empty() {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "providers".to_string(),
                message: "require_one is set but no providers are configured".to_string(),
            });
        }

        if self.pubsub.subscriber_buffer_capacity == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "pubsub.subscriber_buffer_capacity".to_string(),
                message: "buffer capacity must be nonzero".to_string(),
            });
        }

        if self.tools.max_concurrency == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tools.max_concurrency".to_string(),
                message: "max_concurrency must be nonzero".to_string(),
            });
        }
        for pattern in self.tools.global_blocked.iter().chain(&self.tools.global_allowed) {
            if pattern.is_empty() {
                issues.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: "tools".to_string(),
                    message: "empty function-name pattern will never match".to_string(),
                });
            }
        }

        if self.persistence.database_path.is_empty() {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "persistence.database_path".to_string(),
                message: "database_path must not be empty".to_string(),
            });
        }

        if self.agent_loop.input_channel_capacity == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "agent_loop.input_channel_capacity".to_string(),
                message: "input_channel_capacity must be nonzero".to_string(),
            });
        }
        if self.agent_loop.max_turns_per_run == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "agent_loop.max_turns_per_run".to_string(),
                message: "max_turns_per_run must be nonzero".to_string(),
            });
        }

        issues
    }

    pub fn has_errors(issues: &[ConfigError]) -> bool {
        issues.iter().any(|i| i.severity == ConfigSeverity::Error)
    }
}
