//! Provider registry: constructs every configured LLM provider instance at
//! startup, resolving credentials eagerly (env vars are read at this point).
//! A provider that fails to initialize is logged and skipped rather than
//! aborting the whole boot, unless `providers.require_one` is set and every
//! single provider failed.

use std::collections::HashMap;
use std::sync::Arc;

use agentcore_domain::config::ProvidersConfig;
use agentcore_domain::{Error, Result};

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;

#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub kind: String,
    pub error: String,
}

/// Mask substrings that look like API keys or bearer tokens before they
/// reach a log line or an init-error list.
fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20 && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    default_models: HashMap<String, String>,
    init_errors: Vec<ProviderInitError>,
}

impl ProviderRegistry {
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        let mut default_models = HashMap::new();
        let mut init_errors = Vec::new();

        for entry in &config.entries {
            let result: Result<Arc<dyn LlmProvider>> = match entry.kind.as_str() {
                "anthropic" => AnthropicProvider::from_config(entry).map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
                "openai_compat" => {
                    OpenAiCompatProvider::from_config(entry).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
                other => Err(Error::Config(format!("unknown provider kind '{}'", other))),
            };

            match result {
                Ok(provider) => {
                    tracing::info!(provider_id = %entry.id, kind = %entry.kind, "registered LLM provider");
                    default_models.insert(entry.id.clone(), entry.default_model.clone());
                    providers.insert(entry.id.clone(), provider);
                }
                Err(e) => {
                    let safe_error = mask_secrets(&e.to_string());
                    tracing::warn!(
                        provider_id = %entry.id,
                        kind = %entry.kind,
                        error = %safe_error,
                        "failed to initialize LLM provider, skipping"
                    );
                    init_errors.push(ProviderInitError {
                        provider_id: entry.id.clone(),
                        kind: entry.kind.clone(),
                        error: safe_error,
                    });
                }
            }
        }

        if providers.is_empty() && !config.entries.is_empty() && config.require_one {
            return Err(Error::Config(
                "all configured LLM providers failed to initialize (providers.require_one is set)".to_string(),
            ));
        }
        if providers.is_empty() && !config.entries.is_empty() {
            tracing::warn!(
                failed_providers = init_errors.len(),
                "no LLM providers initialized; gateway will boot but chat endpoints will fail until auth is fixed"
            );
        }

        Ok(Self {
            providers,
            default_models,
            init_errors,
        })
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    pub fn default_model(&self, provider_id: &str) -> Option<&str> {
        self.default_models.get(provider_id).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn LlmProvider>)> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_alnum_tokens() {
        let masked = mask_secrets("request failed: key sk-abcdefghijklmnopqrstuvwxyz rejected");
        assert!(!masked.contains("abcdefghijklmnopqrstuvwxyz"));
    }

    #[test]
    fn unknown_provider_kind_is_recorded_as_init_error_not_a_hard_failure() {
        let config = ProvidersConfig {
            entries: vec![agentcore_domain::config::ProviderEntry {
                id: "mystery".to_string(),
                kind: "carrier-pigeon".to_string(),
                base_url: "https://example.com".to_string(),
                api_key_env: None,
                api_key: Some("sk-test".to_string()),
                default_model: "m".to_string(),
            }],
            require_one: false,
        };
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.init_errors().len(), 1);
    }

    #[test]
    fn require_one_with_all_providers_failing_is_a_hard_error() {
        let config = ProvidersConfig {
            entries: vec![agentcore_domain::config::ProviderEntry {
                id: "mystery".to_string(),
                kind: "carrier-pigeon".to_string(),
                base_url: "https://example.com".to_string(),
                api_key_env: None,
                api_key: Some("sk-test".to_string()),
                default_model: "m".to_string(),
            }],
            require_one: true,
        };
        assert!(ProviderRegistry::from_config(&config).is_err());
    }

    #[test]
    fn valid_provider_registers_successfully() {
        let config = ProvidersConfig {
            entries: vec![agentcore_domain::config::ProviderEntry {
                id: "anthropic".to_string(),
                kind: "anthropic".to_string(),
                base_url: "https://api.anthropic.com".to_string(),
                api_key_env: None,
                api_key: Some("sk-test-key".to_string()),
                default_model: "claude-3-5-sonnet".to_string(),
            }],
            require_one: false,
        };
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("anthropic").is_some());
        assert_eq!(registry.default_model("anthropic"), Some("claude-3-5-sonnet"));
    }
}
