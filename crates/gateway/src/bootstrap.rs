//! [`AppState`] construction, extracted from `main.rs` so CLI subcommands
//! other than `serve` can boot the same runtime without an HTTP listener.

use std::sync::Arc;

use agentcore_agentloop::{AgentLoopManager, ProviderLookup};
use agentcore_domain::config::{Config, ConfigSeverity};
use agentcore_persistence::Store;
use agentcore_providers::ProviderRegistry;
use agentcore_pubsub::Publisher;
use agentcore_tools::{Dispatcher, FunctionFilter, ToolRegistry};
use anyhow::Context;

use crate::auth;
use crate::state::AppState;

/// Validate config, initialize every subsystem, and return a fully-wired
/// [`AppState`]. Shared by `serve` and any future one-shot CLI command.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if Config::has_errors(&issues) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let providers = Arc::new(
        ProviderRegistry::from_config(&config.providers).context("initializing LLM providers")?,
    );
    if providers.is_empty() {
        tracing::warn!("no LLM providers initialized — chat endpoints will fail until one is configured");
    } else {
        tracing::info!(providers = providers.len(), "LLM provider registry ready");
    }

    let store = Arc::new(
        Store::open(&config.persistence.database_path).context("opening persistence store")?,
    );
    tracing::info!(path = %config.persistence.database_path, "persistence store ready");

    let tools = Arc::new(ToolRegistry::new());
    let function_filter = FunctionFilter::new(
        config.tools.global_blocked.clone(),
        config.tools.global_allowed.clone(),
    );
    let dispatcher = Arc::new(Dispatcher::with_filter(tools, config.tools.max_concurrency, function_filter));
    tracing::info!(max_concurrency = config.tools.max_concurrency, "tool dispatcher ready");

    let publisher = Arc::new(Publisher::new(
        config.pubsub.subscriber_buffer_capacity,
        config.pubsub.backpressure_policy,
    ));
    tracing::info!(
        capacity = config.pubsub.subscriber_buffer_capacity,
        policy = ?config.pubsub.backpressure_policy,
        "publisher ready"
    );

    let provider_lookup: Arc<dyn ProviderLookup> = providers.clone();
    let manager = Arc::new(AgentLoopManager::new(
        config.agent_loop.clone(),
        provider_lookup,
        dispatcher,
        store.clone(),
        publisher,
    ));
    tracing::info!(
        input_channel_capacity = config.agent_loop.input_channel_capacity,
        max_turns_per_run = config.agent_loop.max_turns_per_run,
        "agent loop manager ready"
    );

    let api_token_hash = Arc::new(auth::load_token_hash(&config.server.api_token_env));

    Ok(AppState { config, providers, manager, store, api_token_hash })
}
