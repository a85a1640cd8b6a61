//! Shared application state passed to every API handler.

use std::sync::Arc;

use agentcore_agentloop::AgentLoopManager;
use agentcore_domain::config::Config;
use agentcore_persistence::Store;
use agentcore_providers::ProviderRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub providers: Arc<ProviderRegistry>,
    pub manager: Arc<AgentLoopManager>,
    pub store: Arc<Store>,
    /// SHA-256 digest of the configured API token, cached once at startup.
    /// `None` means bearer-token auth is disabled (dev mode).
    pub api_token_hash: Arc<Option<Vec<u8>>>,
}
