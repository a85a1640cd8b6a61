use agentcore_domain::Error;

/// Map a `reqwest::Error` onto the crate error taxonomy, distinguishing
/// timeouts (retryable) from other transport failures.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Provider {
            provider: "http".to_string(),
            message: format!("request timed out: {}", e),
        }
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve a provider's API key: an explicit plaintext value in config wins
/// (with a tracing warning, since it means the secret sits in the config
/// file); otherwise read the named environment variable. Anything else is a
/// configuration error raised at provider construction time, not a runtime
/// panic.
pub fn resolve_api_key(api_key: &Option<String>, api_key_env: &Option<String>) -> Result<String, Error> {
    if let Some(key) = api_key {
        tracing::warn!("using plaintext api_key from config; prefer api_key_env");
        return Ok(key.clone());
    }
    if let Some(env_name) = api_key_env {
        return std::env::var(env_name).map_err(|_| {
            Error::Config(format!(
                "environment variable '{}' is not set",
                env_name
            ))
        });
    }
    Err(Error::Config(
        "provider has neither api_key nor api_key_env configured".to_string(),
    ))
}
