//! Command-line surface: `serve` (the default) plus small config utilities.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "agentcore", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Validate the configuration file and exit nonzero on error.
    ConfigValidate,
    /// Print version information.
    Version,
}

/// Load configuration from the path named by `AGENTCORE_CONFIG`, falling
/// back to `config.toml`, or to defaults if neither exists.
pub fn load_config() -> anyhow::Result<(agentcore_domain::config::Config, String)> {
    let config_path = std::env::var("AGENTCORE_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        agentcore_domain::config::Config::default()
    };

    Ok((config, config_path))
}
