//! Subscriber setup for binaries and hosts.
//!
//! Libraries in this workspace only emit `tracing` events; installing a
//! subscriber is the process owner's call. `RUST_LOG` wins over the configured
//! level when set.

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::EnvFilter;

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable, for terminals.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
    Compact,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LogCfg {
    pub format: LogFormat,
    /// Fallback filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogCfg {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "info".to_string(),
        }
    }
}

fn env_filter(cfg: &LogCfg, override_filter: Option<&str>) -> EnvFilter {
    match override_filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level)),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(
    cfg: &LogCfg,
    override_filter: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = env_filter(cfg, override_filter);
    let installed = match cfg.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
    };
    installed?;
    Ok(())
}
