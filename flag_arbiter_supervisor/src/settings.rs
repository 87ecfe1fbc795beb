//! Process-level settings, loaded from JSON. Every field has a default, so an
//! empty object (or no file at all) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use flag_arbiter_core::{Action, EngineCfg};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SupervisorError};
use crate::logging::LogCfg;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SupervisorCfg {
    /// Flag document to load at boot and write on save.
    pub flags_path: Option<PathBuf>,
    pub stabilize_interval_ms: u64,
    /// Kept longer than the stabilize period so reflection lags evaluation.
    pub reflect_interval_ms: u64,
    pub engine: EngineCfg,
    /// Applied when no upper flag is active. Empty means leave the resource alone.
    pub default_actions: Vec<Action>,
    pub log: LogCfg,
    pub save_on_shutdown: bool,
}

impl Default for SupervisorCfg {
    fn default() -> Self {
        Self {
            flags_path: None,
            stabilize_interval_ms: 100,
            reflect_interval_ms: 150,
            engine: EngineCfg::default(),
            default_actions: Vec::new(),
            log: LogCfg::default(),
            save_on_shutdown: false,
        }
    }
}

impl SupervisorCfg {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SupervisorError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn stabilize_period(&self) -> Duration {
        Duration::from_millis(self.stabilize_interval_ms.max(1))
    }

    pub fn reflect_period(&self) -> Duration {
        Duration::from_millis(self.reflect_interval_ms.max(1))
    }
}
