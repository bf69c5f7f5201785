use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serlink_governor::FirmwareInfo;

const CONFIG_ENV: &str = "SERLINK_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Serial port to drive. Empty runs against a simulated line.
    pub port_name: String,
    /// Mainline delay between two counter bumps.
    pub tick_ms: u64,
    /// Register the mainline bumps and touches every tick.
    pub touched_register: u8,
    /// Ticks to run in simulated mode.
    pub sim_ticks: u32,
    /// Log every byte crossing the line as hex.
    pub trace_wire: bool,
    pub firmware: FirmwareInfo,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            tick_ms: 500,
            touched_register: 5,
            sim_ticks: 4,
            trace_wire: false,
            firmware: FirmwareInfo {
                project_name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..FirmwareInfo::from_build()
            },
        }
    }
}

impl HostConfig {
    /// `$SERLINK_CONFIG`, else `<config dir>/serlink/host.json`.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join("serlink").join("host.json")))
    }

    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::info!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }
}
