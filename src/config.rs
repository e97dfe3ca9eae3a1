use crate::diagnostics::Verbosity;
use crate::error::ErrorPolicy;
use crate::model::Loop;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "playq";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    #[serde(default)]
    pub verbosity: Verbosity,
    #[serde(default = "default_reset_on_previous")]
    pub reset_on_previous: bool,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default)]
    pub loop_mode: Loop,
    /// Fixed seed for shuffling. `None` seeds from the OS.
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
}

fn default_reset_on_previous() -> bool {
    true
}

fn default_min_delay_ms() -> u64 {
    2000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::default(),
            verbosity: Verbosity::default(),
            reset_on_previous: default_reset_on_previous(),
            min_delay_ms: default_min_delay_ms(),
            loop_mode: Loop::default(),
            shuffle_seed: None,
        }
    }
}

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("PLAYQ_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE))
}

pub fn load_config() -> Result<QueueConfig> {
    load_config_from(&config_path()?)
}

pub fn save_config(config: &QueueConfig) -> Result<()> {
    save_config_to(&config_path()?, config)
}

pub fn load_config_from(path: &Path) -> Result<QueueConfig> {
    if !path.exists() {
        return Ok(QueueConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: QueueConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

pub fn save_config_to(path: &Path, config: &QueueConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
