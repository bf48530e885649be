use anyhow::{bail, Result};
use crosschain_assembler::WorkflowParams;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct Config {
    pub ckb_rpc: String,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub params: WorkflowParams,
    pub scripts: ScriptPaths,
}

/// Locations of the compiled on-chain binaries.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct ScriptPaths {
    pub simple_udt: PathBuf,
    pub relay_type: PathBuf,
    pub crosschain_lock: PathBuf,
    #[serde(default)]
    pub always_success: Option<PathBuf>,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)?;
        if config.page_size == 0 {
            bail!("page_size must be at least 1");
        }
        Ok(config)
    }
}

fn default_state_file() -> PathBuf {
    PathBuf::from("crosschain-state.json")
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_page_size() -> u32 {
    64
}
