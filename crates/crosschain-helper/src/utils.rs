use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use ckb_jsonrpc_types::DepType;
use ckb_sdk::{
    traits::{CellDepResolver, DefaultCellDepResolver},
    CkbRpcClient,
};
use ckb_types::{core::BlockView, packed::CellDep, H256};
use clap::ArgMatches;
use crosschain_assembler::{
    config::{ALWAYS_SUCCESS, CROSSCHAIN_LOCK, RELAY_TYPE, SIMPLE_UDT},
    FullScript, ScriptBinary, ScriptSet, SighashSigner, WorkflowState,
};
use log::info;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub fn build_config(top_matches: &ArgMatches) -> Result<Config> {
    let config_path = top_matches
        .get_one::<PathBuf>("config")
        .ok_or_else(|| anyhow!("missing --config"))?;
    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("read config {}", config_path.display()))?;
    Config::from_toml(&content).with_context(|| format!("parse config {}", config_path.display()))
}

pub fn build_signer(top_matches: &ArgMatches, wallet: &str) -> Result<SighashSigner> {
    let wallet_path = top_matches
        .get_one::<PathBuf>(wallet)
        .ok_or_else(|| anyhow!("missing --{} wallet file", wallet))?;
    let private_key = read_private_key(wallet_path)?;
    SighashSigner::from_private_key(&private_key)
        .with_context(|| format!("load {} key from {}", wallet, wallet_path.display()))
}

pub fn read_private_key(path: &Path) -> Result<H256> {
    let wallet_content = std::fs::read_to_string(path)
        .with_context(|| format!("read wallet {}", path.display()))?;
    let wallet_content = wallet_content.trim();
    let hex = wallet_content.strip_prefix("0x").unwrap_or(wallet_content);
    H256::from_str(hex).map_err(|e| anyhow!("parse raw private key: {:?}", e))
}

fn read_binary(name: &str, path: &Path) -> Result<ScriptBinary> {
    let data = std::fs::read(path).with_context(|| format!("read {} binary {}", name, path.display()))?;
    let binary = ScriptBinary::new(name, data);
    info!(
        "loaded {} ({} bytes, code hash {:#x})",
        name,
        binary.data.len(),
        binary.code_hash
    );
    Ok(binary)
}

pub fn load_scripts(config: &Config) -> Result<ScriptSet> {
    let paths = &config.scripts;
    Ok(ScriptSet {
        simple_udt: read_binary(SIMPLE_UDT, &paths.simple_udt)?,
        relay_type: read_binary(RELAY_TYPE, &paths.relay_type)?,
        crosschain_lock: read_binary(CROSSCHAIN_LOCK, &paths.crosschain_lock)?,
        always_success: paths
            .always_success
            .as_ref()
            .map(|path| read_binary(ALWAYS_SUCCESS, path))
            .transpose()?,
    })
}

/// Cell dep of the genesis secp256k1 sighash lock, as listed in the
/// genesis block.
pub fn resolve_sighash_dep(client: &CkbRpcClient, signer: &SighashSigner) -> Result<CellDep> {
    let genesis_block = client
        .get_block_by_number(0.into())
        .map_err(|e| anyhow!("fetch genesis block: {}", e))?
        .ok_or_else(|| anyhow!("node has no genesis block"))?;
    let resolver = DefaultCellDepResolver::from_genesis(&BlockView::from(genesis_block))
        .map_err(|e| anyhow!("parse genesis block: {:?}", e))?;
    resolver
        .resolve(signer.lock_script())
        .ok_or_else(|| anyhow!("genesis block carries no sighash cell dep"))
}

pub fn load_state(path: &Path) -> Result<WorkflowState> {
    if !path.exists() {
        return Ok(WorkflowState::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read state file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse state file {}", path.display()))
}

pub fn save_state(path: &Path, state: &WorkflowState) -> Result<()> {
    let json = serde_json::to_string_pretty(state).context("serialize state")?;
    // Written aside first so a crash never leaves a truncated state file
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    info!("saved workflow state to {}", path.display());
    Ok(())
}

pub fn print_script(script: &FullScript, prefix: Option<String>) {
    let prefix = prefix.unwrap_or("".to_string());

    println!(
        "{}script.code_hash = \"{:#x}\"",
        prefix, script.script.code_hash
    );
    println!(
        "{}script.hash_type = \"{}\"",
        prefix, script.script.hash_type
    );
    println!(
        "{}script.args = \"0x{:x}\"",
        prefix,
        script.script.args.clone().into_bytes()
    );
    println!(
        "{}cell_dep.out_point.tx_hash = \"{:#x}\"",
        prefix, script.cell_dep.out_point.tx_hash
    );
    println!(
        "{}cell_dep.out_point.index = \"{}\"",
        prefix, script.cell_dep.out_point.index
    );
    println!(
        "{}cell_dep.dep_type = \"{}\"",
        prefix,
        match script.cell_dep.dep_type {
            DepType::Code => "code",
            DepType::DepGroup => "dep_group",
        }
    );
}
