mod config;
mod rpc;
mod utils;


use crate::config::Config;
use crate::rpc::RpcLedger;
use crate::utils::{
    build_config, build_signer, load_scripts, load_state, print_script, resolve_sighash_dep,
    save_state,
};
use anyhow::{anyhow, Context, Result};
use ckb_sdk::{
    traits::{
        CellCollector, CellQueryOptions, DefaultCellCollector, MaturityOption, ValueRangeOption,
    },
    HumanCapacity,
};
use ckb_types::{
    packed::{CellDep, Script},
    prelude::*,
};
use clap::{arg, command, value_parser, ArgMatches, Command};
use crosschain_assembler::{
    intents::data_script, ConfirmationTracker, PollPolicy, SighashSigner, Stage, StageError,
    Workflow, WorkflowState,
};
use std::path::PathBuf;
use std::time::Duration;

fn main() -> Result<()> {
    let _logger = flexi_logger::Logger::try_with_env_or_str("info")?.start()?;

    let matches = command!()
        .arg(
            arg!(
                -c --config <CONFIG> "Config file path"
            )
            .required(true)
            .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(
                --admin <FILE> "Wallet file of the admin, who deploys, issues and pays for the relay cell"
            )
            .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(
                --holder <FILE> "Wallet file of the token holder"
            )
            .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(--state_file <STATE_FILE> "State file to use instead of the configured one")
                .value_parser(value_parser!(PathBuf)),
        )
        .subcommand(
            Command::new("run").about("run every stage not yet recorded in the state file"),
        )
        .subcommand(
            Command::new("deploy")
                .about("deploy the sudt, relay type and crosschain lock binaries"),
        )
        .subcommand(
            Command::new("issue-udt").about("issue sudt owned by the admin lock to the holder"),
        )
        .subcommand(
            Command::new("create-relay-cell").about("create a relay cell with a unique type script"),
        )
        .subcommand(
            Command::new("lock-funds")
                .about("move the holder's token cell under the crosschain lock"),
        )
        .subcommand(
            Command::new("script-hashes")
                .about("script hashes related to the current wallets and state"),
        )
        .subcommand(
            Command::new("balance")
                .about("fetch plain ckb balance of a wallet")
                .arg(
                    arg!(--wallet <WALLET> "Wallet to inspect")
                        .value_parser(["admin", "holder"])
                        .default_value("admin"),
                ),
        )
        .subcommand(Command::new("show-state").about("print the recorded workflow state"))
        .get_matches();

    if let Some(_command_matches) = matches.subcommand_matches("run") {
        run(&matches)
    } else if let Some(_command_matches) = matches.subcommand_matches("deploy") {
        single_stage(&matches, Stage::Deploy)
    } else if let Some(_command_matches) = matches.subcommand_matches("issue-udt") {
        single_stage(&matches, Stage::IssueToken)
    } else if let Some(_command_matches) = matches.subcommand_matches("create-relay-cell") {
        single_stage(&matches, Stage::CreateRelayCell)
    } else if let Some(_command_matches) = matches.subcommand_matches("lock-funds") {
        single_stage(&matches, Stage::LockFunds)
    } else if let Some(_command_matches) = matches.subcommand_matches("script-hashes") {
        script_hashes(&matches)
    } else if let Some(command_matches) = matches.subcommand_matches("balance") {
        balance(command_matches, &matches)
    } else if let Some(_command_matches) = matches.subcommand_matches("show-state") {
        show_state(&matches)
    } else {
        Err(anyhow!("no subcommand given, see --help"))
    }
}

fn state_file(top_matches: &ArgMatches, config: &Config) -> PathBuf {
    top_matches
        .get_one::<PathBuf>("state_file")
        .cloned()
        .unwrap_or_else(|| config.state_file.clone())
}

// Everything a stage needs to talk to the node.
struct Session {
    config: Config,
    state_file: PathBuf,
    ledger: RpcLedger,
    admin: SighashSigner,
    holder: SighashSigner,
    secp_cell_dep: CellDep,
}

impl Session {
    fn open(top_matches: &ArgMatches) -> Result<Self> {
        let config = build_config(top_matches)?;
        let admin = build_signer(top_matches, "admin")?;
        let holder = build_signer(top_matches, "holder")?;
        let ledger = RpcLedger::new(&config.ckb_rpc);
        let secp_cell_dep = resolve_sighash_dep(ledger.client(), &admin)?;
        Ok(Self {
            state_file: state_file(top_matches, &config),
            config,
            ledger,
            admin,
            holder,
            secp_cell_dep,
        })
    }

    fn workflow(&self) -> Workflow<'_, RpcLedger> {
        let tracker = ConfirmationTracker::new(PollPolicy {
            interval: Duration::from_secs(self.config.poll_interval_secs),
            max_attempts: self.config.max_poll_attempts,
        });
        Workflow::new(
            &self.ledger,
            self.config.params.clone(),
            &self.admin,
            &self.holder,
            self.secp_cell_dep.clone(),
        )
        .with_tracker(tracker)
        .with_page_size(self.config.page_size)
    }
}

fn run(top_matches: &ArgMatches) -> Result<()> {
    let session = Session::open(top_matches)?;
    let scripts = load_scripts(&session.config)?;
    let state = load_state(&session.state_file)?;

    let state = session
        .workflow()
        .run_from(&scripts, state, |state| save_state(&session.state_file, state))?;
    print_state(&state)
}

fn single_stage(top_matches: &ArgMatches, stage: Stage) -> Result<()> {
    let session = Session::open(top_matches)?;
    let mut state = load_state(&session.state_file)?;
    let workflow = session.workflow();
    let at = |source| StageError { stage, source };

    match stage {
        Stage::Deploy => {
            if recorded(&state.deployment, stage) {
                return Ok(());
            }
            let scripts = load_scripts(&session.config)?;
            state.deployment = Some(workflow.deploy(&scripts).map_err(at)?);
        }
        Stage::IssueToken => {
            if recorded(&state.token, stage) {
                return Ok(());
            }
            let deployment = require(&state.deployment, Stage::Deploy)?;
            let token = workflow.issue_token(deployment).map_err(at)?;
            state.token = Some(token);
        }
        Stage::CreateRelayCell => {
            if recorded(&state.relay, stage) {
                return Ok(());
            }
            let scripts = load_scripts(&session.config)?;
            let deployment = require(&state.deployment, Stage::Deploy)?;
            let relay_lock = workflow.relay_lock_for(&scripts);
            let relay = workflow
                .create_relay_cell(deployment, &relay_lock)
                .map_err(at)?;
            state.relay = Some(relay);
        }
        Stage::LockFunds => {
            if recorded(&state.locked, stage) {
                return Ok(());
            }
            let deployment = require(&state.deployment, Stage::Deploy)?;
            let token = require(&state.token, Stage::IssueToken)?;
            let relay = require(&state.relay, Stage::CreateRelayCell)?;
            let locked = workflow
                .lock_funds(deployment, token, relay)
                .map_err(at)?;
            state.locked = Some(locked);
        }
    }

    save_state(&session.state_file, &state)?;
    print_state(&state)
}

fn recorded<T>(slot: &Option<T>, stage: Stage) -> bool {
    if slot.is_some() {
        println!("Stage {} is already recorded, nothing to do", stage);
    }
    slot.is_some()
}

fn require<T>(slot: &Option<T>, stage: Stage) -> Result<&T> {
    slot.as_ref()
        .ok_or_else(|| anyhow!("stage {} has not been committed yet", stage))
}

fn script_hashes(top_matches: &ArgMatches) -> Result<()> {
    let config = build_config(top_matches)?;
    let admin = build_signer(top_matches, "admin")?;
    let holder = build_signer(top_matches, "holder")?;
    let scripts = load_scripts(&config)?;
    let state = load_state(&state_file(top_matches, &config))?;

    let udt_script = data_script(
        &scripts.simple_udt.code_hash,
        admin.lock_hash().as_bytes(),
    );

    println!("Admin lock script hash: {:x}", admin.lock_hash());
    println!("Holder lock script hash: {:x}", holder.lock_hash());
    println!(
        "UDT script hash with admin lock as owner: {:x}",
        udt_script.calc_script_hash()
    );
    if let Some(relay) = &state.relay {
        println!("Relay type script hash: {:x}", relay.type_hash);
    }
    if let Some(locked) = &state.locked {
        let lock_script: Script = locked.lock_script.clone().into();
        println!(
            "Crosschain lock script hash: {:x}",
            lock_script.calc_script_hash()
        );
    }
    Ok(())
}

fn balance(command_matches: &ArgMatches, top_matches: &ArgMatches) -> Result<()> {
    let config = build_config(top_matches)?;
    let wallet = command_matches
        .get_one::<String>("wallet")
        .ok_or_else(|| anyhow!("missing --wallet"))?;
    let signer = build_signer(top_matches, wallet)?;

    let mut cell_collector = DefaultCellCollector::new(&config.ckb_rpc);
    let mut query = CellQueryOptions::new_lock(signer.lock_script().clone());
    query.secondary_script_len_range = Some(ValueRangeOption::new_exact(0));
    query.data_len_range = Some(ValueRangeOption::new_exact(0));
    query.maturity = MaturityOption::Both;
    query.min_total_capacity = u64::max_value();
    let (cells, total_capacity) = cell_collector
        .collect_live_cells(&query, false)
        .context("collect cells")?;

    println!(
        "CKBytes balance of {}: {} in {} cells",
        wallet,
        HumanCapacity(total_capacity),
        cells.len()
    );
    Ok(())
}

fn show_state(top_matches: &ArgMatches) -> Result<()> {
    let config = build_config(top_matches)?;
    let state = load_state(&state_file(top_matches, &config))?;
    print_state(&state)
}

fn print_state(state: &WorkflowState) -> Result<()> {
    if let Some(deployment) = &state.deployment {
        println!("Deployment tx: {:#x}", deployment.tx_hash);
        for (name, full_script) in &deployment.scripts {
            println!("Script: {}", name);
            print_script(full_script, Some("  ".to_string()));
            println!();
        }
    }
    println!(
        "{}",
        serde_json::to_string_pretty(state).context("serialize state")?
    );
    if state.is_complete() {
        println!("All stages committed");
    }
    Ok(())
}
