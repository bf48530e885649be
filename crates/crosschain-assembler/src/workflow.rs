use crate::builder::BuiltTransaction;
use crate::collector::{CellCollector, DEFAULT_PAGE_SIZE};
use crate::config::{
    FullScript, ScriptSet, WorkflowParams, CROSSCHAIN_LOCK, RELAY_TYPE, SIMPLE_UDT,
};
use crate::error::{Error, Result, Stage, StageError};
use crate::intents::{
    build_deploy, build_issue, build_lock_funds, build_relay, code_full_script,
    collection_target, data_script, deploy_capacity, encode_udt_amount,
};
use crate::signer::{sign_transaction, signing_groups, SighashSigner};
use crate::state::{Deployment, IssuedToken, LockedFunds, RelayCell, WorkflowState};
use crate::tracker::{submit, ConfirmationTracker};
use ckb_types::{
    bytes::Bytes,
    packed::{CellDep, OutPoint, Script},
    prelude::*,
    H256,
};
use crosschain_traits::{Ledger, LiveCell};
use log::info;

/// Runs the four stages against one ledger. Each stage collects, builds,
/// signs, submits and waits for commitment before returning its record.
pub struct Workflow<'a, L: Ledger> {
    ledger: &'a L,
    params: WorkflowParams,
    admin: &'a SighashSigner,
    holder: &'a SighashSigner,
    secp_cell_dep: CellDep,
    tracker: ConfirmationTracker,
    page_size: u32,
}

impl<'a, L: Ledger> Workflow<'a, L> {
    pub fn new(
        ledger: &'a L,
        params: WorkflowParams,
        admin: &'a SighashSigner,
        holder: &'a SighashSigner,
        secp_cell_dep: CellDep,
    ) -> Self {
        Self {
            ledger,
            params,
            admin,
            holder,
            secp_cell_dep,
            tracker: ConfirmationTracker::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_tracker(mut self, tracker: ConfirmationTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn params(&self) -> &WorkflowParams {
        &self.params
    }

    fn collect(&self, lock: &Script, outputs: u64) -> Result<crate::collector::Collected> {
        let target = collection_target(outputs, self.params.fee, lock)
            .ok_or(Error::CapacityOverflow)?;
        CellCollector::new(self.ledger, self.page_size).collect(lock, target)
    }

    // Sign, send and wait. The returned hash is the committed one.
    fn commit(&self, built: BuiltTransaction, signers: &[&SighashSigner]) -> Result<H256> {
        let groups = signing_groups(&built.inputs);
        let tx = sign_transaction(&built.tx, &groups, signers)?;
        let hash = submit(self.ledger, &tx)?;
        self.tracker.wait_for(self.ledger, &hash)?;
        Ok(hash)
    }

    pub fn deploy(&self, scripts: &ScriptSet) -> Result<Deployment> {
        let binaries = scripts.deployable();
        let lock = self.admin.lock_script();
        let collected = self.collect(lock, deploy_capacity(&self.params, &binaries)?)?;
        info!(
            "deploying {} scripts with {} shannons from {} cells",
            binaries.len(),
            collected.capacity,
            collected.cells.len()
        );
        let built = build_deploy(
            &self.params,
            collected,
            &binaries,
            lock,
            vec![self.secp_cell_dep.clone()],
        )?;
        let tx_hash = self.commit(built, &[self.admin])?;

        let scripts = binaries
            .iter()
            .enumerate()
            .map(|(i, binary)| {
                (
                    binary.name.clone(),
                    code_full_script(binary, &tx_hash, i as u32),
                )
            })
            .collect();
        Ok(Deployment { tx_hash, scripts })
    }

    pub fn issue_token(&self, deployment: &Deployment) -> Result<IssuedToken> {
        let sudt = deployment.script(SIMPLE_UDT)?;
        let issuer_lock = self.admin.lock_script();
        let collected = self.collect(issuer_lock, self.params.token_cell_capacity)?;
        info!(
            "issuing {} tokens to holder {}",
            self.params.issue_amount,
            self.holder.lock_hash()
        );
        let (built, udt_script) = build_issue(
            &self.params,
            collected,
            &sudt.script.code_hash,
            issuer_lock,
            self.holder.lock_script(),
            vec![self.secp_cell_dep.clone(), sudt.cell_dep.clone().into()],
        )?;
        let output = built.tx.output(0).ok_or(Error::OutputIndexOutOfBounds(0))?;
        let tx_hash = self.commit(built, &[self.admin])?;

        Ok(IssuedToken {
            out_point: OutPoint::new(tx_hash.pack(), 0).into(),
            output: output.into(),
            amount: self.params.issue_amount,
            udt: FullScript {
                script: udt_script.into(),
                cell_dep: sudt.cell_dep.clone(),
            },
        })
    }

    /// `relay_lock` guards the new relay cell; see `relay_lock_for`.
    pub fn create_relay_cell(
        &self,
        deployment: &Deployment,
        relay_lock: &Script,
    ) -> Result<RelayCell> {
        let relay_type = deployment.script(RELAY_TYPE)?;
        let payer_lock = self.admin.lock_script();
        let collected = self.collect(payer_lock, self.params.relay_cell_capacity)?;
        let (built, type_script) = build_relay(
            &self.params,
            collected,
            &relay_type.script.code_hash,
            relay_lock,
            payer_lock,
            vec![self.secp_cell_dep.clone(), relay_type.cell_dep.clone().into()],
        )?;
        let tx_hash = self.commit(built, &[self.admin])?;

        Ok(RelayCell {
            out_point: OutPoint::new(tx_hash.pack(), 0).into(),
            type_hash: type_script.calc_script_hash().unpack(),
            type_script: type_script.into(),
        })
    }

    pub fn lock_funds(
        &self,
        deployment: &Deployment,
        token: &IssuedToken,
        relay: &RelayCell,
    ) -> Result<LockedFunds> {
        let crosschain_lock = deployment.script(CROSSCHAIN_LOCK)?;
        let token_cell = LiveCell {
            out_point: token.out_point.clone().into(),
            output: token.output.clone().into(),
            output_data: encode_udt_amount(token.amount),
        };
        let udt_script: Script = token.udt.script.clone().into();
        let (built, lock_script) = build_lock_funds(
            &self.params,
            token_cell,
            &udt_script,
            &crosschain_lock.script.code_hash,
            &relay.type_hash.pack(),
            vec![
                self.secp_cell_dep.clone(),
                token.udt.cell_dep.clone().into(),
                crosschain_lock.cell_dep.clone().into(),
            ],
        )?;
        let amount = token.amount;
        info!(
            "locking {} tokens under relay {:#x}",
            amount, relay.type_hash
        );
        let tx_hash = self.commit(built, &[self.holder])?;

        Ok(LockedFunds {
            out_point: OutPoint::new(tx_hash.pack(), 0).into(),
            lock_script: lock_script.into(),
            amount,
        })
    }

    /// Always-success lock when its binary is known, else the admin's lock.
    pub fn relay_lock_for(&self, scripts: &ScriptSet) -> Script {
        match &scripts.always_success {
            Some(binary) => data_script(&binary.code_hash, Bytes::new()),
            None => self.admin.lock_script().clone(),
        }
    }

    pub fn run(&self, scripts: &ScriptSet) -> Result<WorkflowState, StageError> {
        self.run_from(scripts, WorkflowState::default(), |_| Ok(()))
    }

    /// Runs the stages missing from `state`, in order. `checkpoint` sees the
    /// state after every newly committed stage.
    pub fn run_from<C>(
        &self,
        scripts: &ScriptSet,
        mut state: WorkflowState,
        mut checkpoint: C,
    ) -> Result<WorkflowState, StageError>
    where
        C: FnMut(&WorkflowState) -> anyhow::Result<()>,
    {
        let deployment = match state.deployment.clone() {
            Some(deployment) => skipped(Stage::Deploy, deployment),
            None => {
                let deployment = self.deploy(scripts).map_err(at(Stage::Deploy))?;
                state.deployment = Some(deployment.clone());
                checkpoint(&state).map_err(checkpoint_failed(Stage::Deploy))?;
                deployment
            }
        };

        let token = match state.token.clone() {
            Some(token) => skipped(Stage::IssueToken, token),
            None => {
                let token = self
                    .issue_token(&deployment)
                    .map_err(at(Stage::IssueToken))?;
                state.token = Some(token.clone());
                checkpoint(&state).map_err(checkpoint_failed(Stage::IssueToken))?;
                token
            }
        };

        let relay = match state.relay.clone() {
            Some(relay) => skipped(Stage::CreateRelayCell, relay),
            None => {
                let relay_lock = self.relay_lock_for(scripts);
                let relay = self
                    .create_relay_cell(&deployment, &relay_lock)
                    .map_err(at(Stage::CreateRelayCell))?;
                state.relay = Some(relay.clone());
                checkpoint(&state).map_err(checkpoint_failed(Stage::CreateRelayCell))?;
                relay
            }
        };

        if state.locked.is_none() {
            let locked = self
                .lock_funds(&deployment, &token, &relay)
                .map_err(at(Stage::LockFunds))?;
            state.locked = Some(locked);
            checkpoint(&state).map_err(checkpoint_failed(Stage::LockFunds))?;
        } else {
            info!("stage {} already committed, skipping", Stage::LockFunds);
        }

        Ok(state)
    }
}

fn skipped<T>(stage: Stage, record: T) -> T {
    info!("stage {} already committed, skipping", stage);
    record
}

fn at(stage: Stage) -> impl Fn(Error) -> StageError {
    move |source| StageError { stage, source }
}

fn checkpoint_failed(stage: Stage) -> impl Fn(anyhow::Error) -> StageError {
    move |e| StageError {
        stage,
        source: Error::Checkpoint(format!("{:#}", e)),
    }
}
