use super::mock::{secp_cell_dep, signer, MockLedger};
use crate::config::{
    ScriptBinary, ScriptSet, WorkflowParams, ALWAYS_SUCCESS, CROSSCHAIN_LOCK, RELAY_TYPE,
    SIMPLE_UDT,
};
use crate::error::{Error, Stage, StageError};
use crate::intents::encode_udt_amount;
use crate::signer::SighashSigner;
use crate::state::WorkflowState;
use crate::tracker::{ConfirmationTracker, PollPolicy};
use crate::workflow::Workflow;
use ckb_types::{
    packed::{OutPoint, Script},
    prelude::*,
};
use std::time::Duration;

const CKB: u64 = 100_000_000;

fn scripts() -> ScriptSet {
    ScriptSet {
        simple_udt: ScriptBinary::new(SIMPLE_UDT, vec![1u8; 1000]),
        relay_type: ScriptBinary::new(RELAY_TYPE, vec![2u8; 500]),
        crosschain_lock: ScriptBinary::new(CROSSCHAIN_LOCK, vec![3u8; 2000]),
        always_success: Some(ScriptBinary::new(ALWAYS_SUCCESS, vec![4u8; 100])),
    }
}

fn workflow<'a>(
    ledger: &'a MockLedger,
    admin: &'a SighashSigner,
    holder: &'a SighashSigner,
) -> Workflow<'a, MockLedger> {
    Workflow::new(
        ledger,
        WorkflowParams::default(),
        admin,
        holder,
        secp_cell_dep(),
    )
    .with_tracker(ConfirmationTracker::new(PollPolicy {
        interval: Duration::ZERO,
        max_attempts: Some(3),
    }))
    .with_page_size(2)
}

fn assert_conserved(ledger: &MockLedger, fee: u64) {
    for sent in ledger.sent().iter() {
        let outputs: u64 = sent
            .tx
            .outputs()
            .into_iter()
            .map(|output| Unpack::<u64>::unpack(&output.capacity()))
            .sum();
        assert_eq!(sent.input_capacity, outputs + fee);
    }
}

#[test]
fn test_full_run() {
    let ledger = MockLedger::default();
    let admin = signer(1);
    let holder = signer(2);
    ledger.fund(admin.lock_script(), &[300_000 * CKB; 3]);
    let scripts = scripts();
    let workflow = workflow(&ledger, &admin, &holder);

    let state = workflow.run(&scripts).unwrap();
    assert!(state.is_complete());
    assert_eq!(ledger.sent().len(), 4);
    assert_conserved(&ledger, workflow.params().fee);

    let deployment = state.deployment.unwrap();
    for (index, binary) in scripts.deployable().into_iter().enumerate() {
        let script = deployment.script(&binary.name).unwrap();
        assert_eq!(script.script.code_hash, binary.code_hash);
        assert_eq!(script.cell_dep.out_point.tx_hash, deployment.tx_hash);
        assert_eq!(script.cell_dep.out_point.index.value(), index as u32);
    }

    let token = state.token.unwrap();
    assert_eq!(token.amount, 6_543_421);
    // Spent by the last stage
    assert!(ledger
        .find_cell(&OutPoint::from(token.out_point.clone()))
        .is_none());

    let relay = state.relay.unwrap();
    let relay_type = Script::from(relay.type_script.clone());
    let relay_first_input = ledger.sent()[2].tx.inputs().get(0).unwrap();
    assert_eq!(relay_type.args().raw_data(), relay_first_input.as_bytes());
    assert_eq!(relay_type.calc_script_hash(), relay.type_hash.pack());
    let relay_cell = ledger
        .find_cell(&OutPoint::from(relay.out_point.clone()))
        .unwrap();
    assert_eq!(relay_cell.lock(), workflow.relay_lock_for(&scripts));

    let locked = state.locked.unwrap();
    let locked_cell = ledger
        .find_cell(&OutPoint::from(locked.out_point.clone()))
        .unwrap();
    assert_eq!(locked_cell.lock(), Script::from(locked.lock_script.clone()));
    assert_eq!(
        locked_cell.lock().args().raw_data(),
        relay.type_hash.as_bytes()
    );
    assert_eq!(
        locked_cell.output.type_().to_opt(),
        Some(Script::from(token.udt.script.clone()))
    );
    assert_eq!(
        locked_cell.capacity(),
        workflow.params().token_cell_capacity - workflow.params().fee
    );
    assert_eq!(locked_cell.output_data, encode_udt_amount(6_543_421));
    assert_eq!(locked.amount, token.amount);
}

#[test]
fn test_complete_state_is_not_rerun() {
    let ledger = MockLedger::default();
    let admin = signer(1);
    let holder = signer(2);
    ledger.fund(admin.lock_script(), &[300_000 * CKB; 3]);
    let scripts = scripts();
    let workflow = workflow(&ledger, &admin, &holder);

    let state = workflow.run(&scripts).unwrap();
    let mut checkpoints = 0;
    let rerun = workflow
        .run_from(&scripts, state.clone(), |_| {
            checkpoints += 1;
            Ok(())
        })
        .unwrap();
    assert_eq!(rerun, state);
    assert_eq!(checkpoints, 0);
    assert_eq!(ledger.sent().len(), 4);
}

#[test]
fn test_failure_names_stage() {
    let ledger = MockLedger::default();
    let admin = signer(1);
    let holder = signer(2);
    ledger.fund(admin.lock_script(), &[1000 * CKB]);

    let result = workflow(&ledger, &admin, &holder).run(&scripts());
    assert_eq!(
        result,
        Err(StageError {
            stage: Stage::Deploy,
            source: Error::InsufficientBalance {
                required: 3685 * CKB,
                collected: 1000 * CKB,
                shortfall: 2685 * CKB,
            },
        })
    );
    assert!(ledger.sent().is_empty());
}

#[test]
fn test_resume_after_failed_stage() {
    let ledger = MockLedger::default();
    let admin = signer(1);
    let holder = signer(2);
    ledger.fund(admin.lock_script(), &[400_000 * CKB]);
    let scripts = scripts();
    let workflow = workflow(&ledger, &admin, &holder);

    let mut checkpoints: Vec<WorkflowState> = Vec::new();
    let result = workflow.run_from(&scripts, WorkflowState::default(), |state| {
        checkpoints.push(state.clone());
        Ok(())
    });
    // deploy spends 3624 CKB, issuing 200001 CKB, the relay needs
    // 200000 + 1 + 61 for its change cell
    assert_eq!(
        result,
        Err(StageError {
            stage: Stage::CreateRelayCell,
            source: Error::InsufficientBalance {
                required: 200_062 * CKB,
                collected: 196_375 * CKB,
                shortfall: 3_687 * CKB,
            },
        })
    );
    assert_eq!(checkpoints.len(), 2);
    assert_eq!(ledger.sent().len(), 2);
    let saved = checkpoints.pop().unwrap();
    assert!(saved.token.is_some());
    assert!(saved.relay.is_none());

    ledger.fund(admin.lock_script(), &[100_000 * CKB]);
    let mut resumed = 0;
    let state = workflow
        .run_from(&scripts, saved.clone(), |_| {
            resumed += 1;
            Ok(())
        })
        .unwrap();
    assert!(state.is_complete());
    assert_eq!(state.deployment, saved.deployment);
    assert_eq!(state.token, saved.token);
    assert_eq!(resumed, 2);
    assert_eq!(ledger.sent().len(), 4);
    assert_conserved(&ledger, workflow.params().fee);
}

#[test]
fn test_checkpoint_failure_stops_run() {
    let ledger = MockLedger::default();
    let admin = signer(1);
    let holder = signer(2);
    ledger.fund(admin.lock_script(), &[300_000 * CKB; 3]);

    let result = workflow(&ledger, &admin, &holder).run_from(
        &scripts(),
        WorkflowState::default(),
        |_| Err(anyhow::anyhow!("disk full")),
    );
    assert_eq!(
        result,
        Err(StageError {
            stage: Stage::Deploy,
            source: Error::Checkpoint("disk full".to_string()),
        })
    );
    assert_eq!(ledger.sent().len(), 1);
}

#[test]
fn test_relay_lock_without_always_success() {
    let ledger = MockLedger::default();
    let admin = signer(1);
    let holder = signer(2);
    let scripts = ScriptSet {
        always_success: None,
        ..scripts()
    };

    let workflow = workflow(&ledger, &admin, &holder);
    assert_eq!(&workflow.relay_lock_for(&scripts), admin.lock_script());
}

#[test]
fn test_missing_deployed_script() {
    let ledger = MockLedger::default();
    let admin = signer(1);
    let holder = signer(2);
    ledger.fund(admin.lock_script(), &[300_000 * CKB]);

    let result = workflow(&ledger, &admin, &holder).issue_token(&Default::default());
    assert_eq!(
        result.err(),
        Some(Error::MissingScript(SIMPLE_UDT.to_string()))
    );
}

#[test]
fn test_stage_error_reports_cause_once() {
    let error = StageError {
        stage: Stage::CreateRelayCell,
        source: Error::NoInputs,
    };

    assert_eq!(error.to_string(), "stage create-relay-cell failed");
    let source = std::error::Error::source(&error).unwrap();
    assert_eq!(source.to_string(), Error::NoInputs.to_string());

    let report = format!("{:#}", anyhow::Error::new(error));
    assert_eq!(report.matches(&Error::NoInputs.to_string()).count(), 1);
}
