//! Transaction shapes of the four workflow stages. These are pure: they get
//! already collected cells and return balanced, unsigned transactions.

use crate::builder::{BuiltTransaction, TxSkeleton};
use crate::collector::Collected;
use crate::config::{FullScript, ScriptBinary, WorkflowParams};
use crate::error::{Error, Result};
use ckb_types::{
    bytes::Bytes,
    core::{Capacity, ScriptHashType},
    packed::{Byte32, CellDep, CellOutput, Script},
    prelude::*,
    H256,
};
use crosschain_traits::LiveCell;

pub const UDT_AMOUNT_SIZE: usize = 16;

pub fn encode_udt_amount(amount: u128) -> Bytes {
    Bytes::from(amount.to_le_bytes().to_vec())
}

pub fn data_script(code_hash: &H256, args: Bytes) -> Script {
    Script::new_builder()
        .code_hash(code_hash.pack())
        .hash_type(ScriptHashType::Data.into())
        .args(args.pack())
        .build()
}

/// Capacity a collection must reach: the outputs, the fee, and room for a
/// plain change cell owned by `change_lock`.
pub fn collection_target(outputs: u64, fee: u64, change_lock: &Script) -> Option<u64> {
    let change = CellOutput::new_builder()
        .lock(change_lock.clone())
        .build()
        .occupied_capacity(Capacity::zero())
        .ok()?
        .as_u64();
    outputs.checked_add(fee)?.checked_add(change)
}

pub fn deploy_capacity(params: &WorkflowParams, binaries: &[&ScriptBinary]) -> Result<u64> {
    binaries.iter().try_fold(0u64, |sum, binary| {
        sum.checked_add(params.code_cell_capacity(binary.data.len())?)
            .ok_or(Error::CapacityOverflow)
    })
}

/// One code cell per binary, in the given order, then change.
pub fn build_deploy(
    params: &WorkflowParams,
    collected: Collected,
    binaries: &[&ScriptBinary],
    change_lock: &Script,
    cell_deps: Vec<CellDep>,
) -> Result<BuiltTransaction> {
    let mut skeleton = TxSkeleton::new(params.fee)
        .cell_deps(cell_deps)
        .inputs(collected.cells)
        .finalize_inputs()?;
    for binary in binaries {
        skeleton = skeleton.code_output(params, binary.data.clone())?;
    }
    skeleton.balance(change_lock.clone())
}

/// Token cell for `holder` whose type script is scoped to the issuer's lock,
/// then the issuer's change.
pub fn build_issue(
    params: &WorkflowParams,
    collected: Collected,
    sudt_code_hash: &H256,
    issuer_lock: &Script,
    holder_lock: &Script,
    cell_deps: Vec<CellDep>,
) -> Result<(BuiltTransaction, Script)> {
    let owner_lock_hash = issuer_lock.calc_script_hash();
    let udt_script = data_script(sudt_code_hash, owner_lock_hash.as_bytes());
    let token_output = CellOutput::new_builder()
        .lock(holder_lock.clone())
        .type_(Some(udt_script.clone()).pack())
        .capacity(Capacity::shannons(params.token_cell_capacity).pack())
        .build();
    let built = TxSkeleton::new(params.fee)
        .cell_deps(cell_deps)
        .inputs(collected.cells)
        .finalize_inputs()?
        .output(token_output, encode_udt_amount(params.issue_amount))
        .balance(issuer_lock.clone())?;
    Ok((built, udt_script))
}

/// Relay cell whose type args are this very transaction's first input,
/// which makes the type script unique.
pub fn build_relay(
    params: &WorkflowParams,
    collected: Collected,
    relay_type_code_hash: &H256,
    relay_lock: &Script,
    payer_lock: &Script,
    cell_deps: Vec<CellDep>,
) -> Result<(BuiltTransaction, Script)> {
    let skeleton = TxSkeleton::new(params.fee)
        .cell_deps(cell_deps)
        .inputs(collected.cells)
        .finalize_inputs()?;
    let relay_type = data_script(relay_type_code_hash, skeleton.first_input().as_bytes());
    let relay_output = CellOutput::new_builder()
        .lock(relay_lock.clone())
        .type_(Some(relay_type.clone()).pack())
        .capacity(Capacity::shannons(params.relay_cell_capacity).pack())
        .build();
    let built = skeleton
        .output(relay_output, Bytes::new())
        .balance(payer_lock.clone())?;
    Ok((built, relay_type))
}

/// Moves the whole token cell under the crosschain lock bound to one relay
/// cell. The fee comes out of the token cell's own capacity.
pub fn build_lock_funds(
    params: &WorkflowParams,
    token_cell: LiveCell,
    udt_script: &Script,
    crosschain_lock_code_hash: &H256,
    relay_type_hash: &Byte32,
    cell_deps: Vec<CellDep>,
) -> Result<(BuiltTransaction, Script)> {
    let crosschain_lock = data_script(crosschain_lock_code_hash, relay_type_hash.as_bytes());
    let output = CellOutput::new_builder()
        .lock(crosschain_lock.clone())
        .type_(Some(udt_script.clone()).pack())
        .build();
    let data = token_cell.output_data.clone();
    let built = TxSkeleton::new(params.fee)
        .cell_deps(cell_deps)
        .input(token_cell)
        .finalize_inputs()?
        .output(output, data)
        .balance_into(0)?;
    Ok((built, crosschain_lock))
}

pub fn code_full_script(binary: &ScriptBinary, tx_hash: &H256, index: u32) -> FullScript {
    use ckb_jsonrpc_types as rpc;

    FullScript {
        script: rpc::Script {
            code_hash: binary.code_hash.clone(),
            hash_type: rpc::ScriptHashType::Data,
            args: rpc::JsonBytes::default(),
        },
        cell_dep: rpc::CellDep {
            out_point: rpc::OutPoint {
                tx_hash: tx_hash.clone(),
                index: index.into(),
            },
            dep_type: rpc::DepType::Code,
        },
    }
}
