use crate::error::{Error, Result};
use ckb_hash::blake2b_256;
use ckb_jsonrpc_types::{CellDep, Script};
use ckb_types::{bytes::Bytes, H256};
use serde::{Deserialize, Serialize};

pub const SIMPLE_UDT: &str = "simple_udt";
pub const RELAY_TYPE: &str = "relay_type";
pub const CROSSCHAIN_LOCK: &str = "crosschain_lock";
pub const ALWAYS_SUCCESS: &str = "always_success";

/// A script together with the cell dep that makes its code available.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct FullScript {
    pub script: Script,
    pub cell_dep: CellDep,
}

/// Capacity amounts are in shannons.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct WorkflowParams {
    #[serde(default = "default_fee")]
    pub fee: u64,
    #[serde(default = "default_cell_capacity")]
    pub token_cell_capacity: u64,
    #[serde(default = "default_cell_capacity")]
    pub relay_cell_capacity: u64,
    #[serde(default = "default_issue_amount")]
    pub issue_amount: u128,
    #[serde(default = "default_bytes_rate")]
    pub bytes_rate: u64,
    #[serde(default = "default_min_cell_capacity")]
    pub min_cell_capacity: u64,
}

fn default_fee() -> u64 {
    100_000_000
}

fn default_cell_capacity() -> u64 {
    20_000_000_000_000
}

fn default_issue_amount() -> u128 {
    6_543_421
}

fn default_bytes_rate() -> u64 {
    100_000_000
}

// 8 bytes of capacity plus a 33 byte lock without args
fn default_min_cell_capacity() -> u64 {
    4_100_000_000
}

impl Default for WorkflowParams {
    fn default() -> Self {
        Self {
            fee: default_fee(),
            token_cell_capacity: default_cell_capacity(),
            relay_cell_capacity: default_cell_capacity(),
            issue_amount: default_issue_amount(),
            bytes_rate: default_bytes_rate(),
            min_cell_capacity: default_min_cell_capacity(),
        }
    }
}

impl WorkflowParams {
    /// Capacity needed to store `len` bytes of code in a cell.
    pub fn code_cell_capacity(&self, len: usize) -> Result<u64> {
        (len as u64)
            .checked_mul(self.bytes_rate)
            .and_then(|c| c.checked_add(self.min_cell_capacity))
            .ok_or(Error::CapacityOverflow)
    }
}

/// Script binary loaded before the workflow starts.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ScriptBinary {
    pub name: String,
    pub data: Bytes,
    pub code_hash: H256,
}

impl ScriptBinary {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let code_hash = blake2b_256(&data).into();
        Self {
            name: name.into(),
            data,
            code_hash,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScriptSet {
    pub simple_udt: ScriptBinary,
    pub relay_type: ScriptBinary,
    pub crosschain_lock: ScriptBinary,
    // Only its code hash is needed: it guards the relay cell, and a lock
    // does not run when a cell is created.
    pub always_success: Option<ScriptBinary>,
}

impl ScriptSet {
    /// Binaries deposited by the deploy stage, in output order.
    pub fn deployable(&self) -> Vec<&ScriptBinary> {
        vec![&self.simple_udt, &self.relay_type, &self.crosschain_lock]
    }
}
