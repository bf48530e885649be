//! Results of committed stages. Each stage returns one of these records and
//! the next stage takes it as input; together they form the resumable
//! workflow state.

use crate::config::FullScript;
use crate::error::{Error, Result};
use ckb_jsonrpc_types::{CellOutput, OutPoint, Script};
use ckb_types::H256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct Deployment {
    pub tx_hash: H256,
    pub scripts: BTreeMap<String, FullScript>,
}

impl Deployment {
    pub fn script(&self, name: &str) -> Result<&FullScript> {
        self.scripts
            .get(name)
            .ok_or_else(|| Error::MissingScript(name.to_string()))
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct IssuedToken {
    pub out_point: OutPoint,
    pub output: CellOutput,
    pub amount: u128,
    /// The token's type script, scoped to its issuer, with the sudt code dep.
    pub udt: FullScript,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct RelayCell {
    pub out_point: OutPoint,
    pub type_script: Script,
    pub type_hash: H256,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct LockedFunds {
    pub out_point: OutPoint,
    pub lock_script: Script,
    pub amount: u128,
}

/// Append-only: a stage only ever fills its own empty slot.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct WorkflowState {
    pub deployment: Option<Deployment>,
    pub token: Option<IssuedToken>,
    pub relay: Option<RelayCell>,
    pub locked: Option<LockedFunds>,
}

impl WorkflowState {
    pub fn is_complete(&self) -> bool {
        self.locked.is_some()
    }
}
