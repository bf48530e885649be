pub mod builder;
pub mod collector;
pub mod config;
pub mod error;
pub mod intents;
pub mod signer;
pub mod state;
pub mod tracker;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use crate::{
    builder::{BuiltTransaction, TxSkeleton},
    collector::{collect_capacity, CellCollector, Collected, LiveCells},
    config::{FullScript, ScriptBinary, ScriptSet, WorkflowParams},
    error::{Error, Result, Stage, StageError},
    signer::{sign_transaction, signing_groups, SighashSigner, SigningGroup},
    state::{Deployment, IssuedToken, LockedFunds, RelayCell, WorkflowState},
    tracker::{cancellation, submit, CancelHandle, CancelToken, ConfirmationTracker, PollPolicy},
    workflow::Workflow,
};
