use ckb_types::H256;
use crosschain_traits::LedgerError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("insufficient balance: required {required}, collected {collected}, short by {shortfall}")]
    InsufficientBalance {
        required: u64,
        collected: u64,
        shortfall: u64,
    },
    #[error("negative change: inputs provide {available}, outputs and fee need {required}")]
    NegativeChange { available: u64, required: u64 },
    #[error("signature error: {0}")]
    Signature(String),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("transaction {hash:#x} rejected: {reason}")]
    RejectedTransaction { hash: H256, reason: String },
    #[error("waiting for {hash:#x} cancelled after {polls} polls")]
    Cancelled { hash: H256, polls: u32 },
    #[error("{hash:#x} still not committed after {attempts} polls")]
    PollTimeout { hash: H256, attempts: u32 },
    #[error("a transaction needs at least one input")]
    NoInputs,
    #[error("capacity overflow")]
    CapacityOverflow,
    #[error("script {0} is not part of the deployment")]
    MissingScript(String),
    #[error("checkpoint failed: {0}")]
    Checkpoint(String),
    #[error("output index {0} out of bounds")]
    OutputIndexOutOfBounds(usize),
}

impl From<LedgerError> for Error {
    fn from(e: LedgerError) -> Error {
        match e {
            LedgerError::Rpc(message) => Error::Rpc(message),
            // Submission rejections carry no hash of their own, the
            // submitter fills it in via `rejected`.
            LedgerError::Rejected(reason) => Error::RejectedTransaction {
                hash: H256::default(),
                reason,
            },
        }
    }
}

impl Error {
    pub fn rejected(hash: H256, e: LedgerError) -> Error {
        match e {
            LedgerError::Rejected(reason) => Error::RejectedTransaction { hash, reason },
            other => other.into(),
        }
    }
}

/// A failure of one workflow stage. Earlier stages stay committed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("stage {stage} failed")]
pub struct StageError {
    pub stage: Stage,
    pub source: Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Deploy,
    IssueToken,
    CreateRelayCell,
    LockFunds,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Deploy => "deploy",
            Stage::IssueToken => "issue-token",
            Stage::CreateRelayCell => "create-relay-cell",
            Stage::LockFunds => "lock-funds",
        };
        write!(f, "{}", name)
    }
}
