use ckb_types::{
    bytes::Bytes,
    core::TransactionView,
    packed::{CellOutput, OutPoint, Script},
    prelude::*,
    H256,
};

/// A live cell as reported by the ledger's cell index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveCell {
    pub out_point: OutPoint,
    pub output: CellOutput,
    pub output_data: Bytes,
}

impl LiveCell {
    pub fn capacity(&self) -> u64 {
        self.output.capacity().unpack()
    }

    pub fn lock(&self) -> Script {
        self.output.lock()
    }
}

/// One page of a lock query. An absent cursor marks the last page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellPage {
    pub cells: Vec<LiveCell>,
    pub cursor: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Proposed,
    Committed,
    Unknown,
    Rejected(Option<String>),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger rpc error: {0}")]
    Rpc(String),
    #[error("transaction rejected by ledger: {0}")]
    Rejected(String),
}

// The ledger boundary. Implementations talk to a node, tests use an
// in-memory table. All methods are read-only except `send_transaction`.
pub trait Ledger {
    fn send_transaction(&self, tx: &TransactionView) -> Result<H256, LedgerError>;

    fn transaction_status(&self, hash: &H256) -> Result<TxStatus, LedgerError>;

    /// Plain capacity cells locked by `lock`, in ledger order, resuming
    /// after `cursor` when one is given.
    fn live_cells_by_lock(
        &self,
        lock: &Script,
        limit: u32,
        cursor: Option<Bytes>,
    ) -> Result<CellPage, LedgerError>;
}

impl<L: Ledger + ?Sized> Ledger for &L {
    fn send_transaction(&self, tx: &TransactionView) -> Result<H256, LedgerError> {
        (**self).send_transaction(tx)
    }

    fn transaction_status(&self, hash: &H256) -> Result<TxStatus, LedgerError> {
        (**self).transaction_status(hash)
    }

    fn live_cells_by_lock(
        &self,
        lock: &Script,
        limit: u32,
        cursor: Option<Bytes>,
    ) -> Result<CellPage, LedgerError> {
        (**self).live_cells_by_lock(lock, limit, cursor)
    }
}
