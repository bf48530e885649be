use crate::error::{Error, Result};
use ckb_types::{core::TransactionView, prelude::*, H256};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use crosschain_traits::{Ledger, TxStatus};
use log::{debug, info, warn};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Fires a cancellation at the tracker holding the paired token.
#[derive(Clone)]
pub struct CancelHandle(Sender<()>);

impl CancelHandle {
    pub fn cancel(&self) {
        // A pending signal is as good as a second one
        let _ = self.0.try_send(());
    }
}

#[derive(Clone)]
pub struct CancelToken(Receiver<()>);

pub fn cancellation() -> (CancelHandle, CancelToken) {
    let (sender, receiver) = bounded(1);
    (CancelHandle(sender), CancelToken(receiver))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub hash: H256,
    pub polls: u32,
}

/// Sends a signed transaction. Returns the locally computed hash, which is
/// what later stages reference.
pub fn submit<L: Ledger>(ledger: &L, tx: &TransactionView) -> Result<H256> {
    let hash: H256 = tx.hash().unpack();
    let reported = ledger
        .send_transaction(tx)
        .map_err(|e| Error::rejected(hash.clone(), e))?;
    if reported != hash {
        warn!(
            "ledger reported hash {:#x} for transaction {:#x}",
            reported, hash
        );
    }
    info!("sent transaction {:#x}", hash);
    Ok(hash)
}

#[derive(Clone, Default)]
pub struct ConfirmationTracker {
    policy: PollPolicy,
    cancel: Option<CancelToken>,
}

impl ConfirmationTracker {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Polls until the transaction is committed. RPC faults are returned at
    /// once, without retrying.
    pub fn wait_for<L: Ledger>(&self, ledger: &L, hash: &H256) -> Result<Confirmation> {
        info!("waiting for {:#x} to be committed...", hash);
        let mut polls = 0u32;
        loop {
            polls += 1;
            let status = ledger
                .transaction_status(hash)
                .map_err(|e| Error::rejected(hash.clone(), e))?;
            match status {
                TxStatus::Committed => {
                    info!("tx {:#x} is committed after {} polls", hash, polls);
                    return Ok(Confirmation {
                        hash: hash.clone(),
                        polls,
                    });
                }
                TxStatus::Rejected(reason) => {
                    return Err(Error::RejectedTransaction {
                        hash: hash.clone(),
                        reason: reason.unwrap_or_else(|| "unknown reason".to_string()),
                    });
                }
                status => debug!("tx {:#x} status: {:?}", hash, status),
            }
            if let Some(max_attempts) = self.policy.max_attempts {
                if polls >= max_attempts {
                    return Err(Error::PollTimeout {
                        hash: hash.clone(),
                        attempts: polls,
                    });
                }
            }
            if self.pause() {
                warn!("stopped waiting for {:#x} after {} polls", hash, polls);
                return Err(Error::Cancelled {
                    hash: hash.clone(),
                    polls,
                });
            }
        }
    }

    // Sleeps one interval; true when cancelled meanwhile.
    fn pause(&self) -> bool {
        match &self.cancel {
            Some(CancelToken(receiver)) => match receiver.recv_timeout(self.policy.interval) {
                Ok(()) => true,
                Err(RecvTimeoutError::Timeout) => false,
                // Every handle is gone, nobody can cancel any more
                Err(RecvTimeoutError::Disconnected) => {
                    std::thread::sleep(self.policy.interval);
                    false
                }
            },
            None => {
                std::thread::sleep(self.policy.interval);
                false
            }
        }
    }
}
