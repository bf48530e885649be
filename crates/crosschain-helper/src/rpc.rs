use ckb_jsonrpc_types::{JsonBytes, OutputsValidator, Status};
use ckb_sdk::{
    rpc::ckb_indexer::{Order, ScriptType, SearchKey, SearchMode},
    util::get_max_mature_number,
    CkbRpcClient, RpcError,
};
use ckb_types::{bytes::Bytes, core::TransactionView, packed, H256};
use crosschain_traits::{CellPage, Ledger, LedgerError, LiveCell, TxStatus};
use jsonrpc_core::types::error::ErrorCode;
use log::debug;

/// `Ledger` backed by a CKB node with its built-in indexer.
pub struct RpcLedger {
    client: CkbRpcClient,
}

impl RpcLedger {
    pub fn new(ckb_rpc: &str) -> Self {
        Self {
            client: CkbRpcClient::new(ckb_rpc),
        }
    }

    pub fn client(&self) -> &CkbRpcClient {
        &self.client
    }
}

impl Ledger for RpcLedger {
    fn send_transaction(&self, tx: &TransactionView) -> Result<H256, LedgerError> {
        self.client
            .send_transaction(tx.data().into(), Some(OutputsValidator::Passthrough))
            .map_err(classify)
    }

    fn transaction_status(&self, hash: &H256) -> Result<TxStatus, LedgerError> {
        let response = self
            .client
            .get_transaction_status(hash.clone())
            .map_err(classify)?;
        Ok(match response.tx_status.status {
            Status::Pending => TxStatus::Pending,
            Status::Proposed => TxStatus::Proposed,
            Status::Committed => TxStatus::Committed,
            Status::Unknown => TxStatus::Unknown,
            Status::Rejected => TxStatus::Rejected(response.tx_status.reason),
        })
    }

    fn live_cells_by_lock(
        &self,
        lock: &packed::Script,
        limit: u32,
        cursor: Option<Bytes>,
    ) -> Result<CellPage, LedgerError> {
        let max_mature_number = get_max_mature_number(&self.client)
            .map_err(|e| LedgerError::Rpc(format!("max mature block number: {:?}", e)))?;
        let mut after = cursor.map(JsonBytes::from_bytes);
        loop {
            let page = self
                .client
                .get_cells(
                    SearchKey {
                        script: lock.clone().into(),
                        script_type: ScriptType::Lock,
                        script_search_mode: Some(SearchMode::Exact),
                        filter: None,
                        with_data: Some(true),
                        group_by_transaction: None,
                    },
                    Order::Asc,
                    limit.into(),
                    after,
                )
                .map_err(classify)?;
            if page.objects.is_empty() {
                return Ok(CellPage::default());
            }
            let fetched = page.objects.len();
            let cells: Vec<LiveCell> = page
                .objects
                .into_iter()
                .filter(|cell| {
                    is_mature(
                        cell.block_number.value(),
                        cell.tx_index.value(),
                        max_mature_number,
                    ) && cell.output.type_.is_none()
                        && cell
                            .output_data
                            .as_ref()
                            .map(|data| data.as_bytes().is_empty())
                            .unwrap_or(true)
                })
                .map(|cell| LiveCell {
                    out_point: cell.out_point.into(),
                    output: cell.output.into(),
                    output_data: Bytes::new(),
                })
                .collect();
            debug!(
                "indexer returned {} cells, {} of them mature plain capacity",
                fetched,
                cells.len()
            );
            let next = page.last_cursor;
            // A page without usable cells says nothing about the end of
            // the stream, move on to the next one.
            if cells.is_empty() {
                after = Some(next);
                continue;
            }
            return Ok(CellPage {
                cells,
                cursor: Some(next.into_bytes()),
            });
        }
    }
}

/// Cellbase outputs can only be spent once their block is at or below the
/// max mature block number. Genesis cells and normal outputs always can.
pub fn is_mature(block_number: u64, tx_index: u32, max_mature_number: u64) -> bool {
    tx_index > 0 || block_number == 0 || block_number <= max_mature_number
}

/// Script, output point and pool failures are reported by the node with
/// server error codes -3xx and -11xx. Those reject the transaction, anything
/// else is a transport or node problem.
pub fn classify(e: RpcError) -> LedgerError {
    match e {
        RpcError::Rpc(error) => match error.code {
            ErrorCode::ServerError(code)
                if (-399..=-300).contains(&code) || (-1199..=-1100).contains(&code) =>
            {
                LedgerError::Rejected(error.message)
            }
            _ => LedgerError::Rpc(format!("{:?}", error)),
        },
        other => LedgerError::Rpc(other.to_string()),
    }
}
