//! Per-client cache of every transaction the client has observed.

use std::collections::HashMap;

use log::debug;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::ClientResult;
use crate::model::{Transaction, TxStatus};

/// Transactions keyed by id, latest observation wins.
///
/// Each client owns its own tracker; two clients never see each other's
/// entries. The map is unbounded and lives as long as the client.
#[derive(Debug, Default)]
pub struct TransactionTracker {
    cache: Mutex<HashMap<String, Transaction>>,
}

impl TransactionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `tx`, replacing any earlier observation of the same id.
    /// Returns the replaced entry.
    pub fn record(&self, tx: Transaction) -> Option<Transaction> {
        let previous = self.cache.lock().insert(tx.id.clone(), tx);
        if let Some(prev) = &previous {
            if log::log_enabled!(log::Level::Debug) {
                debug!(
                    "replacing tracked transaction {} (was status: {}, block: {:?})",
                    prev.id, prev.status, prev.block_num
                );
            }
        }
        previous
    }

    /// Records the transaction contained in a command result.
    ///
    /// Documents without a transaction id are skipped when
    /// `ignore_non_transaction` is set and rejected as malformed otherwise.
    /// Returns the id of the recorded transaction.
    pub fn record_document(
        &self,
        doc: &Value,
        ignore_non_transaction: bool,
    ) -> ClientResult<Option<String>> {
        if ignore_non_transaction && !Transaction::is_transaction_document(doc) {
            debug!("cmd returned a non-transaction");
            return Ok(None);
        }

        let tx = Transaction::from_command_result(doc)?;
        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "cmd returned transaction id: {}, status: {}, (possible) block num: {:?}",
                tx.id, tx.status, tx.block_num
            );
        }
        let id = tx.id.clone();
        self.record(tx);
        Ok(Some(id))
    }

    pub fn lookup(&self, id: &str) -> Option<Transaction> {
        self.cache.lock().get(id).cloned()
    }

    pub fn status(&self, id: &str) -> Option<TxStatus> {
        self.cache.lock().get(id).map(|tx| tx.status.clone())
    }

    pub fn block_num(&self, id: &str) -> Option<u64> {
        self.cache.lock().get(id).and_then(|tx| tx.block_num)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}
