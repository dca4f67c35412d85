use crate::common::config::TxnId;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(0);

/// Transaction handle threaded through index operations. Concurrency control lives above this
/// storage core, so the handle only carries an id.
#[derive(Debug)]
pub struct Transaction {
    txn_id: TxnId,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            txn_id: NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst),
        }
    }

    pub fn get_txn_id(&self) -> TxnId {
        self.txn_id
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}
