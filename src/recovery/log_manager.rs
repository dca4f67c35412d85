use crate::common::config::Lsn;
use crate::storage::disk::disk_manager::FileDiskManager;
use log::error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Write-ahead logging hook. The buffer pool threads a log manager through its constructors;
/// nothing in this storage core emits records yet, but components above it append through here.
pub struct LogManager {
    disk_manager: Arc<FileDiskManager>,
    next_lsn: AtomicU64,
    persistent_lsn: AtomicU64,
}

impl LogManager {
    pub fn new(disk_manager: Arc<FileDiskManager>) -> Self {
        Self {
            disk_manager,
            next_lsn: AtomicU64::new(0),
            persistent_lsn: AtomicU64::new(0),
        }
    }

    /// Appends a record to the log file and forces it out. Returns the record's LSN.
    pub fn append_record(&self, record: &[u8]) -> Lsn {
        let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.disk_manager.write_log(record) {
            error!("failed to append log record {}: {}", lsn, e);
        } else {
            self.persistent_lsn.store(lsn, Ordering::SeqCst);
        }
        lsn
    }

    /// LSN of the last record known to be on disk.
    pub fn get_persistent_lsn(&self) -> Lsn {
        self.persistent_lsn.load(Ordering::SeqCst)
    }

    pub fn get_next_lsn(&self) -> Lsn {
        self.next_lsn.load(Ordering::SeqCst)
    }
}
