use crate::common::config::{PageId, DB_PAGE_SIZE};
use crate::common::exception::DiskError;
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};

/// The `DiskManager` trait defines the basic operations for interacting with disk storage.
/// The buffer pool allocates page ids itself; implementers only have to tolerate reads and
/// writes to ids they have never seen.
pub trait DiskManager: Send + Sync {
    fn read_page(&self, page_id: PageId, page_data: &mut [u8; DB_PAGE_SIZE]) -> Result<(), DiskError>;
    fn write_page(&self, page_id: PageId, page_data: &[u8; DB_PAGE_SIZE]) -> Result<(), DiskError>;
    /// Marks a page id as free in the allocation ledger.
    fn deallocate_page(&self, page_id: PageId);
}

/// The `FileDiskManager` is responsible for disk I/O against a database file, plus the log file
/// used by the write-ahead logging hook.
pub struct FileDiskManager {
    file_name: String,
    log_name: String,
    db_io: Mutex<File>,
    log_io: Mutex<File>,
    deallocated: Mutex<HashSet<PageId>>,
    num_flushes: AtomicI32,
    num_writes: AtomicI32,
}

impl FileDiskManager {
    /// Opens (creating if necessary) the database file and its log file.
    pub fn new(db_file: impl Into<String>, log_file: impl Into<String>) -> Result<Self, DiskError> {
        let db_file = db_file.into();
        let log_file = log_file.into();

        let open = |name: &str| -> Result<File, DiskError> {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(name)
                .map_err(|source| DiskError::Open {
                    file_name: name.to_string(),
                    source,
                })
        };

        let db_io = open(&db_file)?;
        let log_io = open(&log_file)?;
        info!("Opened database file {} with log {}", db_file, log_file);

        Ok(Self {
            file_name: db_file,
            log_name: log_file,
            db_io: Mutex::new(db_io),
            log_io: Mutex::new(log_io),
            deallocated: Mutex::new(HashSet::new()),
            num_flushes: AtomicI32::new(0),
            num_writes: AtomicI32::new(0),
        })
    }

    /// Flushes any buffered data before shutdown.
    pub fn shut_down(&self) -> Result<(), DiskError> {
        self.db_io.lock().sync_all().map_err(DiskError::LogIo)?;
        self.log_io.lock().sync_all().map_err(DiskError::LogIo)?;
        info!("Shutdown complete for {}", self.file_name);
        Ok(())
    }

    /// Appends log data to the log file and forces it to disk.
    pub fn write_log(&self, log_data: &[u8]) -> Result<(), DiskError> {
        let mut log_io = self.log_io.lock();
        log_io.seek(SeekFrom::End(0))?;
        log_io.write_all(log_data)?;
        log_io.sync_all()?;

        self.num_flushes.fetch_add(1, Ordering::SeqCst);
        debug!("Log data written and flushed ({} bytes)", log_data.len());
        Ok(())
    }

    /// Reads log data from the log file at a specified offset. Returns `false` once the offset
    /// is past the end of the log.
    pub fn read_log(&self, log_data: &mut [u8], offset: u64) -> Result<bool, DiskError> {
        let mut log_io = self.log_io.lock();
        let file_size = log_io.metadata()?.len();
        if offset >= file_size {
            return Ok(false);
        }

        log_io.seek(SeekFrom::Start(offset))?;
        let bytes_read = log_io.read(log_data)?;
        if bytes_read < log_data.len() {
            log_data[bytes_read..].fill(0);
            warn!("Log read at offset {} hit EOF, zero-filled the tail", offset);
        }
        Ok(true)
    }

    /// Returns whether a page id has been handed back through `deallocate_page`.
    pub fn is_deallocated(&self, page_id: PageId) -> bool {
        self.deallocated.lock().contains(&page_id)
    }

    /// Number of times the log has been forced to disk.
    pub fn get_num_flushes(&self) -> i32 {
        self.num_flushes.load(Ordering::SeqCst)
    }

    /// Number of page writes performed.
    pub fn get_num_writes(&self) -> i32 {
        self.num_writes.load(Ordering::SeqCst)
    }

    /// Size of a file in bytes.
    pub fn get_file_size(file_name: &str) -> Result<u64, DiskError> {
        let path = Path::new(file_name);
        Ok(path.metadata().map_err(DiskError::LogIo)?.len())
    }

    pub fn get_file_name(&self) -> &str {
        &self.file_name
    }

    pub fn get_log_name(&self) -> &str {
        &self.log_name
    }
}

impl DiskManager for FileDiskManager {
    fn write_page(&self, page_id: PageId, page_data: &[u8; DB_PAGE_SIZE]) -> Result<(), DiskError> {
        let offset = page_id as u64 * DB_PAGE_SIZE as u64;
        trace!("Writing page {} at offset {}", page_id, offset);

        let mut db_io = self.db_io.lock();
        let result: Result<(), std::io::Error> = (|| {
            db_io.seek(SeekFrom::Start(offset))?;
            db_io.write_all(page_data)?;
            db_io.flush()
        })();
        result.map_err(|source| DiskError::PageIo { page_id, source })?;

        self.num_writes.fetch_add(1, Ordering::SeqCst);
        self.deallocated.lock().remove(&page_id);
        Ok(())
    }

    fn read_page(&self, page_id: PageId, page_data: &mut [u8; DB_PAGE_SIZE]) -> Result<(), DiskError> {
        let offset = page_id as u64 * DB_PAGE_SIZE as u64;
        trace!("Reading page {} at offset {}", page_id, offset);

        let mut db_io = self.db_io.lock();
        let file_size = db_io
            .metadata()
            .map_err(|source| DiskError::PageIo { page_id, source })?
            .len();
        if offset >= file_size {
            // Reads past the end of the file see a fresh, zeroed page.
            page_data.fill(0);
            return Ok(());
        }

        let result: Result<(), std::io::Error> = (|| {
            db_io.seek(SeekFrom::Start(offset))?;
            match db_io.read_exact(page_data) {
                Ok(()) => Ok(()),
                Err(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    let bytes_read = (file_size - offset) as usize;
                    page_data[bytes_read..].fill(0);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })();
        result.map_err(|source| {
            error!("Failed to read page {}: {}", page_id, source);
            DiskError::PageIo { page_id, source }
        })
    }

    fn deallocate_page(&self, page_id: PageId) {
        debug!("Deallocating page {}", page_id);
        self.deallocated.lock().insert(page_id);
    }
}
