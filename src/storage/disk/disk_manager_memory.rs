use crate::common::config::{PageId, DB_PAGE_SIZE};
use crate::common::exception::DiskError;
use crate::storage::disk::disk_manager::DiskManager;
use log::debug;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// In-memory `DiskManager` used by tests and scratch databases. Reads of pages that were never
/// written observe zeroes, the same as reads past the end of a real database file.
pub struct MemoryDiskManager {
    pages: Mutex<HashMap<PageId, Box<[u8; DB_PAGE_SIZE]>>>,
    deallocated: Mutex<HashSet<PageId>>,
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            deallocated: Mutex::new(HashSet::new()),
        }
    }

    /// Number of distinct pages ever written.
    pub fn num_pages(&self) -> usize {
        self.pages.lock().len()
    }

    /// Returns whether a page id has been handed back through `deallocate_page`.
    pub fn is_deallocated(&self, page_id: PageId) -> bool {
        self.deallocated.lock().contains(&page_id)
    }
}

impl Default for MemoryDiskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, page_data: &mut [u8; DB_PAGE_SIZE]) -> Result<(), DiskError> {
        match self.pages.lock().get(&page_id) {
            Some(stored) => page_data.copy_from_slice(&stored[..]),
            None => page_data.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, page_data: &[u8; DB_PAGE_SIZE]) -> Result<(), DiskError> {
        let mut stored = Box::new([0u8; DB_PAGE_SIZE]);
        stored.copy_from_slice(page_data);
        self.pages.lock().insert(page_id, stored);
        self.deallocated.lock().remove(&page_id);
        Ok(())
    }

    fn deallocate_page(&self, page_id: PageId) {
        debug!("Deallocating page {}", page_id);
        self.pages.lock().remove(&page_id);
        self.deallocated.lock().insert(page_id);
    }
}
