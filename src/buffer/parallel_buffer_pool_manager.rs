use crate::buffer::buffer_pool_manager::{BufferPoolManager, BufferPoolManagerInstance};
use crate::buffer::lru_replacer::LruReplacer;
use crate::buffer::replacer::Replacer;
use crate::common::config::PageId;
use crate::recovery::log_manager::LogManager;
use crate::storage::disk::disk_manager::DiskManager;
use crate::storage::page::page::Page;
use log::debug;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Shards a buffer pool into `num_instances` independent instances to cut latch contention.
///
/// Every page id belongs to exactly one instance (`page_id % num_instances`), so fetch, unpin,
/// flush and delete dispatch directly. Allocation rotates across instances from a start index
/// kept under this manager's own latch; page id order across instances is not observable and is
/// not globally FIFO.
pub struct ParallelBufferPoolManager {
    instances: Vec<Arc<BufferPoolManagerInstance>>,
    start_index: Mutex<usize>,
}

impl ParallelBufferPoolManager {
    /// Creates `num_instances` instances of `pool_size` frames each, every one with its own LRU
    /// replacer.
    pub fn new(
        num_instances: usize,
        pool_size: usize,
        disk_manager: Arc<dyn DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        Self::with_replacers(num_instances, pool_size, disk_manager, log_manager, |_| {
            Arc::new(LruReplacer::new(pool_size))
        })
    }

    /// Creates the instances with a caller-chosen replacer per instance.
    pub fn with_replacers(
        num_instances: usize,
        pool_size: usize,
        disk_manager: Arc<dyn DiskManager>,
        log_manager: Option<Arc<LogManager>>,
        mut make_replacer: impl FnMut(usize) -> Arc<dyn Replacer>,
    ) -> Self {
        assert!(num_instances > 0, "a parallel pool needs at least one instance");
        let instances = (0..num_instances)
            .map(|instance_index| {
                Arc::new(BufferPoolManagerInstance::new_partitioned(
                    pool_size,
                    num_instances as u32,
                    instance_index as u32,
                    Arc::clone(&disk_manager),
                    log_manager.clone(),
                    make_replacer(instance_index),
                ))
            })
            .collect();
        Self {
            instances,
            start_index: Mutex::new(0),
        }
    }

    pub fn get_num_instances(&self) -> usize {
        self.instances.len()
    }

    /// The instance responsible for a page id.
    fn get_instance(&self, page_id: PageId) -> &BufferPoolManagerInstance {
        &self.instances[page_id as usize % self.instances.len()]
    }
}

impl BufferPoolManager for ParallelBufferPoolManager {
    fn fetch_page(&self, page_id: PageId) -> Option<Arc<RwLock<Page>>> {
        self.get_instance(page_id).fetch_page(page_id)
    }

    fn new_page(&self) -> Option<(PageId, Arc<RwLock<Page>>)> {
        let mut start_index = self.start_index.lock();
        let num_instances = self.instances.len();
        for offset in 0..num_instances {
            let instance_index = (*start_index + offset) % num_instances;
            if let Some(result) = self.instances[instance_index].new_page() {
                *start_index = (*start_index + 1) % num_instances;
                debug!("Allocated page {} from instance {}", result.0, instance_index);
                return Some(result);
            }
        }
        None
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.get_instance(page_id).unpin_page(page_id, is_dirty)
    }

    fn flush_page(&self, page_id: PageId) -> bool {
        self.get_instance(page_id).flush_page(page_id)
    }

    fn delete_page(&self, page_id: PageId) -> bool {
        self.get_instance(page_id).delete_page(page_id)
    }

    fn flush_all_pages(&self) {
        for instance in &self.instances {
            instance.flush_all_pages();
        }
    }

    fn get_pool_size(&self) -> usize {
        self.instances.iter().map(|instance| instance.get_pool_size()).sum()
    }
}
