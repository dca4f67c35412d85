use crate::buffer::replacer::Replacer;
use crate::common::config::{FrameId, PageId, INVALID_PAGE_ID};
use crate::recovery::log_manager::LogManager;
use crate::storage::disk::disk_manager::DiskManager;
use crate::storage::page::page::Page;
use log::{debug, error};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// The surface through which everything above the buffer pool (here, the hash index) moves pages
/// in and out of memory. Implemented by a single instance and by the parallel manager, which
/// shards page ids across several instances.
pub trait BufferPoolManager: Send + Sync {
    /// Fetches the requested page, pinning it. Returns `None` if the page is not resident and
    /// every frame is pinned.
    fn fetch_page(&self, page_id: PageId) -> Option<Arc<RwLock<Page>>>;

    /// Allocates a brand-new page id and pins a zeroed frame for it. Returns `None` if every
    /// frame is pinned.
    fn new_page(&self) -> Option<(PageId, Arc<RwLock<Page>>)>;

    /// Drops one pin. `is_dirty` is OR-ed into the frame's dirty flag, which stays set until the
    /// page is flushed or evicted. Returns `false` if the page is not resident.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool;

    /// Writes the page to disk and clears its dirty flag, regardless of pin state. Returns
    /// `false` if the page is not resident.
    fn flush_page(&self, page_id: PageId) -> bool;

    /// Removes the page from the pool and hands its id back to the disk manager. Returns `true`
    /// if the page was deleted or was not resident to begin with; `false` if it is still pinned.
    fn delete_page(&self, page_id: PageId) -> bool;

    /// Writes every resident dirty page to disk.
    fn flush_all_pages(&self);

    /// Total number of frames.
    fn get_pool_size(&self) -> usize;
}

/// One buffer pool instance: a fixed arena of frames, the page table mapping resident page ids
/// to frames, a free list of unused frames, and a replacer deciding evictions among the unpinned
/// rest.
///
/// When the instance takes part in a parallel pool of `num_instances`, it owns exactly the page
/// ids congruent to `instance_index` modulo `num_instances` and allocates within that class.
pub struct BufferPoolManagerInstance {
    pool_size: usize,
    num_instances: u32,
    instance_index: u32,
    /// Fixed arena of frames; the index into this array is the frame id.
    frames: Box<[Arc<RwLock<Page>>]>,
    /// Page table, free list and allocation cursor, guarded by the instance latch for the whole
    /// duration of every operation.
    latch: Mutex<PoolState>,
    replacer: Arc<dyn Replacer>,
    disk_manager: Arc<dyn DiskManager>,
    log_manager: Option<Arc<LogManager>>,
}

struct PoolState {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    next_page_id: PageId,
}

impl BufferPoolManagerInstance {
    /// Creates a stand-alone instance owning the full page id space.
    pub fn new(
        pool_size: usize,
        disk_manager: Arc<dyn DiskManager>,
        log_manager: Option<Arc<LogManager>>,
        replacer: Arc<dyn Replacer>,
    ) -> Self {
        Self::new_partitioned(pool_size, 1, 0, disk_manager, log_manager, replacer)
    }

    /// Creates one shard of a parallel buffer pool.
    pub fn new_partitioned(
        pool_size: usize,
        num_instances: u32,
        instance_index: u32,
        disk_manager: Arc<dyn DiskManager>,
        log_manager: Option<Arc<LogManager>>,
        replacer: Arc<dyn Replacer>,
    ) -> Self {
        assert!(num_instances > 0, "a buffer pool needs at least one instance");
        assert!(
            instance_index < num_instances,
            "instance index {} out of range for {} instances",
            instance_index,
            num_instances
        );

        let frames = (0..pool_size)
            .map(|_| Arc::new(RwLock::new(Page::new())))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            pool_size,
            num_instances,
            instance_index,
            frames,
            latch: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(pool_size),
                free_list: (0..pool_size).collect(),
                next_page_id: instance_index as PageId,
            }),
            replacer,
            disk_manager,
            log_manager,
        }
    }

    pub fn get_instance_index(&self) -> u32 {
        self.instance_index
    }

    pub fn get_log_manager(&self) -> Option<&Arc<LogManager>> {
        self.log_manager.as_ref()
    }

    /// Hands out the next page id owned by this instance.
    fn allocate_page(&self, state: &mut PoolState) -> PageId {
        let page_id = state.next_page_id;
        state.next_page_id += self.num_instances as PageId;
        debug_assert_eq!(
            page_id % self.num_instances as PageId,
            self.instance_index as PageId,
            "allocated page ids must map back to this instance"
        );
        page_id
    }

    /// Picks a frame to reuse: the free-list head first, then a replacer victim. A dirty victim
    /// is written back before it is handed out, and its old mapping leaves the page table. The
    /// returned frame is reset. `None` when every frame is pinned or the write-back fails.
    fn acquire_frame(&self, state: &mut PoolState) -> Option<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Some(frame_id);
        }

        let frame_id = self.replacer.victim()?;
        let mut page = self.frames[frame_id].write();
        debug_assert_eq!(page.get_pin_count(), 0, "replacer candidates are unpinned");
        if page.is_dirty() {
            if let Err(e) = self.disk_manager.write_page(page.get_page_id(), page.get_data()) {
                error!(
                    "write-back of page {} failed during eviction: {}",
                    page.get_page_id(),
                    e
                );
                drop(page);
                self.replacer.unpin(frame_id);
                return None;
            }
        }
        debug!("Evicting page {} from frame {}", page.get_page_id(), frame_id);
        state.page_table.remove(&page.get_page_id());
        page.reset();
        Some(frame_id)
    }
}

impl BufferPoolManager for BufferPoolManagerInstance {
    fn fetch_page(&self, page_id: PageId) -> Option<Arc<RwLock<Page>>> {
        assert!(page_id != INVALID_PAGE_ID, "fetch of the invalid page id");
        let mut state = self.latch.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id];
            frame.write().incr_pin_count();
            self.replacer.pin(frame_id);
            return Some(Arc::clone(frame));
        }

        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id];
        {
            let mut page = frame.write();
            if let Err(e) = self.disk_manager.read_page(page_id, page.get_data_mut()) {
                error!("read of page {} failed: {}", page_id, e);
                page.reset();
                drop(page);
                state.free_list.push_back(frame_id);
                return None;
            }
            page.set_page_id(page_id);
            page.set_pin_count(1);
        }
        state.page_table.insert(page_id, frame_id);
        Some(Arc::clone(frame))
    }

    fn new_page(&self) -> Option<(PageId, Arc<RwLock<Page>>)> {
        let mut state = self.latch.lock();
        let frame_id = self.acquire_frame(&mut state)?;
        let page_id = self.allocate_page(&mut state);

        let frame = &self.frames[frame_id];
        {
            // The frame comes back reset from acquire_frame, so the data is already zeroed.
            let mut page = frame.write();
            page.set_page_id(page_id);
            page.set_pin_count(1);
        }
        state.page_table.insert(page_id, frame_id);
        debug!("Created page {} in frame {}", page_id, frame_id);
        Some((page_id, Arc::clone(frame)))
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.latch.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };

        let mut page = self.frames[frame_id].write();
        page.decr_pin_count();
        if is_dirty {
            page.set_dirty(true);
        }
        if page.get_pin_count() == 0 {
            self.replacer.unpin(frame_id);
        }
        true
    }

    fn flush_page(&self, page_id: PageId) -> bool {
        assert!(page_id != INVALID_PAGE_ID, "flush of the invalid page id");
        let state = self.latch.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };

        let mut page = self.frames[frame_id].write();
        match self.disk_manager.write_page(page_id, page.get_data()) {
            Ok(()) => {
                page.set_dirty(false);
                true
            }
            Err(e) => {
                error!("flush of page {} failed: {}", page_id, e);
                false
            }
        }
    }

    fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.latch.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            // Not resident: trivially deleted.
            return true;
        };

        let frame = &self.frames[frame_id];
        {
            let mut page = frame.write();
            if page.get_pin_count() > 0 {
                return false;
            }
            page.reset();
        }
        state.page_table.remove(&page_id);
        self.replacer.pin(frame_id);
        state.free_list.push_back(frame_id);
        self.disk_manager.deallocate_page(page_id);
        true
    }

    fn flush_all_pages(&self) {
        let state = self.latch.lock();
        for (&page_id, &frame_id) in &state.page_table {
            let mut page = self.frames[frame_id].write();
            if !page.is_dirty() {
                continue;
            }
            match self.disk_manager.write_page(page_id, page.get_data()) {
                Ok(()) => page.set_dirty(false),
                Err(e) => error!("flush of page {} failed: {}", page_id, e),
            }
        }
    }

    fn get_pool_size(&self) -> usize {
        self.pool_size
    }
}
