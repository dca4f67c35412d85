use crate::common::logger::initialize_logger;
use log::info;
use pyrite::buffer::buffer_pool_manager::{BufferPoolManager, BufferPoolManagerInstance};
use pyrite::buffer::lru_replacer::LruReplacer;
use pyrite::common::config::{PageId, DB_PAGE_SIZE};
use pyrite::storage::disk::disk_manager::FileDiskManager;
use pyrite::storage::disk::disk_manager_memory::MemoryDiskManager;
use rand::Rng;
use std::sync::Arc;
use tempfile::TempDir;

struct TestContext {
    bpm: Arc<BufferPoolManagerInstance>,
    disk_manager: Arc<FileDiskManager>,
    buffer_pool_size: usize,
    _temp_dir: TempDir,
}

impl TestContext {
    fn new(name: &str, buffer_pool_size: usize) -> Self {
        initialize_logger();
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join(format!("{name}.db"));
        let log_path = temp_dir.path().join(format!("{name}.log"));
        let disk_manager = Arc::new(assert_ok!(FileDiskManager::new(
            db_path.to_str().unwrap(),
            log_path.to_str().unwrap(),
        )));
        let replacer = Arc::new(LruReplacer::new(buffer_pool_size));
        let bpm = Arc::new(BufferPoolManagerInstance::new(
            buffer_pool_size,
            disk_manager.clone(),
            None,
            replacer,
        ));
        Self {
            bpm,
            disk_manager,
            buffer_pool_size,
            _temp_dir: temp_dir,
        }
    }
}

#[test]
fn test_binary_data_survives_eviction() {
    let ctx = TestContext::new("binary_data", 4);
    let bpm = &ctx.bpm;

    // Scenario: the buffer pool is empty, so creating a page must succeed.
    info!("Creating page 0...");
    let (page0_id, page0) = assert_some!(bpm.new_page(), "the empty pool must have room");
    assert_eq!(page0_id, 0);

    let mut rng = rand::thread_rng();
    let mut random_binary_data = [0u8; DB_PAGE_SIZE];
    rng.fill(&mut random_binary_data[..]);
    // Terminal characters in the middle and at the end must survive too.
    random_binary_data[DB_PAGE_SIZE / 2] = 0;
    random_binary_data[DB_PAGE_SIZE - 1] = 0;

    page0.write().get_data_mut().copy_from_slice(&random_binary_data);
    assert!(bpm.unpin_page(page0_id, true));

    // Push page 0 out of the pool by cycling twice the pool size through it.
    for _ in 0..(2 * ctx.buffer_pool_size) {
        let (page_id, _page) = bpm.new_page().expect("Failed to create a new page");
        assert!(bpm.unpin_page(page_id, false));
    }

    // Scenario: fetching page 0 back reads the evicted bytes from disk.
    let page0 = assert_some!(bpm.fetch_page(page0_id), "page 0 must come back after eviction");
    assert_eq!(
        page0.read().get_data(),
        &random_binary_data,
        "Data mismatch after eviction round-trip"
    );
    assert!(bpm.unpin_page(page0_id, false));
}

#[test]
fn test_new_page_fails_when_fully_pinned() {
    let ctx = TestContext::new("fully_pinned", 4);
    let bpm = &ctx.bpm;

    let mut page_ids = Vec::new();
    for i in 0..ctx.buffer_pool_size {
        let (page_id, _page) = bpm.new_page().expect("pool should not be full yet");
        assert_eq!(page_id, i as PageId);
        page_ids.push(page_id);
    }

    // Scenario: every frame is pinned, so no new page can be created.
    for _ in 0..ctx.buffer_pool_size {
        assert!(bpm.new_page().is_none());
    }

    // Scenario: after unpinning page 0, exactly one new page fits, and it evicts page 0.
    assert!(bpm.unpin_page(page_ids[0], false));
    let (page_id, _page) = bpm.new_page().expect("one frame is free again");
    assert_eq!(page_id, ctx.buffer_pool_size as PageId);
    assert!(!bpm.flush_page(page_ids[0]), "page 0 should have been evicted");
    assert!(bpm.new_page().is_none());
}

#[test]
fn test_lru_victim_selection_order() {
    let ctx = TestContext::new("victim_order", 4);
    let bpm = &ctx.bpm;

    let mut page_ids = Vec::new();
    for _ in 0..ctx.buffer_pool_size {
        let (page_id, _page) = bpm.new_page().unwrap();
        page_ids.push(page_id);
    }
    for &page_id in &page_ids {
        assert!(bpm.unpin_page(page_id, false));
    }

    // The next miss evicts the least recently unpinned page: page 0.
    let fetched = bpm.fetch_page(10).expect("fetch of a cold page must evict");
    assert!(fetched.read().get_data().iter().all(|&b| b == 0));

    assert!(!bpm.flush_page(page_ids[0]), "page 0 was the LRU victim");
    for &page_id in &page_ids[1..] {
        assert!(bpm.flush_page(page_id), "page {} should still be resident", page_id);
    }
    assert!(bpm.unpin_page(10, false));
}

#[test]
fn test_unpin_and_flush_roundtrip() {
    let ctx = TestContext::new("unpin_flush", 4);
    let bpm = &ctx.bpm;

    let (page_id, page) = bpm.new_page().unwrap();
    page.write().get_data_mut()[0] = 0x5A;
    assert!(bpm.unpin_page(page_id, true));
    assert!(page.read().is_dirty());

    assert!(bpm.flush_page(page_id));
    assert!(!page.read().is_dirty(), "flush clears the dirty flag");
    assert!(bpm.flush_page(page_id), "flushing a clean page is a no-op that succeeds");

    // Unpinning or flushing a page that is not resident reports failure.
    assert!(!bpm.unpin_page(999, false));
    assert!(!bpm.flush_page(999));
}

#[test]
fn test_dirty_flag_is_sticky() {
    let ctx = TestContext::new("sticky_dirty", 4);
    let bpm = &ctx.bpm;

    let (page_id, page) = bpm.new_page().unwrap();
    page.write().get_data_mut()[7] = 0x77;

    // Two pins; the clean unpin must not wash out the dirty one.
    let _again = bpm.fetch_page(page_id).unwrap();
    assert!(bpm.unpin_page(page_id, true));
    assert!(bpm.unpin_page(page_id, false));
    assert!(page.read().is_dirty());

    // Eviction must write the page back.
    for _ in 0..ctx.buffer_pool_size {
        let (new_page_id, _page) = bpm.new_page().unwrap();
        assert!(bpm.unpin_page(new_page_id, false));
    }
    let page = bpm.fetch_page(page_id).unwrap();
    assert_eq!(page.read().get_data()[7], 0x77);
    assert!(bpm.unpin_page(page_id, false));
}

#[test]
fn test_delete_page_restores_free_list() {
    initialize_logger();
    let buffer_pool_size = 4;
    let disk_manager = Arc::new(MemoryDiskManager::new());
    let replacer = Arc::new(LruReplacer::new(buffer_pool_size));
    let bpm = BufferPoolManagerInstance::new(buffer_pool_size, disk_manager.clone(), None, replacer);

    let (page_id, _page) = bpm.new_page().unwrap();

    // Deleting a pinned page fails; deleting a non-resident page trivially succeeds.
    assert!(!bpm.delete_page(page_id));
    assert!(bpm.delete_page(999));

    assert!(bpm.unpin_page(page_id, false));
    assert!(bpm.delete_page(page_id));
    assert!(disk_manager.is_deallocated(page_id));

    // The frame went back to the free list: the pool holds a full complement of new pages
    // without evicting, and the deleted id is not reused.
    let mut fresh_ids = Vec::new();
    for _ in 0..buffer_pool_size {
        let (fresh_id, _page) = bpm.new_page().unwrap();
        assert_ne!(fresh_id, page_id, "deleted page id must not be reused");
        fresh_ids.push(fresh_id);
    }
    assert!(bpm.new_page().is_none());
}

#[test]
fn test_flush_all_pages() {
    let ctx = TestContext::new("flush_all", 4);
    let bpm = &ctx.bpm;

    let mut pages = Vec::new();
    for i in 0..3 {
        let (page_id, page) = bpm.new_page().unwrap();
        page.write().get_data_mut()[0] = i as u8;
        assert!(bpm.unpin_page(page_id, true));
        pages.push((page_id, page));
    }

    let writes_before = ctx.disk_manager.get_num_writes();
    bpm.flush_all_pages();
    assert!(ctx.disk_manager.get_num_writes() >= writes_before + 3);
    for (_page_id, page) in &pages {
        assert!(!page.read().is_dirty());
    }
}

#[test]
fn test_random_operations_keep_the_pool_consistent() {
    let ctx = TestContext::new("random_ops", 4);
    let bpm = &ctx.bpm;
    let mut rng = rand::thread_rng();

    // Shadow model: pin counts per created page. A page with a live pin is never evicted, so
    // the model can predict which operations must succeed.
    let mut pins: std::collections::HashMap<PageId, u32> = std::collections::HashMap::new();
    let mut created: Vec<PageId> = Vec::new();

    for _ in 0..1000 {
        match rng.gen_range(0..4) {
            0 => match bpm.new_page() {
                Some((page_id, _page)) => {
                    assert!(!created.contains(&page_id), "page ids are never reused");
                    created.push(page_id);
                    *pins.entry(page_id).or_insert(0) += 1;
                }
                None => {
                    let pinned_pages = pins.values().filter(|&&count| count > 0).count();
                    assert!(pinned_pages >= ctx.buffer_pool_size, "new_page only fails when every frame is pinned");
                }
            },
            1 if !created.is_empty() => {
                let page_id = created[rng.gen_range(0..created.len())];
                match bpm.fetch_page(page_id) {
                    Some(_page) => *pins.entry(page_id).or_insert(0) += 1,
                    None => {
                        let pinned_pages = pins.values().filter(|&&count| count > 0).count();
                        assert!(pinned_pages >= ctx.buffer_pool_size);
                        assert_eq!(pins.get(&page_id).copied().unwrap_or(0), 0, "a pinned page is always resident");
                    }
                }
            }
            2 if !created.is_empty() => {
                let page_id = created[rng.gen_range(0..created.len())];
                let count = pins.get(&page_id).copied().unwrap_or(0);
                if count > 0 {
                    assert!(bpm.unpin_page(page_id, rng.gen_bool(0.5)));
                    pins.insert(page_id, count - 1);
                }
            }
            3 if !created.is_empty() => {
                // Flushing may hit a resident or an evicted page; both outcomes are legal.
                let page_id = created[rng.gen_range(0..created.len())];
                bpm.flush_page(page_id);
            }
            _ => {}
        }
    }

    // Drain every pin; afterwards a full sweep of fresh pages must fit.
    let pinned: Vec<(PageId, u32)> = pins.iter().map(|(&page_id, &count)| (page_id, count)).collect();
    for (page_id, count) in pinned {
        for _ in 0..count {
            assert!(bpm.unpin_page(page_id, false));
        }
    }
    for _ in 0..ctx.buffer_pool_size {
        let (page_id, _page) = bpm.new_page().expect("no pins remain");
        assert!(bpm.unpin_page(page_id, false));
    }
}

#[test]
fn test_fetch_pins_again() {
    let ctx = TestContext::new("refetch", 4);
    let bpm = &ctx.bpm;

    let (page_id, _page) = bpm.new_page().unwrap();
    let _second_pin = bpm.fetch_page(page_id).unwrap();

    // Two pins, one unpin: the page must survive a pool sweep.
    assert!(bpm.unpin_page(page_id, false));
    for _ in 0..ctx.buffer_pool_size {
        if let Some((new_page_id, _new_page)) = bpm.new_page() {
            assert!(bpm.unpin_page(new_page_id, false));
        }
    }
    assert!(bpm.flush_page(page_id), "still pinned, must still be resident");
    assert!(bpm.unpin_page(page_id, false));
}
