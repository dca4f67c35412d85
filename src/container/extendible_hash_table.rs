use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::config::{PageId, DB_PAGE_SIZE, DIRECTORY_MAX_DEPTH, INVALID_PAGE_ID};
use crate::concurrency::transaction::Transaction;
use crate::container::hash_function::KeyHasher;
use crate::storage::index::codec::FixedSizeCodec;
use crate::storage::index::comparator::KeyComparator;
use crate::storage::page::hash_table_bucket_page::HashTableBucketPage;
use crate::storage::page::hash_table_directory_page::HashTableDirectoryPage;
use crate::storage::page::hash_table_page_defs::{bucket_array_size, bucket_page_bytes};
use crate::storage::page::page::Page;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::marker::PhantomData;
use std::sync::Arc;

/// Disk-backed extendible hash table. Non-unique keys are supported; exact (key, value)
/// duplicates are rejected. The table owns no pages: the directory and every bucket are borrowed
/// from the buffer pool under the pin/unpin protocol, and the table grows and shrinks as buckets
/// fill and drain.
///
/// Lookups and the insert/remove fast paths run under the table's read latch; bucket splits and
/// merges take the write latch. A caller that finds a full (or emptied) bucket drops the read
/// latch before escalating, so the slow path revalidates everything it saw.
///
/// Frame guards are never held across a buffer pool call: the pool locks frames while holding
/// its own latch, so holding one the other way around could deadlock against a concurrent flush.
/// Pinning keeps a page's frame stable across the guard gaps instead.
pub struct ExtendibleHashTable<K, V, C> {
    index_name: String,
    bpm: Arc<dyn BufferPoolManager>,
    comparator: C,
    hash_fn: Box<dyn KeyHasher<K>>,
    /// `INVALID_PAGE_ID` until the first insert materializes the directory.
    directory_page_id: Mutex<PageId>,
    directory_max_depth: u32,
    bucket_max_size: usize,
    table_latch: RwLock<()>,
    _value_type: PhantomData<V>,
}

enum InsertOutcome {
    Done(bool),
    BucketFull,
    Failed,
}

enum SplitOutcome {
    Done(bool),
    Split,
    Failed,
}

impl<K, V, C> ExtendibleHashTable<K, V, C>
where
    K: FixedSizeCodec,
    V: FixedSizeCodec,
    C: KeyComparator<K>,
{
    /// Creates a hash table handle. The directory page is only allocated on first insert.
    ///
    /// `bucket_max_size` is part of this table's on-disk format; it defaults to
    /// `bucket_array_size::<K, V>()` through [`Self::with_default_sizes`] and may be lowered for
    /// tables that should split earlier.
    pub fn new(
        index_name: String,
        bpm: Arc<dyn BufferPoolManager>,
        comparator: C,
        hash_fn: Box<dyn KeyHasher<K>>,
        directory_max_depth: u32,
        bucket_max_size: usize,
    ) -> Self {
        assert!(
            directory_max_depth <= DIRECTORY_MAX_DEPTH,
            "directory depth {} exceeds the format limit {}",
            directory_max_depth,
            DIRECTORY_MAX_DEPTH
        );
        assert!(bucket_max_size > 0, "bucket capacity must be positive");
        assert!(
            bucket_page_bytes(bucket_max_size, K::ENCODED_SIZE + V::ENCODED_SIZE) <= DB_PAGE_SIZE,
            "bucket of {} slots does not fit in a page",
            bucket_max_size
        );
        info!(
            "Creating extendible hash table {} (directory max depth {}, bucket size {})",
            index_name, directory_max_depth, bucket_max_size
        );
        Self {
            index_name,
            bpm,
            comparator,
            hash_fn,
            directory_page_id: Mutex::new(INVALID_PAGE_ID),
            directory_max_depth,
            bucket_max_size,
            table_latch: RwLock::new(()),
            _value_type: PhantomData,
        }
    }

    /// Creates a table with the largest bucket that fits in a page and the full directory depth.
    pub fn with_default_sizes(
        index_name: String,
        bpm: Arc<dyn BufferPoolManager>,
        comparator: C,
        hash_fn: Box<dyn KeyHasher<K>>,
    ) -> Self {
        Self::new(
            index_name,
            bpm,
            comparator,
            hash_fn,
            DIRECTORY_MAX_DEPTH,
            bucket_array_size::<K, V>(),
        )
    }

    /// Downcasts the hash function's 64-bit digest for directory addressing.
    fn hash(&self, key: &K) -> u32 {
        self.hash_fn.get_hash(key) as u32
    }

    fn get_directory_page_id(&self) -> PageId {
        *self.directory_page_id.lock()
    }

    /// Page id of the directory, materializing the directory and its first bucket on first use.
    fn directory_page_id_or_init(&self) -> Option<PageId> {
        let mut directory_page_id = self.directory_page_id.lock();
        if *directory_page_id != INVALID_PAGE_ID {
            return Some(*directory_page_id);
        }

        let (dir_page_id, dir_frame) = self.bpm.new_page()?;
        let Some((bucket_page_id, _bucket_frame)) = self.bpm.new_page() else {
            // Give the half-built directory back so a later insert can retry cleanly.
            assert!(self.bpm.unpin_page(dir_page_id, false));
            self.bpm.delete_page(dir_page_id);
            return None;
        };

        {
            let mut dir_guard = dir_frame.write();
            let mut directory = HashTableDirectoryPage::view(dir_guard.get_data_mut());
            directory.init(dir_page_id, self.directory_max_depth);
            directory.set_bucket_page_id(0, bucket_page_id);
            directory.set_local_depth(0, 0);
        }
        // The bucket page arrives zeroed, which already is the image of an empty bucket.
        assert!(self.bpm.unpin_page(dir_page_id, true));
        assert!(self.bpm.unpin_page(bucket_page_id, true));

        *directory_page_id = dir_page_id;
        info!(
            "Hash table {}: directory page {} with initial bucket page {}",
            self.index_name, dir_page_id, bucket_page_id
        );
        Some(dir_page_id)
    }

    /// Resolves the bucket page a key addresses right now. The directory must be pinned by the
    /// caller (`dir_frame`).
    fn key_to_bucket(&self, dir_frame: &Arc<RwLock<Page>>, key: &K) -> (u32, PageId) {
        let mut dir_guard = dir_frame.write();
        let directory = HashTableDirectoryPage::view(dir_guard.get_data_mut());
        let bucket_idx = self.hash(key) & directory.get_global_depth_mask();
        (bucket_idx, directory.get_bucket_page_id(bucket_idx))
    }

    /// Collects every value stored under `key`.
    pub fn get_value(&self, _transaction: Option<&Transaction>, key: &K) -> Vec<V> {
        let mut result = Vec::new();
        let _table_guard = self.table_latch.read();

        let directory_page_id = self.get_directory_page_id();
        if directory_page_id == INVALID_PAGE_ID {
            return result;
        }
        let Some(dir_frame) = self.bpm.fetch_page(directory_page_id) else {
            return result;
        };
        let (_bucket_idx, bucket_page_id) = self.key_to_bucket(&dir_frame, key);
        assert!(self.bpm.unpin_page(directory_page_id, false));

        let Some(bucket_frame) = self.bpm.fetch_page(bucket_page_id) else {
            return result;
        };
        {
            let mut bucket_guard = bucket_frame.write();
            let bucket: HashTableBucketPage<K, V> =
                HashTableBucketPage::view(bucket_guard.get_data_mut(), self.bucket_max_size);
            bucket.get_value(key, &self.comparator, &mut result);
        }
        assert!(self.bpm.unpin_page(bucket_page_id, false));
        result
    }

    /// Inserts a (key, value) pair, splitting buckets and growing the directory as needed.
    /// Returns `false` on an exact duplicate, when the directory cannot grow any further, or
    /// when the buffer pool has no frame to spare.
    pub fn insert(&self, _transaction: Option<&Transaction>, key: &K, value: &V) -> bool {
        loop {
            {
                let _table_guard = self.table_latch.read();
                match self.try_insert(key, value) {
                    InsertOutcome::Done(result) => return result,
                    InsertOutcome::Failed => return false,
                    InsertOutcome::BucketFull => {}
                }
            }
            {
                let _table_guard = self.table_latch.write();
                match self.split_insert(key, value) {
                    SplitOutcome::Done(result) => return result,
                    SplitOutcome::Failed => return false,
                    // Retry from the top; the insert may hit another full bucket and split again.
                    SplitOutcome::Split => {}
                }
            }
        }
    }

    /// Insert fast path under the read latch. Reports `BucketFull` instead of touching the
    /// directory so the caller can escalate to the write latch.
    fn try_insert(&self, key: &K, value: &V) -> InsertOutcome {
        let Some(directory_page_id) = self.directory_page_id_or_init() else {
            return InsertOutcome::Failed;
        };
        let Some(dir_frame) = self.bpm.fetch_page(directory_page_id) else {
            return InsertOutcome::Failed;
        };
        let (_bucket_idx, bucket_page_id) = self.key_to_bucket(&dir_frame, key);
        assert!(self.bpm.unpin_page(directory_page_id, false));

        let Some(bucket_frame) = self.bpm.fetch_page(bucket_page_id) else {
            return InsertOutcome::Failed;
        };
        let outcome = {
            let mut bucket_guard = bucket_frame.write();
            let mut bucket: HashTableBucketPage<K, V> =
                HashTableBucketPage::view(bucket_guard.get_data_mut(), self.bucket_max_size);
            if bucket.is_full() {
                None
            } else {
                Some(bucket.insert(key, value, &self.comparator))
            }
        };
        match outcome {
            Some(inserted) => {
                assert!(self.bpm.unpin_page(bucket_page_id, inserted));
                InsertOutcome::Done(inserted)
            }
            None => {
                assert!(self.bpm.unpin_page(bucket_page_id, false));
                InsertOutcome::BucketFull
            }
        }
    }

    /// Splits the bucket the key maps to, under the write latch.
    ///
    /// Everything observed under the read latch is stale by now, so the bucket is re-resolved
    /// and re-checked: a racing insert may already have split it, in which case the pair goes
    /// straight in. The directory stays pinned across the whole split, which keeps the values
    /// read in the first stage stable while no frame guard is held.
    fn split_insert(&self, key: &K, value: &V) -> SplitOutcome {
        let Some(directory_page_id) = self.directory_page_id_or_init() else {
            return SplitOutcome::Failed;
        };
        let Some(dir_frame) = self.bpm.fetch_page(directory_page_id) else {
            return SplitOutcome::Failed;
        };

        let (bucket_idx, bucket_page_id, local_depth, global_depth, max_depth) = {
            let mut dir_guard = dir_frame.write();
            let directory = HashTableDirectoryPage::view(dir_guard.get_data_mut());
            let bucket_idx = self.hash(key) & directory.get_global_depth_mask();
            (
                bucket_idx,
                directory.get_bucket_page_id(bucket_idx),
                directory.get_local_depth(bucket_idx),
                directory.get_global_depth(),
                directory.get_max_depth(),
            )
        };

        let Some(bucket_frame) = self.bpm.fetch_page(bucket_page_id) else {
            assert!(self.bpm.unpin_page(directory_page_id, false));
            return SplitOutcome::Failed;
        };
        let revalidated = {
            let mut bucket_guard = bucket_frame.write();
            let mut bucket: HashTableBucketPage<K, V> =
                HashTableBucketPage::view(bucket_guard.get_data_mut(), self.bucket_max_size);
            if bucket.is_full() {
                None
            } else {
                Some(bucket.insert(key, value, &self.comparator))
            }
        };
        if let Some(inserted) = revalidated {
            assert!(self.bpm.unpin_page(bucket_page_id, inserted));
            assert!(self.bpm.unpin_page(directory_page_id, false));
            return SplitOutcome::Done(inserted);
        }

        if local_depth >= max_depth {
            warn!(
                "Hash table {}: bucket {} already at max depth {}, insert fails",
                self.index_name, bucket_page_id, local_depth
            );
            assert!(self.bpm.unpin_page(bucket_page_id, false));
            assert!(self.bpm.unpin_page(directory_page_id, false));
            return SplitOutcome::Failed;
        }

        // Allocate the image bucket before touching directory state, so a full pool leaves the
        // table exactly as it was.
        let Some((image_page_id, image_frame)) = self.bpm.new_page() else {
            assert!(self.bpm.unpin_page(bucket_page_id, false));
            assert!(self.bpm.unpin_page(directory_page_id, false));
            return SplitOutcome::Failed;
        };

        // Grow the directory if the bucket already uses every address bit, then repoint the
        // whole cohort that shared the split bucket: entries agreeing with it on the old depth
        // bits part ways on the newly significant bit.
        let new_local_depth = local_depth + 1;
        let split_bit = 1u32 << local_depth;
        let old_mask = split_bit - 1;
        let image_idx = bucket_idx ^ split_bit;
        {
            let mut dir_guard = dir_frame.write();
            let mut directory = HashTableDirectoryPage::view(dir_guard.get_data_mut());
            if local_depth == global_depth {
                directory.incr_global_depth();
            }
            directory.incr_local_depth(bucket_idx);
            directory.set_bucket_page_id(image_idx, image_page_id);
            directory.set_local_depth(image_idx, new_local_depth as u8);
            for dir_idx in 0..directory.size() {
                if dir_idx & old_mask != bucket_idx & old_mask {
                    continue;
                }
                if dir_idx & split_bit == bucket_idx & split_bit {
                    directory.set_bucket_page_id(dir_idx, bucket_page_id);
                } else {
                    directory.set_bucket_page_id(dir_idx, image_page_id);
                }
                directory.set_local_depth(dir_idx, new_local_depth as u8);
            }
        }

        // Deal the pairs across the two buckets by the newly significant address bit.
        let mask = (1u32 << new_local_depth) - 1;
        let bucket_low = bucket_idx & mask;
        let moved = {
            let mut bucket_guard = bucket_frame.write();
            let mut bucket: HashTableBucketPage<K, V> =
                HashTableBucketPage::view(bucket_guard.get_data_mut(), self.bucket_max_size);
            let pairs = bucket.get_all_data();
            bucket.clear();
            let (stay, moved): (Vec<_>, Vec<_>) = pairs
                .into_iter()
                .partition(|(pair_key, _)| self.hash(pair_key) & mask == bucket_low);
            for (pair_key, pair_value) in &stay {
                bucket.insert(pair_key, pair_value, &self.comparator);
            }
            moved
        };
        {
            // The image page arrives zeroed, which already is an empty bucket.
            let mut image_guard = image_frame.write();
            let mut image: HashTableBucketPage<K, V> =
                HashTableBucketPage::view(image_guard.get_data_mut(), self.bucket_max_size);
            for (pair_key, pair_value) in &moved {
                image.insert(pair_key, pair_value, &self.comparator);
            }
        }
        debug!(
            "Hash table {}: split bucket {} (new depth {}), {} pairs moved to image {}",
            self.index_name,
            bucket_page_id,
            new_local_depth,
            moved.len(),
            image_page_id
        );

        assert!(self.bpm.unpin_page(directory_page_id, true));
        assert!(self.bpm.unpin_page(bucket_page_id, true));
        assert!(self.bpm.unpin_page(image_page_id, true));
        SplitOutcome::Split
    }

    /// Removes a (key, value) pair. A bucket left without live pairs triggers a merge attempt
    /// under the write latch.
    pub fn remove(&self, _transaction: Option<&Transaction>, key: &K, value: &V) -> bool {
        let (removed, now_empty) = {
            let _table_guard = self.table_latch.read();

            let directory_page_id = self.get_directory_page_id();
            if directory_page_id == INVALID_PAGE_ID {
                return false;
            }
            let Some(dir_frame) = self.bpm.fetch_page(directory_page_id) else {
                return false;
            };
            let (_bucket_idx, bucket_page_id) = self.key_to_bucket(&dir_frame, key);
            assert!(self.bpm.unpin_page(directory_page_id, false));

            let Some(bucket_frame) = self.bpm.fetch_page(bucket_page_id) else {
                return false;
            };
            let (removed, now_empty) = {
                let mut bucket_guard = bucket_frame.write();
                let mut bucket: HashTableBucketPage<K, V> =
                    HashTableBucketPage::view(bucket_guard.get_data_mut(), self.bucket_max_size);
                let removed = bucket.remove(key, value, &self.comparator);
                (removed, bucket.num_readable() == 0)
            };
            assert!(self.bpm.unpin_page(bucket_page_id, removed));
            (removed, now_empty)
        };

        if removed && now_empty {
            let _table_guard = self.table_latch.write();
            self.merge(key);
        }
        removed
    }

    /// Folds the (empty) bucket the key maps to into its split image, under the write latch.
    ///
    /// Conservative on purpose: gives up when the sibling sits at a different depth or when the
    /// bucket was repopulated between the remove and this call. Compactness lost that way is
    /// recovered by later merges.
    fn merge(&self, key: &K) {
        let directory_page_id = self.get_directory_page_id();
        if directory_page_id == INVALID_PAGE_ID {
            return;
        }
        let Some(dir_frame) = self.bpm.fetch_page(directory_page_id) else {
            return;
        };

        let (bucket_idx, image_idx, bucket_page_id, image_page_id, mergeable) = {
            let mut dir_guard = dir_frame.write();
            let directory = HashTableDirectoryPage::view(dir_guard.get_data_mut());
            let bucket_idx = self.hash(key) & directory.get_global_depth_mask();
            let local_depth = directory.get_local_depth(bucket_idx);
            if local_depth == 0 {
                (bucket_idx, 0, INVALID_PAGE_ID, INVALID_PAGE_ID, false)
            } else {
                let image_idx = directory.get_split_image_index(bucket_idx);
                let bucket_page_id = directory.get_bucket_page_id(bucket_idx);
                let image_page_id = directory.get_bucket_page_id(image_idx);
                let mergeable = directory.get_local_depth(image_idx) == local_depth
                    && bucket_page_id != image_page_id;
                (bucket_idx, image_idx, bucket_page_id, image_page_id, mergeable)
            }
        };
        if !mergeable {
            assert!(self.bpm.unpin_page(directory_page_id, false));
            return;
        }

        // The bucket may have been repopulated since the remove that queued this merge.
        let Some(bucket_frame) = self.bpm.fetch_page(bucket_page_id) else {
            assert!(self.bpm.unpin_page(directory_page_id, false));
            return;
        };
        let still_empty = {
            let mut bucket_guard = bucket_frame.write();
            let bucket: HashTableBucketPage<K, V> =
                HashTableBucketPage::view(bucket_guard.get_data_mut(), self.bucket_max_size);
            bucket.num_readable() == 0
        };
        assert!(self.bpm.unpin_page(bucket_page_id, false));
        if !still_empty {
            assert!(self.bpm.unpin_page(directory_page_id, false));
            return;
        }

        assert!(
            self.bpm.delete_page(bucket_page_id),
            "empty bucket {} still pinned during merge",
            bucket_page_id
        );

        // Both cohorts now share the image bucket at the shallower depth, and the directory
        // halves for as long as no bucket needs its top address bit.
        {
            let mut dir_guard = dir_frame.write();
            let mut directory = HashTableDirectoryPage::view(dir_guard.get_data_mut());
            directory.set_bucket_page_id(bucket_idx, image_page_id);
            directory.decr_local_depth(bucket_idx);
            directory.decr_local_depth(image_idx);
            let new_local_depth = directory.get_local_depth(bucket_idx) as u8;
            for dir_idx in 0..directory.size() {
                let page_id = directory.get_bucket_page_id(dir_idx);
                if page_id == bucket_page_id || page_id == image_page_id {
                    directory.set_bucket_page_id(dir_idx, image_page_id);
                    directory.set_local_depth(dir_idx, new_local_depth);
                }
            }
            while directory.can_shrink() {
                directory.decr_global_depth();
            }
            debug!(
                "Hash table {}: merged bucket {} into {} at depth {}",
                self.index_name, bucket_page_id, image_page_id, new_local_depth
            );
        }
        assert!(self.bpm.unpin_page(directory_page_id, true));
    }

    /// Current global depth; zero while the table is still empty.
    pub fn get_global_depth(&self) -> u32 {
        let _table_guard = self.table_latch.read();
        let directory_page_id = self.get_directory_page_id();
        if directory_page_id == INVALID_PAGE_ID {
            return 0;
        }
        let Some(dir_frame) = self.bpm.fetch_page(directory_page_id) else {
            return 0;
        };
        let global_depth = {
            let mut dir_guard = dir_frame.write();
            HashTableDirectoryPage::view(dir_guard.get_data_mut()).get_global_depth()
        };
        assert!(self.bpm.unpin_page(directory_page_id, false));
        global_depth
    }

    /// Asserts the directory invariants: depth bounds, fan-out counts and depth agreement across
    /// aliased entries.
    pub fn verify_integrity(&self) {
        let _table_guard = self.table_latch.read();
        let directory_page_id = self.get_directory_page_id();
        if directory_page_id == INVALID_PAGE_ID {
            return;
        }
        let Some(dir_frame) = self.bpm.fetch_page(directory_page_id) else {
            return;
        };
        {
            let mut dir_guard = dir_frame.write();
            HashTableDirectoryPage::view(dir_guard.get_data_mut()).verify_integrity();
        }
        assert!(self.bpm.unpin_page(directory_page_id, false));
    }

    pub fn get_index_name(&self) -> &str {
        &self.index_name
    }
}
