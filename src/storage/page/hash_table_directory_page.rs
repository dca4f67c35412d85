use crate::common::config::{Lsn, PageId, DB_PAGE_SIZE, DIRECTORY_ARRAY_SIZE, INVALID_PAGE_ID};
use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use std::collections::HashMap;

const OFFSET_LSN: usize = 0;
const OFFSET_PAGE_ID: usize = 8;
const OFFSET_MAX_DEPTH: usize = 12;
const OFFSET_GLOBAL_DEPTH: usize = 16;
const OFFSET_LOCAL_DEPTHS: usize = 20;
const OFFSET_BUCKET_PAGE_IDS: usize = OFFSET_LOCAL_DEPTHS + DIRECTORY_ARRAY_SIZE;
const DIRECTORY_PAGE_BYTES: usize = OFFSET_BUCKET_PAGE_IDS + 4 * DIRECTORY_ARRAY_SIZE;

/**
 * Directory page for the extendible hash index.
 *
 * Directory format (size in bytes):
 * -----------------------------------------------------------------------------------------------
 * | LSN (8) | PageId (4) | MaxDepth (4) | GlobalDepth (4) | LocalDepths (512) | BucketPageIds (2048) |
 * -----------------------------------------------------------------------------------------------
 *
 * All fields are little-endian. The view borrows the byte buffer of a pinned frame; nothing here
 * owns memory, and mutations land directly in the frame image.
 */
pub struct HashTableDirectoryPage<'a> {
    data: &'a mut [u8; DB_PAGE_SIZE],
}

impl<'a> HashTableDirectoryPage<'a> {
    pub fn view(data: &'a mut [u8; DB_PAGE_SIZE]) -> Self {
        Self { data }
    }

    /// Formats a freshly allocated page as an empty directory of global depth zero. Every bucket
    /// slot starts out invalid.
    pub fn init(&mut self, page_id: PageId, max_depth: u32) {
        debug_assert!(DIRECTORY_PAGE_BYTES <= DB_PAGE_SIZE);
        debug_assert!((1usize << max_depth) <= DIRECTORY_ARRAY_SIZE);
        self.data[..DIRECTORY_PAGE_BYTES].fill(0);
        self.set_page_id(page_id);
        LittleEndian::write_u32(&mut self.data[OFFSET_MAX_DEPTH..OFFSET_MAX_DEPTH + 4], max_depth);
        for bucket_idx in 0..DIRECTORY_ARRAY_SIZE as u32 {
            self.set_bucket_page_id(bucket_idx, INVALID_PAGE_ID);
        }
    }

    pub fn get_lsn(&self) -> Lsn {
        LittleEndian::read_u64(&self.data[OFFSET_LSN..OFFSET_LSN + 8])
    }

    pub fn set_lsn(&mut self, lsn: Lsn) {
        LittleEndian::write_u64(&mut self.data[OFFSET_LSN..OFFSET_LSN + 8], lsn);
    }

    pub fn get_page_id(&self) -> PageId {
        LittleEndian::read_i32(&self.data[OFFSET_PAGE_ID..OFFSET_PAGE_ID + 4])
    }

    pub fn set_page_id(&mut self, page_id: PageId) {
        LittleEndian::write_i32(&mut self.data[OFFSET_PAGE_ID..OFFSET_PAGE_ID + 4], page_id);
    }

    /// The growth cap this table was created with; never exceeds `DIRECTORY_MAX_DEPTH`.
    pub fn get_max_depth(&self) -> u32 {
        LittleEndian::read_u32(&self.data[OFFSET_MAX_DEPTH..OFFSET_MAX_DEPTH + 4])
    }

    /// Returns the global depth of the hash table directory.
    pub fn get_global_depth(&self) -> u32 {
        LittleEndian::read_u32(&self.data[OFFSET_GLOBAL_DEPTH..OFFSET_GLOBAL_DEPTH + 4])
    }

    fn set_global_depth(&mut self, global_depth: u32) {
        LittleEndian::write_u32(
            &mut self.data[OFFSET_GLOBAL_DEPTH..OFFSET_GLOBAL_DEPTH + 4],
            global_depth,
        );
    }

    /// Returns a mask of global-depth 1's and the rest 0's.
    pub fn get_global_depth_mask(&self) -> u32 {
        (1 << self.get_global_depth()) - 1
    }

    /// Returns a mask of local-depth 1's and the rest 0's for the bucket at `bucket_idx`.
    pub fn get_local_depth_mask(&self, bucket_idx: u32) -> u32 {
        (1 << self.get_local_depth(bucket_idx)) - 1
    }

    /// The current directory size.
    pub fn size(&self) -> u32 {
        1 << self.get_global_depth()
    }

    /// Looks up the bucket page id at a directory index.
    pub fn get_bucket_page_id(&self, bucket_idx: u32) -> PageId {
        let offset = OFFSET_BUCKET_PAGE_IDS + 4 * bucket_idx as usize;
        LittleEndian::read_i32(&self.data[offset..offset + 4])
    }

    /// Updates the directory entry at `bucket_idx` to point at `bucket_page_id`.
    pub fn set_bucket_page_id(&mut self, bucket_idx: u32, bucket_page_id: PageId) {
        let offset = OFFSET_BUCKET_PAGE_IDS + 4 * bucket_idx as usize;
        LittleEndian::write_i32(&mut self.data[offset..offset + 4], bucket_page_id);
    }

    /// Gets the local depth of the bucket at `bucket_idx`.
    pub fn get_local_depth(&self, bucket_idx: u32) -> u32 {
        self.data[OFFSET_LOCAL_DEPTHS + bucket_idx as usize] as u32
    }

    /// Sets the local depth of the bucket at `bucket_idx`.
    pub fn set_local_depth(&mut self, bucket_idx: u32, local_depth: u8) {
        self.data[OFFSET_LOCAL_DEPTHS + bucket_idx as usize] = local_depth;
    }

    /// Increments the local depth of the bucket at `bucket_idx`.
    pub fn incr_local_depth(&mut self, bucket_idx: u32) {
        self.data[OFFSET_LOCAL_DEPTHS + bucket_idx as usize] += 1;
    }

    /// Decrements the local depth of the bucket at `bucket_idx`.
    pub fn decr_local_depth(&mut self, bucket_idx: u32) {
        self.data[OFFSET_LOCAL_DEPTHS + bucket_idx as usize] -= 1;
    }

    /// The directory index that mirrors `bucket_idx` at its current local depth. Valid only while
    /// the local depth is non-zero.
    pub fn get_split_image_index(&self, bucket_idx: u32) -> u32 {
        bucket_idx ^ (1 << (self.get_local_depth(bucket_idx) - 1))
    }

    /// Doubles the directory. The new upper half mirrors the lower half: same bucket pointers,
    /// same local depths, so every hash that gained an address bit still reaches its old bucket.
    pub fn incr_global_depth(&mut self) {
        let old_size = self.size();
        assert!(
            self.get_global_depth() < self.get_max_depth(),
            "directory growth past max depth {}",
            self.get_max_depth()
        );
        for bucket_idx in 0..old_size {
            let page_id = self.get_bucket_page_id(bucket_idx);
            let local_depth = self.get_local_depth(bucket_idx) as u8;
            self.set_bucket_page_id(old_size + bucket_idx, page_id);
            self.set_local_depth(old_size + bucket_idx, local_depth);
        }
        self.set_global_depth(self.get_global_depth() + 1);
        debug!("Directory grew to global depth {}", self.get_global_depth());
    }

    /// Halves the directory.
    pub fn decr_global_depth(&mut self) {
        assert!(self.get_global_depth() > 0, "directory shrink below depth 0");
        self.set_global_depth(self.get_global_depth() - 1);
        debug!("Directory shrank to global depth {}", self.get_global_depth());
    }

    /// True if the directory can be halved: depth is non-zero and no live entry needs the top
    /// address bit.
    pub fn can_shrink(&self) -> bool {
        if self.get_global_depth() == 0 {
            return false;
        }
        (0..self.size()).all(|bucket_idx| self.get_local_depth(bucket_idx) < self.get_global_depth())
    }

    /// Verifies the integrity of the directory:
    ///
    /// 1. All local depths are less than or equal to the global depth.
    /// 2. Each bucket has precisely 2^(global depth - local depth) pointers pointing to it.
    /// 3. The local depth is the same at each index with the same bucket page id.
    pub fn verify_integrity(&self) {
        let mut page_id_counts: HashMap<PageId, u32> = HashMap::new();
        let mut page_id_depths: HashMap<PageId, u32> = HashMap::new();

        for bucket_idx in 0..self.size() {
            let page_id = self.get_bucket_page_id(bucket_idx);
            let local_depth = self.get_local_depth(bucket_idx);
            assert!(
                local_depth <= self.get_global_depth(),
                "local depth {} at index {} exceeds global depth {}",
                local_depth,
                bucket_idx,
                self.get_global_depth()
            );

            *page_id_counts.entry(page_id).or_insert(0) += 1;
            match page_id_depths.get(&page_id) {
                Some(&depth) => assert_eq!(
                    depth, local_depth,
                    "inconsistent local depths for bucket page {}",
                    page_id
                ),
                None => {
                    page_id_depths.insert(page_id, local_depth);
                }
            }
        }

        for (page_id, count) in page_id_counts {
            let local_depth = page_id_depths[&page_id];
            assert_eq!(
                count,
                1 << (self.get_global_depth() - local_depth),
                "bucket page {} referenced by {} entries, expected {}",
                page_id,
                count,
                1u32 << (self.get_global_depth() - local_depth)
            );
        }
    }

    /// Logs the current directory layout.
    pub fn print_directory(&self) {
        debug!(
            "Directory page {}: global depth {} (max {})",
            self.get_page_id(),
            self.get_global_depth(),
            self.get_max_depth()
        );
        for bucket_idx in 0..self.size() {
            debug!(
                "  bucket_idx {}: page id {} (local depth {})",
                bucket_idx,
                self.get_bucket_page_id(bucket_idx),
                self.get_local_depth(bucket_idx)
            );
        }
    }
}
