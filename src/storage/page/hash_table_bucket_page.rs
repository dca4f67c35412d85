use crate::common::config::DB_PAGE_SIZE;
use crate::storage::index::codec::FixedSizeCodec;
use crate::storage::index::comparator::KeyComparator;
use crate::storage::page::hash_table_page_defs::bucket_page_bytes;
use std::cmp::Ordering;
use std::marker::PhantomData;

/**
 * Bucket page for the extendible hash index. Supports non-unique keys; exact (key, value)
 * duplicates are rejected.
 *
 * Bucket format for a capacity of N slots (sizes in bytes):
 *  ---------------------------------------------------------------------
 * | OCCUPIED (⌈N/8⌉) | READABLE (⌈N/8⌉) | SLOT(0) | SLOT(1) | ... | SLOT(N-1)
 *  ---------------------------------------------------------------------
 *
 * Each slot is the key followed by the value, both in their fixed-width encoding. Bit i of a
 * bitmap lives in byte i/8 under mask 1 << (i % 8). An occupied bit marks a slot that has ever
 * been written; a readable bit marks a slot currently holding a live pair, so readable implies
 * occupied and an occupied-but-not-readable slot is a tombstone.
 *
 * The view borrows the byte buffer of a pinned frame together with the capacity the owning table
 * was created with; the capacity is part of that table's on-disk format.
 */
pub struct HashTableBucketPage<'a, K, V> {
    data: &'a mut [u8; DB_PAGE_SIZE],
    capacity: usize,
    _marker: PhantomData<(K, V)>,
}

impl<'a, K: FixedSizeCodec, V: FixedSizeCodec> HashTableBucketPage<'a, K, V> {
    pub fn view(data: &'a mut [u8; DB_PAGE_SIZE], capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        debug_assert!(bucket_page_bytes(capacity, K::ENCODED_SIZE + V::ENCODED_SIZE) <= DB_PAGE_SIZE);
        Self {
            data,
            capacity,
            _marker: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn bitmap_bytes(&self) -> usize {
        (self.capacity + 7) / 8
    }

    fn slot_offset(&self, bucket_idx: usize) -> usize {
        2 * self.bitmap_bytes() + bucket_idx * (K::ENCODED_SIZE + V::ENCODED_SIZE)
    }

    /// Gets the key at an index in the bucket.
    pub fn key_at(&self, bucket_idx: usize) -> K {
        let offset = self.slot_offset(bucket_idx);
        K::decode_from(&self.data[offset..offset + K::ENCODED_SIZE])
    }

    /// Gets the value at an index in the bucket.
    pub fn value_at(&self, bucket_idx: usize) -> V {
        let offset = self.slot_offset(bucket_idx) + K::ENCODED_SIZE;
        V::decode_from(&self.data[offset..offset + V::ENCODED_SIZE])
    }

    /// Returns whether the slot at `bucket_idx` has ever been written.
    pub fn is_occupied(&self, bucket_idx: usize) -> bool {
        self.data[bucket_idx / 8] & (1 << (bucket_idx % 8)) != 0
    }

    fn set_occupied(&mut self, bucket_idx: usize) {
        self.data[bucket_idx / 8] |= 1 << (bucket_idx % 8);
    }

    /// Returns whether the slot at `bucket_idx` holds a live pair.
    pub fn is_readable(&self, bucket_idx: usize) -> bool {
        self.data[self.bitmap_bytes() + bucket_idx / 8] & (1 << (bucket_idx % 8)) != 0
    }

    fn set_readable(&mut self, bucket_idx: usize) {
        let bitmap_bytes = self.bitmap_bytes();
        self.data[bitmap_bytes + bucket_idx / 8] |= 1 << (bucket_idx % 8);
    }

    /// Scans the bucket and appends every value stored under `key`. Returns whether at least one
    /// key matched.
    pub fn get_value<C: KeyComparator<K>>(&self, key: &K, cmp: &C, result: &mut Vec<V>) -> bool {
        let mut found = false;
        for bucket_idx in 0..self.capacity {
            if self.is_readable(bucket_idx)
                && cmp.compare(&self.key_at(bucket_idx), key) == Ordering::Equal
            {
                result.push(self.value_at(bucket_idx));
                found = true;
            }
        }
        found
    }

    /// Attempts to insert a key and value into the bucket.
    ///
    /// Returns `false` if the exact (key, value) pair is already present, or if no slot is
    /// available. Never-written slots are preferred over tombstones so that slot order roughly
    /// tracks insertion order.
    pub fn insert<C: KeyComparator<K>>(&mut self, key: &K, value: &V, cmp: &C) -> bool {
        let mut tombstone_slot = None;
        let mut fresh_slot = None;
        for bucket_idx in 0..self.capacity {
            if self.is_readable(bucket_idx) {
                if cmp.compare(&self.key_at(bucket_idx), key) == Ordering::Equal
                    && self.value_at(bucket_idx) == *value
                {
                    // Same key with a different value is fine; the same pair twice is not.
                    return false;
                }
            } else if !self.is_occupied(bucket_idx) {
                if fresh_slot.is_none() {
                    fresh_slot = Some(bucket_idx);
                }
            } else if tombstone_slot.is_none() {
                tombstone_slot = Some(bucket_idx);
            }
        }

        let Some(bucket_idx) = fresh_slot.or(tombstone_slot) else {
            return false;
        };
        let offset = self.slot_offset(bucket_idx);
        key.encode_into(&mut self.data[offset..offset + K::ENCODED_SIZE]);
        value.encode_into(
            &mut self.data[offset + K::ENCODED_SIZE..offset + K::ENCODED_SIZE + V::ENCODED_SIZE],
        );
        self.set_occupied(bucket_idx);
        self.set_readable(bucket_idx);
        true
    }

    /// Removes the first matching (key, value) pair. The slot stays occupied as a tombstone.
    pub fn remove<C: KeyComparator<K>>(&mut self, key: &K, value: &V, cmp: &C) -> bool {
        for bucket_idx in 0..self.capacity {
            if self.is_readable(bucket_idx)
                && cmp.compare(&self.key_at(bucket_idx), key) == Ordering::Equal
                && self.value_at(bucket_idx) == *value
            {
                self.remove_at(bucket_idx);
                return true;
            }
        }
        false
    }

    /// Clears the readable bit at `bucket_idx`; the occupied bit stays set.
    pub fn remove_at(&mut self, bucket_idx: usize) {
        let bitmap_bytes = self.bitmap_bytes();
        self.data[bitmap_bytes + bucket_idx / 8] &= !(1 << (bucket_idx % 8));
    }

    /// Whether every slot has been written at least once. Tombstones count, so a full bucket can
    /// still have room for reinsertions but signals the table to split.
    pub fn is_full(&self) -> bool {
        (0..self.capacity).all(|bucket_idx| self.is_occupied(bucket_idx))
    }

    /// Whether no slot has ever been written.
    pub fn is_empty(&self) -> bool {
        (0..self.capacity).all(|bucket_idx| !self.is_occupied(bucket_idx))
    }

    /// Number of live pairs.
    pub fn num_readable(&self) -> usize {
        (0..self.capacity)
            .filter(|&bucket_idx| self.is_readable(bucket_idx))
            .count()
    }

    /// Snapshot of all live pairs in slot order. Used during bucket split.
    pub fn get_all_data(&self) -> Vec<(K, V)> {
        (0..self.capacity)
            .filter(|&bucket_idx| self.is_readable(bucket_idx))
            .map(|bucket_idx| (self.key_at(bucket_idx), self.value_at(bucket_idx)))
            .collect()
    }

    /// Zeroes both bitmaps and the slot array.
    pub fn clear(&mut self) {
        let bytes = bucket_page_bytes(self.capacity, K::ENCODED_SIZE + V::ENCODED_SIZE);
        self.data[..bytes].fill(0);
    }
}
