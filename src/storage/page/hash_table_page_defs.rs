use crate::common::config::DB_PAGE_SIZE;
use crate::storage::index::codec::FixedSizeCodec;

pub type MappingType<K, V> = (K, V);

/**
 * BUCKET_ARRAY_SIZE is the number of (key, value) pairs that can be stored in an extendible hash
 * index bucket page. It is an approximate calculation based on the encoded size of the mapping
 * (key + value). For each key/value pair we need two additional bits for the occupied and
 * readable bitmaps: 4 * DB_PAGE_SIZE / (4 * slot_size + 1) = DB_PAGE_SIZE / (slot_size + 0.25),
 * because 0.25 bytes = 2 bits is the space required to maintain the two flags per pair.
 */
pub const fn bucket_array_size<K: FixedSizeCodec, V: FixedSizeCodec>() -> usize {
    (4 * DB_PAGE_SIZE) / (4 * (K::ENCODED_SIZE + V::ENCODED_SIZE) + 1)
}

/// Bytes a bucket of `capacity` slots occupies inside a page: two bitmaps plus the slot array.
pub const fn bucket_page_bytes(capacity: usize, slot_size: usize) -> usize {
    2 * ((capacity + 7) / 8) + capacity * slot_size
}
