use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use xxhash_rust::xxh3::Xxh3;

/// Hash function supplied to the extendible hash table by its caller. The table truncates the
/// 64-bit digest to 32 bits for directory addressing.
pub trait KeyHasher<K>: Send + Sync {
    fn get_hash(&self, key: &K) -> u64;
}

/// Default xxh3-backed hash function for any hashable key type.
pub struct Xxh3KeyHasher<K> {
    _marker: PhantomData<K>,
}

impl<K> Xxh3KeyHasher<K> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K> Default for Xxh3KeyHasher<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Send + Sync> KeyHasher<K> for Xxh3KeyHasher<K> {
    fn get_hash(&self, key: &K) -> u64 {
        let mut hasher = Xxh3::new();
        key.hash(&mut hasher);
        hasher.finish()
    }
}
