use crate::common::logger::initialize_logger;
use pyrite::buffer::buffer_pool_manager::{BufferPoolManager, BufferPoolManagerInstance};
use pyrite::buffer::lru_replacer::LruReplacer;
use pyrite::common::config::{PageId, DIRECTORY_MAX_DEPTH};
use pyrite::common::rid::Rid;
use pyrite::container::extendible_hash_table::ExtendibleHashTable;
use pyrite::container::hash_function::{KeyHasher, Xxh3KeyHasher};
use pyrite::storage::disk::disk_manager_memory::MemoryDiskManager;
use pyrite::storage::index::comparator::{GenericComparator, IntComparator};
use pyrite::storage::index::generic_key::GenericKey;
use std::sync::Arc;
use std::thread;

/// Maps a key to itself, so tests can steer keys into chosen buckets.
struct IdentityHasher;

impl KeyHasher<i32> for IdentityHasher {
    fn get_hash(&self, key: &i32) -> u64 {
        *key as u64
    }
}

fn make_bpm(buffer_pool_size: usize) -> Arc<BufferPoolManagerInstance> {
    initialize_logger();
    let disk_manager = Arc::new(MemoryDiskManager::new());
    let replacer = Arc::new(LruReplacer::new(buffer_pool_size));
    Arc::new(BufferPoolManagerInstance::new(
        buffer_pool_size,
        disk_manager,
        None,
        replacer,
    ))
}

fn identity_table(
    name: &str,
    bucket_max_size: usize,
) -> ExtendibleHashTable<i32, i32, IntComparator> {
    ExtendibleHashTable::new(
        name.to_string(),
        make_bpm(50),
        IntComparator::new(),
        Box::new(IdentityHasher),
        DIRECTORY_MAX_DEPTH,
        bucket_max_size,
    )
}

#[test]
fn test_split_grows_global_depth() {
    // Bucket capacity 2 and identity hashing: 1 and 5 collide on the low two address bits, so
    // inserting 3 forces two splits and a directory of global depth 2.
    let ht = identity_table("split_growth", 2);

    assert!(ht.insert(None, &1, &100));
    assert!(ht.insert(None, &5, &500));
    assert_eq!(ht.get_global_depth(), 0);

    assert!(ht.insert(None, &3, &300));
    assert_eq!(ht.get_global_depth(), 2);
    ht.verify_integrity();

    assert_eq!(ht.get_value(None, &1), vec![100]);
    assert_eq!(ht.get_value(None, &5), vec![500]);
    assert_eq!(ht.get_value(None, &3), vec![300]);
}

#[test]
fn test_merge_collapses_and_directory_shrinks() {
    // Build the depth-2 table from the split scenario, then drain it bucket by bucket.
    let ht = identity_table("merge_shrink", 2);
    assert!(ht.insert(None, &1, &100));
    assert!(ht.insert(None, &5, &500));
    assert!(ht.insert(None, &3, &300));
    assert_eq!(ht.get_global_depth(), 2);

    // Emptying the image bucket folds it back and the directory shrinks one level.
    assert!(ht.remove(None, &3, &300));
    ht.verify_integrity();
    assert_eq!(ht.get_global_depth(), 1);
    assert_eq!(ht.get_value(None, &1), vec![100]);
    assert_eq!(ht.get_value(None, &5), vec![500]);

    // Draining the rest collapses the table to a single bucket.
    assert!(ht.remove(None, &1, &100));
    assert!(ht.remove(None, &5, &500));
    ht.verify_integrity();
    assert_eq!(ht.get_global_depth(), 0);
    assert!(ht.get_value(None, &5).is_empty());
}

#[test]
fn test_insert_fails_at_max_directory_depth() {
    // Keys 0 and 4 collide on the low two bits; with a directory capped at depth 2 and bucket
    // capacity 2, a third colliding key cannot be placed.
    let ht = ExtendibleHashTable::new(
        "max_depth".to_string(),
        make_bpm(50),
        IntComparator::new(),
        Box::new(IdentityHasher),
        2,
        2,
    );
    assert!(ht.insert(None, &0, &1));
    assert!(ht.insert(None, &4, &2));
    assert!(!ht.insert(None, &8, &3), "0, 4 and 8 collide up to depth 2");
    ht.verify_integrity();

    // Unrelated keys still go in.
    assert!(ht.insert(None, &3, &4));
    assert_eq!(ht.get_value(None, &3), vec![4]);
}

#[test]
fn test_many_keys_with_real_hashing() {
    let bpm = make_bpm(100);
    let ht: ExtendibleHashTable<i32, i32, IntComparator> = ExtendibleHashTable::new(
        "churn".to_string(),
        bpm,
        IntComparator::new(),
        Box::new(Xxh3KeyHasher::new()),
        DIRECTORY_MAX_DEPTH,
        16,
    );

    let num_keys = 1000;
    for key in 0..num_keys {
        assert!(ht.insert(None, &key, &(key * 10)), "insert of key {} failed", key);
    }
    ht.verify_integrity();
    assert!(ht.get_global_depth() >= 1, "1000 keys across 16-slot buckets must split");

    for key in 0..num_keys {
        assert_eq!(ht.get_value(None, &key), vec![key * 10], "lookup of key {}", key);
    }

    // Remove the even keys and re-check both halves.
    for key in (0..num_keys).step_by(2) {
        assert!(ht.remove(None, &key, &(key * 10)), "remove of key {} failed", key);
    }
    ht.verify_integrity();
    for key in 0..num_keys {
        if key % 2 == 0 {
            assert!(ht.get_value(None, &key).is_empty());
        } else {
            assert_eq!(ht.get_value(None, &key), vec![key * 10]);
        }
    }

    for key in (1..num_keys).step_by(2) {
        assert!(ht.remove(None, &key, &(key * 10)));
    }
    ht.verify_integrity();
    for key in 0..num_keys {
        assert!(ht.get_value(None, &key).is_empty());
    }
}

#[test]
fn test_generic_keys_with_rid_values() {
    let bpm = make_bpm(100);
    let ht: ExtendibleHashTable<GenericKey<8>, Rid, GenericComparator<8>> = ExtendibleHashTable::new(
        "generic_keys".to_string(),
        bpm,
        GenericComparator::new(),
        Box::new(Xxh3KeyHasher::new()),
        DIRECTORY_MAX_DEPTH,
        8,
    );

    let key_of = |value: i64| {
        let mut key: GenericKey<8> = GenericKey::new();
        key.set_from_integer(value);
        key
    };
    let rid_of = |value: i32| Rid::new(value as PageId, value as u32);

    let num_keys = 200;
    for i in 0..num_keys {
        assert!(ht.insert(None, &key_of(i as i64), &rid_of(i)), "insert of key {} failed", i);
    }
    ht.verify_integrity();
    assert!(ht.get_global_depth() >= 1, "200 keys across 8-slot buckets must split");

    for i in 0..num_keys {
        assert_eq!(ht.get_value(None, &key_of(i as i64)), vec![rid_of(i)], "lookup of key {}", i);
    }
    let mut absent: GenericKey<8> = GenericKey::new();
    absent.set_from_bytes(b"missing!");
    assert!(ht.get_value(None, &absent).is_empty());

    // Remove the even keys and re-check both halves.
    for i in (0..num_keys).step_by(2) {
        assert!(ht.remove(None, &key_of(i as i64), &rid_of(i)), "remove of key {} failed", i);
    }
    ht.verify_integrity();
    for i in 0..num_keys {
        let values = ht.get_value(None, &key_of(i as i64));
        if i % 2 == 0 {
            assert!(values.is_empty());
        } else {
            assert_eq!(values, vec![rid_of(i)]);
        }
    }
}

#[test]
fn test_non_unique_keys() {
    let ht = identity_table("non_unique", 8);

    assert!(ht.insert(None, &7, &70));
    assert!(ht.insert(None, &7, &71));
    assert!(!ht.insert(None, &7, &70), "exact duplicate rejected");

    let mut values = ht.get_value(None, &7);
    values.sort();
    assert_eq!(values, vec![70, 71]);

    assert!(ht.remove(None, &7, &70));
    assert_eq!(ht.get_value(None, &7), vec![71]);
    assert!(!ht.remove(None, &7, &70), "second remove of the same pair fails");
}

#[test]
fn test_concurrent_inserts_and_lookups() {
    let bpm = make_bpm(100);
    let ht: Arc<ExtendibleHashTable<i32, i32, IntComparator>> = Arc::new(ExtendibleHashTable::new(
        "concurrent".to_string(),
        bpm,
        IntComparator::new(),
        Box::new(Xxh3KeyHasher::new()),
        DIRECTORY_MAX_DEPTH,
        16,
    ));

    let num_threads = 4;
    let keys_per_thread = 200;
    let mut handles = Vec::new();
    for thread_idx in 0..num_threads {
        let ht = Arc::clone(&ht);
        handles.push(thread::spawn(move || {
            let base = thread_idx * keys_per_thread;
            for key in base..base + keys_per_thread {
                assert!(ht.insert(None, &key, &(key * 10)));
            }
            for key in base..base + keys_per_thread {
                assert_eq!(ht.get_value(None, &key), vec![key * 10]);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    ht.verify_integrity();
    for key in 0..num_threads * keys_per_thread {
        assert_eq!(ht.get_value(None, &key), vec![key * 10]);
    }
}
