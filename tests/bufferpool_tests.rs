extern crate lstore_rs;

use lstore_rs::errors::DatabaseError;
use lstore_rs::{BufferPool, PageId};

mod common;

#[test]
fn test_set_then_get_roundtrip() {
    let dir = common::temp_dir();
    let pool = BufferPool::new(dir.path(), 4);

    let id = PageId::base(0, 0);
    pool.set("tbl", id, vec![1, 2, 3]).unwrap();
    pool.unpin("tbl", id);

    assert_eq!(pool.get("tbl", id).unwrap(), vec![1, 2, 3]);
    pool.unpin("tbl", id);
}

#[test]
fn test_get_synthesizes_empty_page_for_missing_file() {
    let dir = common::temp_dir();
    let pool = BufferPool::new(dir.path(), 4);

    let id = PageId::tail(2, 7);
    assert!(pool.get("tbl", id).unwrap().is_empty());
    pool.unpin("tbl", id);
}

#[test]
fn test_evicts_least_recently_used_unpinned_page() {
    let dir = common::temp_dir();
    let pool = BufferPool::new(dir.path(), 2);

    let first = PageId::base(0, 0);
    let second = PageId::base(0, 1);
    let third = PageId::base(0, 2);

    pool.set("tbl", first, vec![1]).unwrap();
    pool.unpin("tbl", first);
    pool.set("tbl", second, vec![2]).unwrap();
    pool.unpin("tbl", second);

    // Touch the first page so the second becomes the LRU victim.
    pool.get("tbl", first).unwrap();
    pool.unpin("tbl", first);

    pool.set("tbl", third, vec![3]).unwrap();
    pool.unpin("tbl", third);

    // The victim was dirty, so eviction wrote it back.
    let written = dir.path().join("tbl").join(second.file_name());
    assert_eq!(std::fs::read(written).unwrap(), vec![2]);

    // The survivor is still cached and was never flushed.
    assert!(!dir.path().join("tbl").join(first.file_name()).exists());
    assert_eq!(pool.get("tbl", first).unwrap(), vec![1]);
    pool.unpin("tbl", first);
}

#[test]
fn test_evicted_page_reloads_from_disk() {
    let dir = common::temp_dir();
    let pool = BufferPool::new(dir.path(), 1);

    let first = PageId::base(0, 0);
    let second = PageId::base(0, 1);

    pool.set("tbl", first, vec![9, 9]).unwrap();
    pool.unpin("tbl", first);

    // Forces the first page out.
    pool.set("tbl", second, vec![8]).unwrap();
    pool.unpin("tbl", second);

    assert_eq!(pool.get("tbl", first).unwrap(), vec![9, 9]);
    pool.unpin("tbl", first);
}

#[test]
fn test_evict_refuses_when_every_page_is_pinned() {
    let dir = common::temp_dir();
    let pool = BufferPool::new(dir.path(), 2);

    // Neither page is unpinned.
    pool.set("tbl", PageId::base(0, 0), vec![1]).unwrap();
    pool.set("tbl", PageId::base(0, 1), vec![2]).unwrap();

    assert!(matches!(pool.evict(), Err(DatabaseError::NoEvictable)));
    assert!(matches!(
        pool.get("tbl", PageId::base(0, 2)),
        Err(DatabaseError::PoolExhausted)
    ));
    assert!(matches!(
        pool.set("tbl", PageId::base(0, 2), vec![3]),
        Err(DatabaseError::PoolExhausted)
    ));
}

#[test]
fn test_unpin_floors_at_zero() {
    let dir = common::temp_dir();
    let pool = BufferPool::new(dir.path(), 2);

    let id = PageId::base(0, 0);
    pool.set("tbl", id, vec![1]).unwrap();
    pool.unpin("tbl", id);
    pool.unpin("tbl", id);
    pool.unpin("tbl", id);

    // Still evictable exactly once.
    assert!(pool.evict().is_ok());
    assert!(matches!(pool.evict(), Err(DatabaseError::NoEvictable)));
}

#[test]
fn test_reset_flushes_dirty_pages_and_clears_cache() {
    let dir = common::temp_dir();

    let id = PageId::tail(1, 3);
    {
        let pool = BufferPool::new(dir.path(), 4);
        pool.set("tbl", id, vec![5, 6, 7]).unwrap();
        pool.unpin("tbl", id);
        pool.reset().unwrap();

        let path = dir.path().join("tbl").join(id.file_name());
        assert_eq!(std::fs::read(path).unwrap(), vec![5, 6, 7]);
    }

    // A fresh pool sees the flushed bytes.
    let pool = BufferPool::new(dir.path(), 4);
    assert_eq!(pool.get("tbl", id).unwrap(), vec![5, 6, 7]);
    pool.unpin("tbl", id);
}

#[test]
fn test_discard_table_drops_cached_pages_without_flushing() {
    let dir = common::temp_dir();
    let pool = BufferPool::new(dir.path(), 4);

    let id = PageId::base(0, 0);
    pool.set("dropped", id, vec![1]).unwrap();
    pool.unpin("dropped", id);
    pool.set("kept", id, vec![2]).unwrap();
    pool.unpin("kept", id);

    pool.discard_table("dropped");
    pool.reset().unwrap();

    assert!(!dir.path().join("dropped").join(id.file_name()).exists());
    assert!(dir.path().join("kept").join(id.file_name()).exists());
}
