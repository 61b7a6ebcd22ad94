use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;

use crate::errors::{DatabaseError, Result};
use crate::record::{RecordKind, Rid};

/// Identifies one logical page of one table: base/tail kind, page range
/// index, and page index within the range. Together with the table name
/// this keys the buffer pool and names the page's file on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageId {
    pub kind: RecordKind,
    pub range: usize,
    pub page: usize,
}

impl PageId {
    pub fn base(range: usize, page: usize) -> Self {
        PageId {
            kind: RecordKind::Base,
            range,
            page,
        }
    }

    pub fn tail(range: usize, page: usize) -> Self {
        PageId {
            kind: RecordKind::Tail,
            range,
            page,
        }
    }

    /// The page an RID points into.
    pub fn of(rid: Rid) -> Self {
        PageId {
            kind: rid.kind,
            range: rid.range as usize,
            page: rid.page as usize,
        }
    }

    /// File name under the table's directory, e.g. `base_0_3.msg`.
    pub fn file_name(&self) -> String {
        let prefix = match self.kind {
            RecordKind::Base => "base",
            RecordKind::Tail => "tail",
        };

        format!("{}_{}_{}.msg", prefix, self.range, self.page)
    }
}

/// One cached page.
#[derive(Debug)]
struct Frame {
    bytes: Vec<u8>,
    dirty: bool,
    pin_count: usize,
    last_access: u64,
    path: PathBuf,
}

#[derive(Debug)]
struct PoolInner {
    frames: HashMap<(String, PageId), Frame>,

    /// Monotonic access counter backing the LRU policy.
    counter: u64,
}

/// Fixed-capacity cache of serialized pages, shared by every table in a
/// database. Strict LRU among unpinned pages; dirty pages are written back
/// on eviction and on `reset`. All state transitions happen under one
/// mutex, so a page can never be observed half-evicted or half-written.
#[derive(Debug)]
pub struct BufferPool {
    /// Database directory the page files live under.
    root: PathBuf,

    /// Maximum number of cached pages.
    capacity: usize,

    inner: Mutex<PoolInner>,
}

impl BufferPool {
    /// Create a pool rooted at the database directory.
    pub fn new<P: AsRef<Path>>(root: P, capacity: usize) -> Self {
        BufferPool {
            root: root.as_ref().to_path_buf(),
            capacity,
            inner: Mutex::new(PoolInner {
                frames: HashMap::new(),
                counter: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn page_path(&self, table: &str, id: PageId) -> PathBuf {
        self.root.join(table).join(id.file_name())
    }

    /// Fetch a page's bytes, pinning it. Misses are loaded from disk; a
    /// page with no file yet is synthesized empty. Fails with
    /// `PoolExhausted` when the pool is full and every page is pinned.
    pub fn get(&self, table: &str, id: PageId) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        inner.counter += 1;
        let stamp = inner.counter;

        let key = (table.to_string(), id);

        if let Some(frame) = inner.frames.get_mut(&key) {
            frame.pin_count += 1;
            frame.last_access = stamp;
            return Ok(frame.bytes.clone());
        }

        if inner.frames.len() >= self.capacity {
            Self::evict_one(&mut inner).map_err(|err| match err {
                DatabaseError::NoEvictable => DatabaseError::PoolExhausted,
                other => other,
            })?;
        }

        let path = self.page_path(table, id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("synthesizing empty page for {:?}", path);
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };

        inner.frames.insert(
            key,
            Frame {
                bytes: bytes.clone(),
                dirty: false,
                pin_count: 1,
                last_access: stamp,
                path,
            },
        );

        Ok(bytes)
    }

    /// Insert or replace a page's bytes, marking it dirty and pinning it.
    pub fn set(&self, table: &str, id: PageId, bytes: Vec<u8>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.counter += 1;
        let stamp = inner.counter;

        let key = (table.to_string(), id);

        if let Some(frame) = inner.frames.get_mut(&key) {
            frame.bytes = bytes;
            frame.dirty = true;
            frame.pin_count += 1;
            frame.last_access = stamp;
            return Ok(());
        }

        if inner.frames.len() >= self.capacity {
            Self::evict_one(&mut inner).map_err(|err| match err {
                DatabaseError::NoEvictable => DatabaseError::PoolExhausted,
                other => other,
            })?;
        }

        let path = self.page_path(table, id);
        inner.frames.insert(
            key,
            Frame {
                bytes,
                dirty: true,
                pin_count: 1,
                last_access: stamp,
                path,
            },
        );

        Ok(())
    }

    /// Decrement a page's pin count, floored at zero.
    pub fn unpin(&self, table: &str, id: PageId) {
        let mut inner = self.inner.lock().unwrap();
        let key = (table.to_string(), id);

        if let Some(frame) = inner.frames.get_mut(&key) {
            frame.pin_count = frame.pin_count.saturating_sub(1);
        }
    }

    /// Evict the least-recently-used unpinned page, writing it back first
    /// if dirty. Fails with `NoEvictable` when every cached page is pinned.
    pub fn evict(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::evict_one(&mut inner)
    }

    fn evict_one(inner: &mut PoolInner) -> Result<()> {
        let victim = inner
            .frames
            .iter()
            .filter(|(_, frame)| frame.pin_count == 0)
            .min_by_key(|(_, frame)| frame.last_access)
            .map(|(key, _)| key.clone());

        let key = victim.ok_or(DatabaseError::NoEvictable)?;

        // Write back before dropping the frame so a failed write leaves the
        // page cached and dirty.
        let frame = inner.frames.get(&key).expect("victim frame present");
        if frame.dirty {
            Self::write_back(frame)?;
        }

        inner.frames.remove(&key);
        debug!("evicted page {:?} of table {:?}", key.1, key.0);
        Ok(())
    }

    fn write_back(frame: &Frame) -> Result<()> {
        if let Some(parent) = frame.path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&frame.path, &frame.bytes)?;
        Ok(())
    }

    /// Flush every dirty page to disk and clear the cache.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        for frame in inner.frames.values() {
            if frame.dirty {
                Self::write_back(frame)?;
            }
        }

        inner.frames.clear();
        Ok(())
    }

    /// Drop every cached page of one table without writing anything back.
    /// Used when the table itself is being dropped.
    pub fn discard_table(&self, table: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.frames.retain(|key, _| key.0 != table);
    }
}
