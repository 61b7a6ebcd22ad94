use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use log::{debug, warn};

use crate::bufferpool::{BufferPool, PageId};
use crate::constants::MERGE_THRESHOLD;
use crate::errors::{DatabaseError, Result};
use crate::helpers;
use crate::index::Index;
use crate::locks::LockManager;
use crate::pages::{Base, LogicalPage, PageRange, Tail};
use crate::persistables::{PageDirectoryPersistable, TableMetadata};
use crate::record::{Indirection, Record, RecordKind, Rid};

/// Mutable table state. Every multi-step write path (insert, update,
/// delete, merge) runs with this behind the table mutex, so index, page
/// directory, and page mutations become visible together.
#[derive(Debug)]
struct TableInner {
    /// Page ranges, expanded dynamically as base capacity fills.
    page_ranges: Vec<PageRange>,

    /// Maps RIDs to the record materialized at them. Base entries are kept
    /// refreshed to the current image; tail entries carry their post-image.
    page_directory: HashMap<Rid, Record>,

    /// Per-column indexes over base RIDs and current values.
    index: Index,

    /// Updates committed since the last merge signal.
    num_updates: usize,
}

/// Represents a merge request. Sent through the merge sender channel when
/// the table's update counter crosses the merge threshold.
struct MergeRequest;

/// One table: page ranges, page directory, per-column indexes, and the
/// background merge machinery. Reads and writes go through the shared
/// buffer pool; all state transitions are serialized by the table mutex.
#[derive(Debug)]
pub struct Table {
    name: String,
    num_columns: usize,
    key_column: usize,

    /// Buffer pool shared by all tables in the database.
    pool: Arc<BufferPool>,

    /// Lock manager shared by all tables, consulted by transactions.
    lock_manager: Arc<LockManager>,

    inner: Arc<Mutex<TableInner>>,

    /// Channel to the merge thread. Dropped on shutdown, which ends the
    /// thread.
    merge_sender: Mutex<Option<Sender<MergeRequest>>>,
}

impl Table {
    /// Create a fresh table. Constructed through `Database::create_table`.
    pub(crate) fn new(
        name: String,
        num_columns: usize,
        key_column: usize,
        pool: Arc<BufferPool>,
        lock_manager: Arc<LockManager>,
    ) -> Arc<Table> {
        let inner = Arc::new(Mutex::new(TableInner {
            page_ranges: vec![PageRange::new()],
            page_directory: HashMap::new(),
            index: Index::new(num_columns, key_column),
            num_updates: 0,
        }));

        let sender = start_merge_thread(name.clone(), num_columns, pool.clone(), inner.clone());

        Arc::new(Table {
            name,
            num_columns,
            key_column,
            pool,
            lock_manager,
            inner,
            merge_sender: Mutex::new(Some(sender)),
        })
    }

    /// Rehydrate a table from its persisted metadata and page directory,
    /// rebuilding every per-column index from the directory's base entries.
    pub(crate) fn load(
        root: &Path,
        name: &str,
        pool: Arc<BufferPool>,
        lock_manager: Arc<LockManager>,
    ) -> Result<Arc<Table>> {
        let dir = root.join(name);

        let metadata_string = fs::read_to_string(dir.join("tb_metadata.msg"))?;
        let metadata: TableMetadata = serde_json::from_str(&metadata_string)
            .map_err(|err| DatabaseError::Corruption(format!("tb_metadata.msg: {}", err)))?;

        let directory_bytes = fs::read(dir.join("pg_directory.msg"))?;
        let persisted: PageDirectoryPersistable = bincode::deserialize(&directory_bytes)
            .map_err(|err| DatabaseError::Corruption(format!("pg_directory.msg: {}", err)))?;

        let mut page_directory = HashMap::new();
        let mut index = Index::new(metadata.num_columns, metadata.key_column);

        for (rid, record) in persisted.rids.iter().zip(persisted.records.iter()) {
            if rid.is_base() {
                let values: Vec<i64> = record.columns.iter().map(|v| v.unwrap_or(0)).collect();
                index.insert(&values, *rid);
            }

            page_directory.insert(*rid, record.clone());
        }

        let inner = Arc::new(Mutex::new(TableInner {
            page_ranges: metadata
                .page_ranges
                .iter()
                .map(PageRange::from_persistable)
                .collect(),
            page_directory,
            index,
            num_updates: metadata.num_updates,
        }));

        let sender = start_merge_thread(
            metadata.name.clone(),
            metadata.num_columns,
            pool.clone(),
            inner.clone(),
        );

        Ok(Arc::new(Table {
            name: metadata.name,
            num_columns: metadata.num_columns,
            key_column: metadata.key_column,
            pool,
            lock_manager,
            inner,
            merge_sender: Mutex::new(Some(sender)),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn key_column(&self) -> usize {
        self.key_column
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Number of entries in the page directory.
    pub fn directory_len(&self) -> usize {
        self.inner.lock().unwrap().page_directory.len()
    }

    /// Base RID currently carrying `key` in the key column.
    pub fn locate(&self, key: i64) -> Option<Rid> {
        let inner = self.inner.lock().unwrap();
        inner.index.locate(self.key_column, key).first().copied()
    }

    /// Base RIDs whose key lies in `[start, end]`, endpoints inclusive.
    pub fn locate_range(&self, start: i64, end: i64) -> Vec<Rid> {
        let inner = self.inner.lock().unwrap();
        inner.index.locate_range(start, end, self.key_column)
    }

    /// Base RIDs whose `column` value equals `value`.
    pub fn locate_by(&self, column: usize, value: i64) -> Vec<Rid> {
        let inner = self.inner.lock().unwrap();
        inner.index.locate(column, value)
    }

    /// Enable the index on `column`.
    pub fn create_index(&self, column: usize) -> bool {
        self.inner.lock().unwrap().index.create_index(column)
    }

    /// Disable the index on `column`. The key column's index cannot be
    /// dropped.
    pub fn drop_index(&self, column: usize) -> bool {
        self.inner.lock().unwrap().index.drop_index(column)
    }

    /// Create a new **base record**.
    pub fn insert(&self, columns: &[i64]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        self.do_insert(&mut inner, columns)
    }

    /// Update an existing record by appending a **tail record** carrying
    /// the full post-image (cumulative update scheme).
    pub fn update(&self, key: i64, columns: &[Option<i64>]) -> Result<()> {
        let signal = {
            let mut inner = self.inner.lock().unwrap();
            self.do_update(&mut inner, key, columns)?
        };

        if signal {
            self.signal_merge();
        }

        Ok(())
    }

    /// Delete the record carrying `key`: tombstone the base slot and purge
    /// the page directory and every index.
    pub fn delete(&self, key: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        self.do_delete(&mut inner, key)
    }

    /// Select the most recent version of every record whose `search_column`
    /// value equals `search_key`. Results carry full column arity with
    /// `None` in unprojected positions.
    pub fn select(
        &self,
        search_key: i64,
        search_column: usize,
        projection: &[usize],
    ) -> Result<Vec<Record>> {
        self.select_version(search_key, search_column, projection, 0)
    }

    /// Select a relative version: `0` is the current version, `-1` the base
    /// image, and `v <= -2` walks `|v|` steps backward from the newest
    /// tail, clamping at the base.
    pub fn select_version(
        &self,
        search_key: i64,
        search_column: usize,
        projection: &[usize],
        relative_version: i64,
    ) -> Result<Vec<Record>> {
        let inner = self.inner.lock().unwrap();

        let rids = inner.index.locate(search_column, search_key);
        let mut results = Vec::with_capacity(rids.len());

        for base_rid in rids {
            let target = match self.resolve_version(&inner, base_rid, relative_version)? {
                Some(rid) => rid,
                None => continue,
            };

            // The record's key is its primary key, not the searched value.
            let key = inner
                .page_directory
                .get(&base_rid)
                .map(|record| record.key)
                .unwrap_or(search_key);

            let columns = self.read_slot(target, projection)?;
            results.push(Record::new(base_rid, key, columns));
        }

        Ok(results)
    }

    /// Sum `column` over the current version of every record whose key lies
    /// in `[start, end]`, de-duplicated by key value. `None` when the range
    /// holds no records.
    pub fn sum(&self, start: i64, end: i64, column: usize) -> Result<Option<i64>> {
        if column >= self.num_columns {
            return Err(DatabaseError::OffsetOutOfBounds);
        }

        let inner = self.inner.lock().unwrap();
        let rids = inner.index.locate_range(start, end, self.key_column);

        let mut seen_keys = HashSet::new();
        let mut total = 0;
        let mut found = false;

        for rid in rids {
            let record = match inner.page_directory.get(&rid) {
                Some(record) => record,
                None => continue,
            };

            if !seen_keys.insert(record.key) {
                continue;
            }

            total += record.columns.get(column).copied().flatten().unwrap_or(0);
            found = true;
        }

        Ok(if found { Some(total) } else { None })
    }

    /// Sum `column` at a relative version over `[start, end]`. An empty
    /// range sums to zero.
    pub fn sum_version(
        &self,
        start: i64,
        end: i64,
        column: usize,
        relative_version: i64,
    ) -> Result<i64> {
        if column >= self.num_columns {
            return Err(DatabaseError::OffsetOutOfBounds);
        }

        let inner = self.inner.lock().unwrap();
        let rids = inner.index.locate_range(start, end, self.key_column);

        let mut projection = vec![0; self.num_columns];
        projection[column] = 1;

        let mut seen_keys = HashSet::new();
        let mut total = 0;

        for base_rid in rids {
            let key = match inner.page_directory.get(&base_rid) {
                Some(record) => record.key,
                None => continue,
            };

            if !seen_keys.insert(key) {
                continue;
            }

            let target = match self.resolve_version(&inner, base_rid, relative_version)? {
                Some(rid) => rid,
                None => continue,
            };

            let columns = self.read_slot(target, &projection)?;
            total += columns.get(column).copied().flatten().unwrap_or(0);
        }

        Ok(total)
    }

    /// Run a merge pass synchronously. The background thread runs the same
    /// routine; this entry point exists for deterministic consolidation.
    pub fn merge(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        run_merge(&self.name, self.num_columns, &self.pool, &mut inner)
    }

    /// Persist table metadata and the page directory under `root`.
    pub(crate) fn persist(&self, root: &Path) -> Result<()> {
        let inner = self.inner.lock().unwrap();

        let dir = root.join(&self.name);
        fs::create_dir_all(&dir)?;

        let num_pages = inner
            .page_ranges
            .iter()
            .map(|range| range.num_base_pages() + range.num_tail_pages())
            .sum();

        let metadata = TableMetadata {
            name: self.name.clone(),
            num_columns: self.num_columns,
            key_column: self.key_column,
            num_pages,
            page_ranges: inner
                .page_ranges
                .iter()
                .map(PageRange::to_persistable)
                .collect(),
            num_updates: inner.num_updates,
        };

        let metadata_string = serde_json::to_string(&metadata)
            .map_err(|err| DatabaseError::Corruption(format!("tb_metadata.msg: {}", err)))?;
        fs::write(dir.join("tb_metadata.msg"), metadata_string)?;

        let mut rids = Vec::with_capacity(inner.page_directory.len());
        let mut records = Vec::with_capacity(inner.page_directory.len());
        for (rid, record) in &inner.page_directory {
            rids.push(*rid);
            records.push(record.clone());
        }

        let directory_bytes = bincode::serialize(&PageDirectoryPersistable { rids, records })
            .map_err(|err| DatabaseError::Corruption(format!("pg_directory.msg: {}", err)))?;
        fs::write(dir.join("pg_directory.msg"), directory_bytes)?;

        Ok(())
    }

    /// Stop the merge thread. Called when the database closes or the table
    /// is dropped.
    pub(crate) fn shutdown_merge(&self) {
        *self.merge_sender.lock().unwrap() = None;
    }

    fn signal_merge(&self) {
        let sender = self.merge_sender.lock().unwrap();

        match sender.as_ref() {
            Some(sender) => {
                if sender.send(MergeRequest).is_err() {
                    debug!("merge thread for table {:?} is gone", self.name);
                }
            }
            None => debug!("merge requested after shutdown of table {:?}", self.name),
        }
    }

    fn do_insert(&self, inner: &mut TableInner, columns: &[i64]) -> Result<()> {
        if columns.len() != self.num_columns {
            return Err(DatabaseError::ColumnCountMismatch {
                expected: self.num_columns,
                actual: columns.len(),
            });
        }

        let key = columns[self.key_column];
        if !inner.index.locate(self.key_column, key).is_empty() {
            return Err(DatabaseError::DuplicateKey(key));
        }

        // A new range only when the last one has exhausted its base pages.
        if !inner
            .page_ranges
            .last()
            .expect("at least one page range")
            .has_capacity()
        {
            inner.page_ranges.push(PageRange::new());
        }

        let range_idx = inner.page_ranges.len() - 1;
        let range = &mut inner.page_ranges[range_idx];

        let (page_idx, slot) = match range.next_base_slot() {
            Some(position) => position,
            None => (range.add_base_page()?, 0),
        };

        let rid = Rid::base(range_idx, page_idx, slot);

        let mut page = fetch_base(&self.pool, &self.name, self.num_columns, range_idx, page_idx)?;
        page.insert_base(rid, helpers::now_seconds(), columns)?;
        store_base(&self.pool, &self.name, range_idx, page_idx, &page)?;

        range.record_base_append(page_idx);

        inner.page_directory.insert(
            rid,
            Record::new(rid, key, columns.iter().map(|v| Some(*v)).collect()),
        );
        inner.index.insert(columns, rid);

        Ok(())
    }

    /// Returns whether the caller should signal the merge thread.
    fn do_update(
        &self,
        inner: &mut TableInner,
        key: i64,
        columns: &[Option<i64>],
    ) -> Result<bool> {
        if columns.len() != self.num_columns {
            return Err(DatabaseError::ColumnCountMismatch {
                expected: self.num_columns,
                actual: columns.len(),
            });
        }

        let base_rid = inner
            .index
            .locate(self.key_column, key)
            .first()
            .copied()
            .ok_or(DatabaseError::NoSuchKey(key))?;

        let range_idx = base_rid.range as usize;
        let base_slot = base_rid.slot as usize;

        let mut base_page = fetch_base(
            &self.pool,
            &self.name,
            self.num_columns,
            range_idx,
            base_rid.page as usize,
        )?;

        let newest = base_page
            .indirection(base_slot)?
            .live()
            .ok_or(DatabaseError::NoSuchKey(key))?;

        // Rewriting the key column to a taken value is refused.
        if let Some(new_key) = columns[self.key_column] {
            if new_key != key && !inner.index.locate(self.key_column, new_key).is_empty() {
                return Err(DatabaseError::DuplicateKey(new_key));
            }
        }

        let all_columns = vec![1; self.num_columns];
        let current = if newest == base_rid {
            base_page.read(base_slot, &all_columns)?
        } else {
            self.read_slot(newest, &all_columns)?
        };

        let schema_bits = helpers::schema_bitmask(columns);
        let post_image = helpers::cumulative_image(&current, columns);
        let post_values: Vec<i64> = post_image.iter().map(|v| v.unwrap_or(0)).collect();

        // Allocate the tail slot, adding a tail page if the last is full.
        let range = &mut inner.page_ranges[range_idx];
        let (tail_page_idx, _) = match range.next_tail_slot() {
            Some(position) => position,
            None => (range.add_tail_page(), 0),
        };
        let seq = range.take_tail_seq();

        let mut tail_page = fetch_tail(
            &self.pool,
            &self.name,
            self.num_columns,
            range_idx,
            tail_page_idx,
        )?;

        let tail_slot = tail_page.num_records();
        let tail_rid = Rid::tail(range_idx, tail_page_idx, tail_slot);

        tail_page.insert_tail(
            tail_rid,
            helpers::now_seconds(),
            schema_bits,
            Indirection::Live(newest),
            &post_values,
            seq,
        )?;
        store_tail(&self.pool, &self.name, range_idx, tail_page_idx, &tail_page)?;
        range.record_tail_append(tail_page_idx);

        // Swing the base slot to the new newest version.
        base_page.set_indirection(base_slot, Indirection::Live(tail_rid))?;
        base_page.or_schema(base_slot, schema_bits)?;
        store_base(
            &self.pool,
            &self.name,
            range_idx,
            base_rid.page as usize,
            &base_page,
        )?;

        // Index maintenance for every column the caller supplied.
        for (column, update) in columns.iter().enumerate() {
            if let Some(update) = update {
                let original = current[column].unwrap_or(0);
                inner.index.update_one(original, *update, column, base_rid);
            }
        }

        let new_key = post_values[self.key_column];
        let materialized: Vec<Option<i64>> = post_values.iter().map(|v| Some(*v)).collect();

        inner
            .page_directory
            .insert(tail_rid, Record::new(tail_rid, new_key, materialized.clone()));
        inner
            .page_directory
            .insert(base_rid, Record::new(base_rid, new_key, materialized));

        inner.num_updates += 1;
        if inner.num_updates >= MERGE_THRESHOLD {
            inner.num_updates = 0;
            return Ok(true);
        }

        Ok(false)
    }

    fn do_delete(&self, inner: &mut TableInner, key: i64) -> Result<()> {
        let base_rid = inner
            .index
            .locate(self.key_column, key)
            .first()
            .copied()
            .ok_or(DatabaseError::NoSuchKey(key))?;

        let range_idx = base_rid.range as usize;
        let base_slot = base_rid.slot as usize;

        let mut base_page = fetch_base(
            &self.pool,
            &self.name,
            self.num_columns,
            range_idx,
            base_rid.page as usize,
        )?;

        let newest = base_page
            .indirection(base_slot)?
            .live()
            .ok_or(DatabaseError::NoSuchKey(key))?;

        // Collect the tail chain before tombstoning so the page directory
        // can be purged of every version.
        let mut chain = Vec::new();
        let mut cursor = newest;
        while cursor != base_rid {
            chain.push(cursor);
            cursor = match self.indirection_of(cursor)? {
                Indirection::Live(prev) => prev,
                Indirection::Tombstone => break,
            };
        }

        base_page.set_indirection(base_slot, Indirection::Tombstone)?;
        store_base(
            &self.pool,
            &self.name,
            range_idx,
            base_rid.page as usize,
            &base_page,
        )?;

        let current = inner
            .page_directory
            .get(&base_rid)
            .map(|record| record.columns.clone())
            .unwrap_or_default();
        inner.index.remove(&current, base_rid);

        inner.page_directory.remove(&base_rid);
        for rid in chain {
            inner.page_directory.remove(&rid);
        }

        Ok(())
    }

    /// Resolve a relative version to the RID whose image should be read.
    /// `None` when the base slot is tombstoned.
    fn resolve_version(
        &self,
        _inner: &TableInner,
        base_rid: Rid,
        relative_version: i64,
    ) -> Result<Option<Rid>> {
        let base_page = fetch_base(
            &self.pool,
            &self.name,
            self.num_columns,
            base_rid.range as usize,
            base_rid.page as usize,
        )?;

        let newest = match base_page.indirection(base_rid.slot as usize)?.live() {
            Some(rid) => rid,
            None => return Ok(None),
        };

        if relative_version == 0 {
            return Ok(Some(newest));
        }

        if relative_version == -1 {
            return Ok(Some(base_rid));
        }

        // v <= -2: |v| steps backward from the newest version, stopping at
        // the base.
        let mut cursor = newest;
        for _ in 0..relative_version.unsigned_abs() {
            if cursor == base_rid {
                break;
            }

            cursor = match self.indirection_of(cursor)? {
                Indirection::Live(prev) => prev,
                Indirection::Tombstone => break,
            };
        }

        Ok(Some(cursor))
    }

    /// Read the projected user columns of the record at `rid`.
    fn read_slot(&self, rid: Rid, projection: &[usize]) -> Result<Vec<Option<i64>>> {
        let range = rid.range as usize;
        let page = rid.page as usize;
        let slot = rid.slot as usize;

        match rid.kind {
            RecordKind::Base => fetch_base(&self.pool, &self.name, self.num_columns, range, page)?
                .read(slot, projection),
            RecordKind::Tail => fetch_tail(&self.pool, &self.name, self.num_columns, range, page)?
                .read(slot, projection),
        }
    }

    /// The indirection cell of the record at `rid`.
    fn indirection_of(&self, rid: Rid) -> Result<Indirection> {
        let range = rid.range as usize;
        let page = rid.page as usize;
        let slot = rid.slot as usize;

        match rid.kind {
            RecordKind::Base => fetch_base(&self.pool, &self.name, self.num_columns, range, page)?
                .indirection(slot),
            RecordKind::Tail => fetch_tail(&self.pool, &self.name, self.num_columns, range, page)?
                .indirection(slot),
        }
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        self.shutdown_merge();
    }
}

/// Materialize a base page from the buffer pool.
fn fetch_base(
    pool: &BufferPool,
    table: &str,
    num_columns: usize,
    range: usize,
    page: usize,
) -> Result<LogicalPage<Base>> {
    let id = PageId::base(range, page);
    let bytes = pool.get(table, id)?;
    let result = LogicalPage::from_bytes(&bytes, num_columns);
    pool.unpin(table, id);
    result
}

/// Materialize a tail page from the buffer pool.
fn fetch_tail(
    pool: &BufferPool,
    table: &str,
    num_columns: usize,
    range: usize,
    page: usize,
) -> Result<LogicalPage<Tail>> {
    let id = PageId::tail(range, page);
    let bytes = pool.get(table, id)?;
    let result = LogicalPage::from_bytes(&bytes, num_columns);
    pool.unpin(table, id);
    result
}

/// Write a base page back through the buffer pool.
fn store_base(
    pool: &BufferPool,
    table: &str,
    range: usize,
    page: usize,
    logical: &LogicalPage<Base>,
) -> Result<()> {
    let id = PageId::base(range, page);
    pool.set(table, id, logical.to_bytes()?)?;
    pool.unpin(table, id);
    Ok(())
}

/// Write a tail page back through the buffer pool.
fn store_tail(
    pool: &BufferPool,
    table: &str,
    range: usize,
    page: usize,
    logical: &LogicalPage<Tail>,
) -> Result<()> {
    let id = PageId::tail(range, page);
    pool.set(table, id, logical.to_bytes()?)?;
    pool.unpin(table, id);
    Ok(())
}

/// One merge pass over every page range: for each base slot with pending
/// schema bits, walk its indirection chain newest to base and fold each
/// column's newest value into the base image. Consolidated pages record the
/// highest tail sequence consulted as their tps watermark. Runs with the
/// table mutex held, so it never observes a half-applied update.
fn run_merge(
    name: &str,
    num_columns: usize,
    pool: &BufferPool,
    inner: &mut TableInner,
) -> Result<()> {
    let all_columns = vec![1; num_columns];

    for range_idx in 0..inner.page_ranges.len() {
        let mut range_tps = inner.page_ranges[range_idx].tps();
        let mut tail_cache: HashMap<PageId, LogicalPage<Tail>> = HashMap::new();

        for page_idx in 0..inner.page_ranges[range_idx].num_base_pages() {
            let mut merged = fetch_base(pool, name, num_columns, range_idx, page_idx)?;
            let mut page_tps = merged.tps();
            let mut changed = false;

            for slot in 0..merged.num_records() {
                if merged.schema_encoding(slot)? == 0 {
                    continue;
                }

                let base_rid = merged.rid(slot)?;
                let newest = match merged.indirection(slot)? {
                    Indirection::Live(rid) => rid,
                    Indirection::Tombstone => continue,
                };

                if newest == base_rid {
                    continue;
                }

                let mut seen = vec![false; num_columns];
                let mut remaining = num_columns;
                let mut cursor = newest;

                while remaining > 0 && cursor != base_rid {
                    let page_id = PageId::of(cursor);

                    if !tail_cache.contains_key(&page_id) {
                        let tail =
                            fetch_tail(pool, name, num_columns, page_id.range, page_id.page)?;
                        tail_cache.insert(page_id, tail);
                    }

                    let tail_page = &tail_cache[&page_id];
                    let tail_slot = cursor.slot as usize;
                    let values = tail_page.read(tail_slot, &all_columns)?;
                    page_tps = page_tps.max(tail_page.tps());

                    // Newest value wins: each column is folded in on first
                    // sighting only.
                    for column in 0..num_columns {
                        if seen[column] {
                            continue;
                        }

                        if let Some(value) = values[column] {
                            merged.overwrite_column(slot, column, value)?;
                        }

                        seen[column] = true;
                        remaining -= 1;
                    }

                    changed = true;
                    cursor = match tail_page.indirection(tail_slot)? {
                        Indirection::Live(prev) => prev,
                        Indirection::Tombstone => break,
                    };
                }
            }

            if changed {
                merged.set_tps(page_tps);
                store_base(pool, name, range_idx, page_idx, &merged)?;
                range_tps = range_tps.max(page_tps);
            }
        }

        inner.page_ranges[range_idx].set_tps(range_tps);
    }

    debug!("merge pass complete for table {:?}", name);
    Ok(())
}

/// Initializes the internal merge thread. A single consumer serializes
/// merge passes, so at most one merge per table runs at a time; queued
/// signals are coalesced into one pass.
fn start_merge_thread(
    name: String,
    num_columns: usize,
    pool: Arc<BufferPool>,
    inner: Arc<Mutex<TableInner>>,
) -> Sender<MergeRequest> {
    let (sender, receiver) = mpsc::channel::<MergeRequest>();

    thread::spawn(move || {
        while receiver.recv().is_ok() {
            while receiver.try_recv().is_ok() {}

            let mut inner = inner.lock().unwrap();
            if let Err(err) = run_merge(&name, num_columns, &pool, &mut inner) {
                warn!("merge failed for table {:?}: {}", name, err);
            }
        }
    });

    sender
}
