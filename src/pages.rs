use std::marker::PhantomData;

use crate::constants::{MAX_BASE_PAGES, RECORDS_PER_PAGE};
use crate::errors::{DatabaseError, Result};
use crate::page::Page;
use crate::persistables::{PagePersistable, PageRangePersistable};
use crate::record::{Indirection, Rid};

/// Zero sized struct representing **base** pages.
#[derive(Clone, Copy, Debug)]
pub struct Base;

/// Zero sized struct representing **tail** pages.
#[derive(Clone, Copy, Debug)]
pub struct Tail;

/// Represents a **logical** base or tail page, depending on the provided
/// generic type argument: one physical `Page` per table column plus the
/// per-slot metadata arrays (rid, indirection, schema encoding, timestamp).
/// Logical pages are append-only and hold at most `RECORDS_PER_PAGE` slots.
#[derive(Clone, Debug)]
pub struct LogicalPage<T> {
    /// One physical page per user column.
    columns: Vec<Page>,

    /// Per-slot record identifiers.
    rid: Vec<Rid>,

    /// Per-slot indirection cells.
    indirection: Vec<Indirection>,

    /// Per-slot schema-encoding bitmasks.
    schema_encoding: Vec<i64>,

    /// Per-slot timestamps.
    timestamp: Vec<i64>,

    /// Tail-page-sequence watermark (see `PagePersistable::tps`).
    tps: u64,

    /// Phantom field for the generic type argument (none of the other
    /// fields actually use `T`).
    phantom: PhantomData<T>,
}

/// Methods for all logical pages.
impl<T> LogicalPage<T> {
    /// Create a new logical page with `num_columns` columns.
    pub fn new(num_columns: usize) -> LogicalPage<T> {
        LogicalPage {
            columns: (0..num_columns).map(|_| Page::new()).collect(),
            rid: Vec::new(),
            indirection: Vec::new(),
            schema_encoding: Vec::new(),
            timestamp: Vec::new(),
            tps: 0,
            phantom: PhantomData::<T>,
        }
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_records(&self) -> usize {
        self.rid.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.columns.iter().all(|page| page.has_capacity())
    }

    pub fn tps(&self) -> u64 {
        self.tps
    }

    /// Read the user columns of one slot. The result always has full column
    /// arity; positions whose projection bit is `0` hold `None`.
    pub fn read(&self, slot: usize, projection: &[usize]) -> Result<Vec<Option<i64>>> {
        if slot >= self.num_records() {
            return Err(DatabaseError::OffsetOutOfBounds);
        }

        let mut result = Vec::with_capacity(self.columns.len());

        for (column, page) in self.columns.iter().enumerate() {
            if projection.get(column).copied().unwrap_or(0) == 0 {
                result.push(None);
                continue;
            }

            result.push(Some(page.read_one(slot)?));
        }

        Ok(result)
    }

    pub fn rid(&self, slot: usize) -> Result<Rid> {
        self.rid
            .get(slot)
            .copied()
            .ok_or(DatabaseError::OffsetOutOfBounds)
    }

    pub fn indirection(&self, slot: usize) -> Result<Indirection> {
        self.indirection
            .get(slot)
            .copied()
            .ok_or(DatabaseError::OffsetOutOfBounds)
    }

    pub fn schema_encoding(&self, slot: usize) -> Result<i64> {
        self.schema_encoding
            .get(slot)
            .copied()
            .ok_or(DatabaseError::OffsetOutOfBounds)
    }

    pub fn timestamp(&self, slot: usize) -> Result<i64> {
        self.timestamp
            .get(slot)
            .copied()
            .ok_or(DatabaseError::OffsetOutOfBounds)
    }

    /// Append one record: every user column plus the metadata arrays.
    fn append(
        &mut self,
        rid: Rid,
        timestamp: i64,
        schema: i64,
        indirection: Indirection,
        columns: &[i64],
    ) -> Result<usize> {
        if columns.len() != self.columns.len() {
            return Err(DatabaseError::ColumnCountMismatch {
                expected: self.columns.len(),
                actual: columns.len(),
            });
        }

        if !self.has_capacity() {
            return Err(DatabaseError::CapacityExceeded);
        }

        let mut slot = 0;
        for (page, value) in self.columns.iter_mut().zip(columns.iter()) {
            slot = page.write(*value)?;
        }

        self.rid.push(rid);
        self.indirection.push(indirection);
        self.schema_encoding.push(schema);
        self.timestamp.push(timestamp);

        Ok(slot)
    }

    /// Serialize for the buffer pool / disk.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let persistable = PagePersistable {
            columns: self.columns.iter().map(|page| page.values()).collect(),
            rid: self.rid.clone(),
            indirection: self.indirection.clone(),
            schema_encoding: self.schema_encoding.clone(),
            timestamp: self.timestamp.clone(),
            tps: self.tps,
        };

        bincode::serialize(&persistable)
            .map_err(|err| DatabaseError::Corruption(format!("page encode: {}", err)))
    }

    /// Rebuild from buffer pool bytes. Empty bytes (a page the pool
    /// synthesized because no file exists yet) become a fresh page.
    pub fn from_bytes(bytes: &[u8], num_columns: usize) -> Result<LogicalPage<T>> {
        if bytes.is_empty() {
            return Ok(LogicalPage::new(num_columns));
        }

        let persistable: PagePersistable = bincode::deserialize(bytes)
            .map_err(|err| DatabaseError::Corruption(format!("page decode: {}", err)))?;

        if persistable.columns.len() != num_columns {
            return Err(DatabaseError::Corruption(format!(
                "page has {} columns, table has {}",
                persistable.columns.len(),
                num_columns
            )));
        }

        let mut columns = Vec::with_capacity(num_columns);
        for values in &persistable.columns {
            columns.push(Page::from_values(values)?);
        }

        Ok(LogicalPage {
            columns,
            rid: persistable.rid,
            indirection: persistable.indirection,
            schema_encoding: persistable.schema_encoding,
            timestamp: persistable.timestamp,
            tps: persistable.tps,
            phantom: PhantomData::<T>,
        })
    }
}

/// Methods for logical **base** pages.
impl LogicalPage<Base> {
    /// Insert a new **base** record. The slot's indirection starts out
    /// pointing at its own RID and its schema encoding at zero.
    pub fn insert_base(&mut self, rid: Rid, timestamp: i64, columns: &[i64]) -> Result<usize> {
        self.append(rid, timestamp, 0, Indirection::Live(rid), columns)
    }

    /// Swing the indirection cell of a base record to a newer version (or
    /// to a tombstone on delete).
    pub fn set_indirection(&mut self, slot: usize, indirection: Indirection) -> Result<()> {
        match self.indirection.get_mut(slot) {
            Some(cell) => {
                *cell = indirection;
                Ok(())
            }
            None => Err(DatabaseError::OffsetOutOfBounds),
        }
    }

    /// OR update bits into a base slot's schema encoding.
    pub fn or_schema(&mut self, slot: usize, bits: i64) -> Result<()> {
        match self.schema_encoding.get_mut(slot) {
            Some(mask) => {
                *mask |= bits;
                Ok(())
            }
            None => Err(DatabaseError::OffsetOutOfBounds),
        }
    }

    /// Overwrite one column cell of an occupied slot. Used by merge when it
    /// folds tail history into a consolidated base image.
    pub fn overwrite_column(&mut self, slot: usize, column: usize, value: i64) -> Result<()> {
        match self.columns.get_mut(column) {
            Some(page) => page.write_at(slot, value),
            None => Err(DatabaseError::OffsetOutOfBounds),
        }
    }

    /// Record the merge watermark on a consolidated page.
    pub fn set_tps(&mut self, tps: u64) {
        self.tps = tps;
    }
}

/// Methods for logical **tail** pages.
impl LogicalPage<Tail> {
    /// Insert a new **tail** record carrying the full post-image. `schema`
    /// marks which columns carry a semantic change; the rest are
    /// carry-forward copies. `seq` is the record's range-scoped tail
    /// sequence number, folded into the page's tps watermark.
    pub fn insert_tail(
        &mut self,
        rid: Rid,
        timestamp: i64,
        schema: i64,
        indirection: Indirection,
        columns: &[i64],
        seq: u64,
    ) -> Result<usize> {
        let slot = self.append(rid, timestamp, schema, indirection, columns)?;
        self.tps = self.tps.max(seq);
        Ok(slot)
    }
}

/// Represents a page range: bookkeeping for a bounded group of base pages
/// (at most `MAX_BASE_PAGES`) and an unbounded chain of tail pages. The
/// pages themselves live in the buffer pool; this struct only tracks how
/// many exist and how full each is, so capacity checks never touch the
/// pool. Not itself thread-safe; the owning table serializes access.
#[derive(Clone, Debug)]
pub struct PageRange {
    num_base_pages: usize,
    num_tail_pages: usize,

    /// Occupied slots per base page.
    base_records: Vec<usize>,

    /// Occupied slots per tail page.
    tail_records: Vec<usize>,

    /// Next tail record sequence number handed out in this range.
    next_tail_seq: u64,

    /// Merge watermark: every tail record with sequence <= tps has been
    /// folded into the base images of this range.
    tps: u64,
}

impl PageRange {
    /// Create a new, empty page range. Pages are allocated on demand.
    pub fn new() -> Self {
        PageRange {
            num_base_pages: 0,
            num_tail_pages: 0,
            base_records: Vec::new(),
            tail_records: Vec::new(),
            next_tail_seq: 0,
            tps: 0,
        }
    }

    /// True iff this range can still accept a base record, either in its
    /// last base page or by allocating another one. Tail capacity is
    /// unbounded and never consulted here.
    pub fn has_capacity(&self) -> bool {
        match self.base_records.last() {
            Some(count) if *count < RECORDS_PER_PAGE => true,
            _ => self.num_base_pages < MAX_BASE_PAGES,
        }
    }

    pub fn num_base_pages(&self) -> usize {
        self.num_base_pages
    }

    pub fn num_tail_pages(&self) -> usize {
        self.num_tail_pages
    }

    pub fn base_records(&self, page: usize) -> usize {
        self.base_records.get(page).copied().unwrap_or(0)
    }

    pub fn tail_records(&self, page: usize) -> usize {
        self.tail_records.get(page).copied().unwrap_or(0)
    }

    pub fn tps(&self) -> u64 {
        self.tps
    }

    pub fn set_tps(&mut self, tps: u64) {
        self.tps = self.tps.max(tps);
    }

    /// Append a new base page, returning its index.
    pub fn add_base_page(&mut self) -> Result<usize> {
        if self.num_base_pages >= MAX_BASE_PAGES {
            return Err(DatabaseError::CapacityExceeded);
        }

        self.base_records.push(0);
        self.num_base_pages += 1;
        Ok(self.num_base_pages - 1)
    }

    /// Append a new tail page, returning its index.
    pub fn add_tail_page(&mut self) -> usize {
        self.tail_records.push(0);
        self.num_tail_pages += 1;
        self.num_tail_pages - 1
    }

    /// The base page and slot the next base record will occupy, if the
    /// last base page has room.
    pub fn next_base_slot(&self) -> Option<(usize, usize)> {
        match self.base_records.last() {
            Some(count) if *count < RECORDS_PER_PAGE => Some((self.num_base_pages - 1, *count)),
            _ => None,
        }
    }

    /// The tail page and slot the next tail record will occupy, if the
    /// last tail page has room.
    pub fn next_tail_slot(&self) -> Option<(usize, usize)> {
        match self.tail_records.last() {
            Some(count) if *count < RECORDS_PER_PAGE => Some((self.num_tail_pages - 1, *count)),
            _ => None,
        }
    }

    /// Note a committed base append in `page`.
    pub fn record_base_append(&mut self, page: usize) {
        self.base_records[page] += 1;
    }

    /// Note a committed tail append in `page`.
    pub fn record_tail_append(&mut self, page: usize) {
        self.tail_records[page] += 1;
    }

    /// Hand out the next tail record sequence number.
    pub fn take_tail_seq(&mut self) -> u64 {
        self.next_tail_seq += 1;
        self.next_tail_seq
    }

    pub(crate) fn to_persistable(&self) -> PageRangePersistable {
        PageRangePersistable {
            num_base_pages: self.num_base_pages,
            num_tail_pages: self.num_tail_pages,
            base_records: self.base_records.clone(),
            tail_records: self.tail_records.clone(),
            next_tail_seq: self.next_tail_seq,
            tps: self.tps,
        }
    }

    pub(crate) fn from_persistable(persistable: &PageRangePersistable) -> Self {
        PageRange {
            num_base_pages: persistable.num_base_pages,
            num_tail_pages: persistable.num_tail_pages,
            base_records: persistable.base_records.clone(),
            tail_records: persistable.tail_records.clone(),
            next_tail_seq: persistable.next_tail_seq,
            tps: persistable.tps,
        }
    }
}

impl Default for PageRange {
    fn default() -> Self {
        PageRange::new()
    }
}
