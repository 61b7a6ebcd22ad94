use serde::{Deserialize, Serialize};

use crate::record::{Indirection, Record, Rid};

/// On-disk form of one logical page (`base_<range>_<page>.msg` /
/// `tail_<range>_<page>.msg`). Column data is stored as dense value lists;
/// the byte layout is rebuilt on load.
#[derive(Serialize, Deserialize, Debug)]
pub struct PagePersistable {
    /// Dense cell values per column, each of length `num_records`.
    pub columns: Vec<Vec<i64>>,

    /// Per-slot record identifiers.
    pub rid: Vec<Rid>,

    /// Per-slot indirection cells.
    pub indirection: Vec<Indirection>,

    /// Per-slot schema-encoding bitmasks.
    pub schema_encoding: Vec<i64>,

    /// Per-slot timestamps (seconds since the Unix epoch).
    pub timestamp: Vec<i64>,

    /// Tail-page-sequence watermark. On a tail page, the highest tail
    /// sequence stored in it; on a base page, the watermark up to which
    /// merge has absorbed tail history.
    pub tps: u64,
}

/// Contains page range bookkeeping for writing to disk.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PageRangePersistable {
    pub num_base_pages: usize,
    pub num_tail_pages: usize,

    /// Occupied slots per base page.
    pub base_records: Vec<usize>,

    /// Occupied slots per tail page.
    pub tail_records: Vec<usize>,

    /// Next tail record sequence number for this range.
    pub next_tail_seq: u64,

    /// Merge watermark for this range.
    pub tps: u64,
}

/// Contains table metadata for writing to disk (`tb_metadata.msg`).
#[derive(Serialize, Deserialize, Debug)]
pub struct TableMetadata {
    pub name: String,
    pub num_columns: usize,
    pub key_column: usize,

    /// Total number of allocated pages, base and tail.
    pub num_pages: usize,

    pub page_ranges: Vec<PageRangePersistable>,

    /// Updates committed since the last merge signal.
    pub num_updates: usize,
}

/// One table entry in the database metadata record.
#[derive(Serialize, Deserialize, Debug)]
pub struct TableDescriptor {
    pub name: String,
    pub num_columns: usize,
    pub key_column: usize,
}

/// Contains database metadata for writing to disk (`db_metadata.msg`).
#[derive(Serialize, Deserialize, Debug)]
pub struct DatabaseMetadata {
    pub tables: Vec<TableDescriptor>,
}

/// On-disk form of the page directory (`pg_directory.msg`): parallel lists
/// of RIDs and the records materialized at them.
#[derive(Serialize, Deserialize, Debug)]
pub struct PageDirectoryPersistable {
    pub rids: Vec<Rid>,
    pub records: Vec<Record>,
}
