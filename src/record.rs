use serde::{Deserialize, Serialize};

/// Distinguishes base records from tail records. An RID's kind is always
/// consistent with the page category it indexes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Base,
    Tail,
}

/// Stable record identifier: page range, page within the range, slot within
/// the page, and the base/tail kind. An RID never changes after the record
/// it names is created, and merge never recycles RIDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rid {
    pub range: u32,
    pub page: u32,
    pub slot: u32,
    pub kind: RecordKind,
}

impl Rid {
    pub fn base(range: usize, page: usize, slot: usize) -> Self {
        Rid {
            range: range as u32,
            page: page as u32,
            slot: slot as u32,
            kind: RecordKind::Base,
        }
    }

    pub fn tail(range: usize, page: usize, slot: usize) -> Self {
        Rid {
            range: range as u32,
            page: page as u32,
            slot: slot as u32,
            kind: RecordKind::Tail,
        }
    }

    pub fn is_base(&self) -> bool {
        self.kind == RecordKind::Base
    }
}

/// One indirection cell. On a base slot this points at the newest version of
/// the record (itself, until the first update); on a tail slot it points at
/// the previous version, forming a chain that terminates at the base RID.
/// Deleted base slots hold `Tombstone`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Indirection {
    Live(Rid),
    Tombstone,
}

impl Indirection {
    /// The pointed-at RID, unless this cell is a tombstone.
    pub fn live(self) -> Option<Rid> {
        match self {
            Indirection::Live(rid) => Some(rid),
            Indirection::Tombstone => None,
        }
    }
}

/// A materialized row: its RID, its primary key, and a column vector.
/// Projected reads leave `None` in unrequested positions before the query
/// facade compacts them away.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub rid: Rid,
    pub key: i64,
    pub columns: Vec<Option<i64>>,
}

impl Record {
    pub fn new(rid: Rid, key: i64, columns: Vec<Option<i64>>) -> Self {
        Record { rid, key, columns }
    }
}
