use std::fmt;
use std::io;

/// Crate-wide error type. Internal layers return these as values; the
/// `Query` facade converts every variant to its sentinel (`false` / `None`)
/// at the public surface.
#[derive(Debug)]
pub enum DatabaseError {
    /// The database is not in the open state.
    NotOpen,

    /// A table with this name already exists.
    DuplicateTable(String),

    /// No table with this name exists.
    NoSuchTable(String),

    /// The primary key is already present in the key-column index.
    DuplicateKey(i64),

    /// No record with this primary key exists.
    NoSuchKey(i64),

    /// The buffer pool is full and every cached page is pinned.
    PoolExhausted,

    /// No unpinned page is available for eviction.
    NoEvictable,

    /// A page or page range has been filled to capacity.
    CapacityExceeded,

    /// A non-blocking lock request was denied.
    LockConflict,

    /// Offset is out of bounds for the page being read.
    OffsetOutOfBounds,

    /// A column vector has the wrong arity for its table.
    ColumnCountMismatch { expected: usize, actual: usize },

    /// A persisted file failed to parse.
    Corruption(String),

    /// Underlying disk I/O failure.
    Io(io::Error),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::NotOpen => write!(f, "database is not open"),
            DatabaseError::DuplicateTable(name) => write!(f, "table {:?} already exists", name),
            DatabaseError::NoSuchTable(name) => write!(f, "no table named {:?}", name),
            DatabaseError::DuplicateKey(key) => write!(f, "key {} already exists", key),
            DatabaseError::NoSuchKey(key) => write!(f, "no record with key {}", key),
            DatabaseError::PoolExhausted => write!(f, "buffer pool is full and fully pinned"),
            DatabaseError::NoEvictable => write!(f, "no unpinned page available for eviction"),
            DatabaseError::CapacityExceeded => write!(f, "page capacity exceeded"),
            DatabaseError::LockConflict => write!(f, "record lock request denied"),
            DatabaseError::OffsetOutOfBounds => write!(f, "offset out of bounds"),
            DatabaseError::ColumnCountMismatch { expected, actual } => {
                write!(f, "expected {} columns, got {}", expected, actual)
            }
            DatabaseError::Corruption(path) => write!(f, "corrupt database file {:?}", path),
            DatabaseError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for DatabaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatabaseError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for DatabaseError {
    fn from(err: io::Error) -> Self {
        DatabaseError::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
