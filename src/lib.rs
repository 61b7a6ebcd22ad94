//! An embedded, single-node columnar storage engine in the L-Store style:
//! fixed-schema tables of 64-bit integer columns with append-only base and
//! tail pages, indirection-chain versioning, a background merge that folds
//! tail history back into base images, a fixed-capacity buffer pool, and
//! record-level two-phase locking for concurrent client threads.
//!
//! Clients obtain a [`Table`] from a [`Database`], issue point operations
//! through a [`Query`], and batch them into [`Transaction`]s driven by
//! [`TransactionWorker`] threads.

pub mod bufferpool;
pub mod constants;
pub mod database;
pub mod errors;
mod helpers;
pub mod index;
pub mod locks;
pub mod page;
pub mod pages;
mod persistables;
pub mod query;
pub mod record;
pub mod table;
pub mod transaction;
pub mod xact_worker;

pub use bufferpool::{BufferPool, PageId};
pub use database::Database;
pub use errors::{DatabaseError, Result};
pub use index::Index;
pub use locks::{LockManager, LockMode, TransactionId};
pub use page::Page;
pub use query::Query;
pub use record::{Indirection, Record, RecordKind, Rid};
pub use table::Table;
pub use transaction::{QueryRequest, Transaction};
pub use xact_worker::TransactionWorker;
