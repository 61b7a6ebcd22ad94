use std::sync::Arc;

use log::debug;

use crate::locks::{LockManager, LockMode, TransactionId};
use crate::query::Query;
use crate::record::Rid;
use crate::table::Table;

/// One query of a transaction, by the same name as the facade method it
/// runs.
#[derive(Clone, Debug)]
pub enum QueryRequest {
    Insert {
        columns: Vec<i64>,
    },
    Update {
        key: i64,
        columns: Vec<Option<i64>>,
    },
    Select {
        search_key: i64,
        search_column: usize,
        projection: Vec<usize>,
    },
    SelectVersion {
        search_key: i64,
        search_column: usize,
        projection: Vec<usize>,
        relative_version: i64,
    },
    Sum {
        start: i64,
        end: i64,
        column: usize,
    },
    SumVersion {
        start: i64,
        end: i64,
        column: usize,
        relative_version: i64,
    },
    Increment {
        key: i64,
        column: usize,
    },
    Delete {
        key: i64,
    },
}

/// A sequence of queries executed under two-phase locking. Each query
/// acquires its record locks before running; locks are held until commit or
/// abort. Lock acquisition never waits — the first refused lock, failed
/// query, or sentinel result aborts the whole transaction.
pub struct Transaction {
    queries: Vec<(Arc<Table>, QueryRequest)>,
    locks: Vec<(Arc<LockManager>, Rid)>,
}

impl Transaction {
    /// Create a new transaction.
    pub fn new() -> Self {
        Transaction {
            queries: Vec::new(),
            locks: Vec::new(),
        }
    }

    /// Add a query to this transaction.
    pub fn add_query(&mut self, table: Arc<Table>, request: QueryRequest) {
        self.queries.push((table, request));
    }

    /// Execute the queries in order. Returns `true` if the transaction
    /// committed and `false` if it aborted. An empty transaction does not
    /// commit. Either way the transaction is consumed: its query list is
    /// cleared and its locks released.
    pub fn run(&mut self) -> bool {
        let queries = std::mem::take(&mut self.queries);

        if queries.is_empty() {
            return false;
        }

        let manager = queries[0].0.lock_manager().clone();
        let tid = manager.next_transaction_id();

        for (table, request) in &queries {
            if !self.execute(tid, table, request) {
                return self.abort(tid);
            }
        }

        self.commit(tid)
    }

    fn execute(&mut self, tid: TransactionId, table: &Arc<Table>, request: &QueryRequest) -> bool {
        let query = Query::new(table.clone());

        match request {
            QueryRequest::Insert { columns } => query.insert(columns.clone()),

            QueryRequest::Update { key, columns } => {
                self.lock_key(tid, table, *key, LockMode::Exclusive)
                    && query.update(*key, columns.clone())
            }

            QueryRequest::Delete { key } => {
                self.lock_key(tid, table, *key, LockMode::Exclusive) && query.delete(*key)
            }

            QueryRequest::Increment { key, column } => {
                self.lock_key(tid, table, *key, LockMode::Exclusive)
                    && query.increment(*key, *column)
            }

            QueryRequest::Select {
                search_key,
                search_column,
                projection,
            } => {
                self.lock_matches(tid, table, *search_key, *search_column)
                    && query
                        .select(*search_key, *search_column, projection.clone())
                        .is_some()
            }

            QueryRequest::SelectVersion {
                search_key,
                search_column,
                projection,
                relative_version,
            } => {
                self.lock_matches(tid, table, *search_key, *search_column)
                    && query
                        .select_version(
                            *search_key,
                            *search_column,
                            projection.clone(),
                            *relative_version,
                        )
                        .is_some()
            }

            QueryRequest::Sum { start, end, column } => {
                self.lock_key_range(tid, table, *start, *end)
                    && query.sum(*start, *end, *column).is_some()
            }

            QueryRequest::SumVersion {
                start,
                end,
                column,
                relative_version,
            } => {
                self.lock_key_range(tid, table, *start, *end)
                    && query
                        .sum_version(*start, *end, *column, *relative_version)
                        .is_some()
            }
        }
    }

    /// Acquire a lock on the record currently carrying `key`, registering
    /// it with the transaction. A key with no record acquires nothing; the
    /// query itself will fail and trigger the abort.
    fn lock_key(&mut self, tid: TransactionId, table: &Arc<Table>, key: i64, mode: LockMode) -> bool {
        match table.locate(key) {
            Some(rid) => self.lock(tid, table, rid, mode),
            None => true,
        }
    }

    /// Acquire shared locks on every record whose key lies in the range.
    fn lock_key_range(&mut self, tid: TransactionId, table: &Arc<Table>, start: i64, end: i64) -> bool {
        for rid in table.locate_range(start, end) {
            if !self.lock(tid, table, rid, LockMode::Shared) {
                return false;
            }
        }

        true
    }

    /// Acquire a shared lock on every record matched by a select, whichever
    /// column it searches.
    fn lock_matches(
        &mut self,
        tid: TransactionId,
        table: &Arc<Table>,
        search_key: i64,
        search_column: usize,
    ) -> bool {
        for rid in table.locate_by(search_column, search_key) {
            if !self.lock(tid, table, rid, LockMode::Shared) {
                return false;
            }
        }

        true
    }

    fn lock(&mut self, tid: TransactionId, table: &Arc<Table>, rid: Rid, mode: LockMode) -> bool {
        let manager = table.lock_manager();

        if manager.acquire(tid, rid, mode) {
            self.locks.push((manager.clone(), rid));
            true
        } else {
            debug!("lock conflict on {:?}, aborting transaction {}", rid, tid);
            false
        }
    }

    /// Release all locks and clear transaction state.
    fn commit(&mut self, tid: TransactionId) -> bool {
        self.release_locks(tid);
        true
    }

    /// Release all locks. Queries that already succeeded are not reversed;
    /// strict two-phase locking plus the non-blocking lock policy keeps the
    /// partially-executed prefix isolated until the locks drop.
    fn abort(&mut self, tid: TransactionId) -> bool {
        self.release_locks(tid);
        false
    }

    fn release_locks(&mut self, tid: TransactionId) {
        for (manager, rid) in self.locks.drain(..) {
            manager.release(tid, rid);
        }
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Transaction::new()
    }
}
