use std::sync::Arc;

use log::debug;

use crate::record::Record;
use crate::table::Table;

/// Stateless request facade over one table. Queries that fail — missing
/// record, duplicate key, lock conflict, any internal error — return the
/// sentinel (`false` / `None`); queries that succeed return the result or
/// `true`. This sentinel contract is part of the public interface: the
/// transaction layer treats a sentinel result as an abort trigger.
#[derive(Clone)]
pub struct Query {
    table: Arc<Table>,
}

impl Query {
    pub fn new(table: Arc<Table>) -> Self {
        Query { table }
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Insert a record with the specified columns.
    pub fn insert(&self, columns: Vec<i64>) -> bool {
        match self.table.insert(&columns) {
            Ok(()) => true,
            Err(err) => {
                debug!("insert failed: {}", err);
                false
            }
        }
    }

    /// Update the record carrying `key`. Positions holding `None` are left
    /// unchanged.
    pub fn update(&self, key: i64, columns: Vec<Option<i64>>) -> bool {
        match self.table.update(key, &columns) {
            Ok(()) => true,
            Err(err) => {
                debug!("update of key {} failed: {}", key, err);
                false
            }
        }
    }

    /// Delete the record carrying `key`.
    pub fn delete(&self, key: i64) -> bool {
        match self.table.delete(key) {
            Ok(()) => true,
            Err(err) => {
                debug!("delete of key {} failed: {}", key, err);
                false
            }
        }
    }

    /// Read the current version of every matching record. Result columns
    /// contain only the projected positions, in column order.
    pub fn select(
        &self,
        search_key: i64,
        search_column: usize,
        projection: Vec<usize>,
    ) -> Option<Vec<Record>> {
        match self.table.select(search_key, search_column, &projection) {
            Ok(records) if records.is_empty() => None,
            Ok(records) => Some(project(records, &projection)),
            Err(err) => {
                debug!("select of {} failed: {}", search_key, err);
                None
            }
        }
    }

    /// Read a relative version of every matching record: `0` is the current
    /// version, `-1` the base image, `v <= -2` walks `|v|` steps back from
    /// the newest version.
    pub fn select_version(
        &self,
        search_key: i64,
        search_column: usize,
        projection: Vec<usize>,
        relative_version: i64,
    ) -> Option<Vec<Record>> {
        match self
            .table
            .select_version(search_key, search_column, &projection, relative_version)
        {
            Ok(records) if records.is_empty() => None,
            Ok(records) => Some(project(records, &projection)),
            Err(err) => {
                debug!(
                    "select_version of {} at {} failed: {}",
                    search_key, relative_version, err
                );
                None
            }
        }
    }

    /// Sum `column` over the records whose keys lie in `[start, end]`,
    /// endpoints inclusive. `None` when the range holds no records.
    pub fn sum(&self, start: i64, end: i64, column: usize) -> Option<i64> {
        match self.table.sum(start, end, column) {
            Ok(total) => total,
            Err(err) => {
                debug!("sum over [{}, {}] failed: {}", start, end, err);
                None
            }
        }
    }

    /// Sum `column` at a relative version over `[start, end]`. An empty
    /// range sums to zero.
    pub fn sum_version(
        &self,
        start: i64,
        end: i64,
        column: usize,
        relative_version: i64,
    ) -> Option<i64> {
        match self.table.sum_version(start, end, column, relative_version) {
            Ok(total) => Some(total),
            Err(err) => {
                debug!("sum_version over [{}, {}] failed: {}", start, end, err);
                None
            }
        }
    }

    /// Increment one column of the record carrying `key` by one.
    pub fn increment(&self, key: i64, column: usize) -> bool {
        let projection = vec![1; self.table.num_columns()];

        let records = match self.select(key, self.table.key_column(), projection) {
            Some(records) => records,
            None => return false,
        };

        let current = match records.first().and_then(|record| {
            record.columns.get(column).copied().flatten()
        }) {
            Some(value) => value,
            None => return false,
        };

        let mut updates = vec![None; self.table.num_columns()];
        updates[column] = Some(current + 1);

        self.update(key, updates)
    }
}

/// Compact a full-arity column vector down to the projected positions, in
/// column order.
fn project(records: Vec<Record>, projection: &[usize]) -> Vec<Record> {
    records
        .into_iter()
        .map(|record| {
            let columns = record
                .columns
                .iter()
                .zip(projection.iter())
                .filter(|(_, flag)| **flag == 1)
                .map(|(value, _)| *value)
                .collect();

            Record::new(record.rid, record.key, columns)
        })
        .collect()
}
