use std::collections::{BTreeMap, HashSet};
use std::ops::Bound::Included;

use crate::record::Rid;

/// Per-column ordered indexes for one table: each column gets a tree
/// mapping values to the base RIDs currently carrying that value. The key
/// column's index is unique (enforced by the table's insert/update paths)
/// and can never be dropped. `create_index`/`drop_index` toggle a column's
/// visibility; the trees themselves are maintained on every write so an
/// index can be re-enabled without a rebuild.
#[derive(Clone, Debug)]
pub struct Index {
    key_column: usize,

    /// If `enabled[i]` is `false`, the index for column `i` is considered
    /// dropped.
    enabled: Vec<bool>,

    /// One ordered tree per user column.
    trees: Vec<BTreeMap<i64, HashSet<Rid>>>,
}

impl Index {
    /// Initialize indexes for a table. Only the key column starts enabled.
    pub fn new(num_columns: usize, key_column: usize) -> Self {
        let mut enabled = vec![false; num_columns];
        enabled[key_column] = true;

        Index {
            key_column,
            enabled,
            trees: vec![BTreeMap::new(); num_columns],
        }
    }

    pub fn is_enabled(&self, column: usize) -> bool {
        self.enabled.get(column).copied().unwrap_or(false)
    }

    /// Enable the index on `column`. Returns `false` for an out-of-range
    /// column.
    pub fn create_index(&mut self, column: usize) -> bool {
        match self.enabled.get_mut(column) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    /// Disable the index on `column`. The key column's index cannot be
    /// dropped.
    pub fn drop_index(&mut self, column: usize) -> bool {
        if column == self.key_column {
            return false;
        }

        match self.enabled.get_mut(column) {
            Some(flag) => {
                *flag = false;
                true
            }
            None => false,
        }
    }

    /// Register a fully-populated row under every column tree.
    pub fn insert(&mut self, columns: &[i64], rid: Rid) {
        for (value, tree) in columns.iter().zip(self.trees.iter_mut()) {
            tree.entry(*value).or_insert_with(HashSet::new).insert(rid);
        }
    }

    /// Add a single (value, RID) pair to one column's tree.
    pub fn insert_one(&mut self, value: i64, column: usize, rid: Rid) {
        self.trees[column]
            .entry(value)
            .or_insert_with(HashSet::new)
            .insert(rid);
    }

    /// Move `rid` from `original` to `update` in one column's tree. Used
    /// when an update changes a column value.
    pub fn update_one(&mut self, original: i64, update: i64, column: usize, rid: Rid) {
        if let Some(set) = self.trees[column].get_mut(&original) {
            set.remove(&rid);
            if set.is_empty() {
                self.trees[column].remove(&original);
            }
        }

        self.insert_one(update, column, rid);
    }

    /// Remove a row's value/RID pairs from every column tree. Positions
    /// holding `None` are skipped.
    pub fn remove(&mut self, columns: &[Option<i64>], rid: Rid) {
        for (value, tree) in columns.iter().zip(self.trees.iter_mut()) {
            if let Some(value) = value {
                if let Some(set) = tree.get_mut(value) {
                    set.remove(&rid);
                    if set.is_empty() {
                        tree.remove(value);
                    }
                }
            }
        }
    }

    /// All RIDs currently carrying `value` in `column`.
    pub fn locate(&self, column: usize, value: i64) -> Vec<Rid> {
        self.locate_range(value, value, column)
    }

    /// All RIDs whose `column` value lies in `[start, end]`, endpoints
    /// inclusive on both sides.
    pub fn locate_range(&self, start: i64, end: i64, column: usize) -> Vec<Rid> {
        let mut result = Vec::new();

        if let Some(tree) = self.trees.get(column) {
            for (_, rids) in tree.range((Included(&start), Included(&end))) {
                result.extend(rids.iter().copied());
            }
        }

        result
    }
}
