extern crate lstore_rs;

use std::sync::Arc;

use lstore_rs::{Database, Query, Table};
use tempfile::TempDir;

mod common;

fn open_grades(dir: &TempDir) -> (Database, Arc<Table>) {
    let mut db = Database::new();
    db.open(dir.path()).unwrap();
    let table = db.create_table("grades", 5, 0).unwrap();
    (db, table)
}

fn all_columns() -> Vec<usize> {
    vec![1; 5]
}

#[test]
fn test_merge_consolidates_updates_into_base_images() {
    let dir = common::temp_dir();
    let (_db, table) = open_grades(&dir);
    let query = Query::new(table.clone());

    for key in 1..=20 {
        query.insert(vec![key, key, 0, 0, 0]);
    }
    for key in 1..=10 {
        query.update(key, vec![None, Some(key + 100), None, None, None]);
    }

    table.merge().unwrap();

    // Current reads are unchanged by consolidation.
    for key in 1..=10 {
        let records = query.select(key, 0, all_columns()).unwrap();
        assert_eq!(records[0].columns[1], Some(key + 100));
    }
    for key in 11..=20 {
        let records = query.select(key, 0, all_columns()).unwrap();
        assert_eq!(records[0].columns[1], Some(key));
    }

    // The consolidated base image now carries the newest values.
    for key in 1..=10 {
        let base = query.select_version(key, 0, all_columns(), -1).unwrap();
        assert_eq!(base[0].columns[1], Some(key + 100));
    }

    // Untouched slots keep their insert image.
    for key in 11..=20 {
        let base = query.select_version(key, 0, all_columns(), -1).unwrap();
        assert_eq!(base[0].columns[1], Some(key));
    }
}

#[test]
fn test_merge_keeps_tail_chain_walkable() {
    let dir = common::temp_dir();
    let (_db, table) = open_grades(&dir);
    let query = Query::new(table.clone());

    query.insert(vec![5, 1, 0, 0, 0]);
    for value in [2, 3, 4] {
        query.update(5, vec![None, Some(value), None, None, None]);
    }

    table.merge().unwrap();

    // Tail pages are never reclaimed, so relative walks still work.
    let at = |version: i64| {
        query.select_version(5, 0, all_columns(), version).unwrap()[0]
            .columns[1]
            .unwrap()
    };

    assert_eq!(at(0), 4);
    assert_eq!(at(-2), 2);
}

#[test]
fn test_merge_newest_value_wins_per_column() {
    let dir = common::temp_dir();
    let (_db, table) = open_grades(&dir);
    let query = Query::new(table.clone());

    query.insert(vec![1, 10, 20, 30, 40]);
    query.update(1, vec![None, Some(11), None, None, None]);
    query.update(1, vec![None, None, Some(22), None, None]);
    query.update(1, vec![None, Some(13), None, None, None]);

    table.merge().unwrap();

    let base = query.select_version(1, 0, all_columns(), -1).unwrap();
    assert_eq!(
        base[0].columns,
        vec![Some(1), Some(13), Some(22), Some(30), Some(40)]
    );
}

#[test]
fn test_merge_skips_deleted_records() {
    let dir = common::temp_dir();
    let (_db, table) = open_grades(&dir);
    let query = Query::new(table.clone());

    query.insert(vec![1, 1, 0, 0, 0]);
    query.insert(vec![2, 2, 0, 0, 0]);
    query.update(1, vec![None, Some(9), None, None, None]);
    query.update(2, vec![None, Some(9), None, None, None]);
    assert!(query.delete(1));

    table.merge().unwrap();

    assert!(query.select(1, 0, all_columns()).is_none());
    let records = query.select(2, 0, all_columns()).unwrap();
    assert_eq!(records[0].columns[1], Some(9));
}

#[test]
fn test_merge_is_idempotent() {
    let dir = common::temp_dir();
    let (_db, table) = open_grades(&dir);
    let query = Query::new(table.clone());

    for key in 1..=50 {
        query.insert(vec![key, key, 0, 0, 0]);
        query.update(key, vec![None, None, Some(key * 2), None, None]);
    }

    table.merge().unwrap();
    let first: Vec<_> = (1..=50)
        .map(|key| query.select(key, 0, all_columns()).unwrap()[0].columns.clone())
        .collect();

    table.merge().unwrap();
    let second: Vec<_> = (1..=50)
        .map(|key| query.select(key, 0, all_columns()).unwrap()[0].columns.clone())
        .collect();

    assert_eq!(first, second);
}

#[test]
fn test_updates_past_merge_threshold_stay_readable() {
    let dir = common::temp_dir();
    let (_db, table) = open_grades(&dir);
    let query = Query::new(table.clone());

    query.insert(vec![1, 0, 0, 0, 0]);

    // Crosses the merge threshold, so the background merge kicks in while
    // updates keep flowing.
    for value in 1..=300 {
        assert!(query.update(1, vec![None, Some(value), None, None, None]));
    }

    let records = query.select(1, 0, all_columns()).unwrap();
    assert_eq!(records[0].columns[1], Some(300));
}

#[test]
fn test_updates_after_merge_land_on_top_of_consolidation() {
    let dir = common::temp_dir();
    let (_db, table) = open_grades(&dir);
    let query = Query::new(table.clone());

    query.insert(vec![1, 1, 0, 0, 0]);
    query.update(1, vec![None, Some(2), None, None, None]);

    table.merge().unwrap();

    query.update(1, vec![None, Some(3), None, None, None]);
    let records = query.select(1, 0, all_columns()).unwrap();
    assert_eq!(records[0].columns[1], Some(3));

    table.merge().unwrap();
    let base = query.select_version(1, 0, all_columns(), -1).unwrap();
    assert_eq!(base[0].columns[1], Some(3));
}
