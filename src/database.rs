use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use crate::bufferpool::BufferPool;
use crate::constants::BUFFERPOOL_SIZE;
use crate::errors::{DatabaseError, Result};
use crate::locks::LockManager;
use crate::persistables::{DatabaseMetadata, TableDescriptor};
use crate::table::Table;

/// Lifecycle owner: opens and closes the on-disk database, owns the buffer
/// pool and lock manager shared by every table, and hands out table
/// handles. All operations other than `open` fail with `NotOpen` while the
/// database is closed.
pub struct Database {
    /// Database directory, present while open.
    path: Option<PathBuf>,

    /// Tables created or loaded in this database.
    tables: HashMap<String, Arc<Table>>,

    /// Buffer pool shared by all tables, rooted at the database directory.
    pool: Option<Arc<BufferPool>>,

    /// Lock manager shared by all tables and transactions.
    lock_manager: Arc<LockManager>,

    /// Capacity the pool is created with on open.
    pool_capacity: usize,
}

impl Database {
    /// Create a closed database with the default buffer pool capacity.
    pub fn new() -> Self {
        Database::with_pool_capacity(BUFFERPOOL_SIZE)
    }

    /// Create a closed database whose pool will hold at most `capacity`
    /// pages.
    pub fn with_pool_capacity(capacity: usize) -> Self {
        Database {
            path: None,
            tables: HashMap::new(),
            pool: None,
            lock_manager: Arc::new(LockManager::new()),
            pool_capacity: capacity,
        }
    }

    pub fn is_open(&self) -> bool {
        self.path.is_some()
    }

    /// Open the database rooted at `path`, creating the directory if it
    /// does not exist and rehydrating any tables recorded in the metadata
    /// file. Opening an already-open database closes it first.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if self.is_open() {
            self.close()?;
        }

        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let pool = Arc::new(BufferPool::new(&root, self.pool_capacity));

        let mut tables = HashMap::new();

        let metadata_path = root.join("db_metadata.msg");
        match fs::read_to_string(&metadata_path) {
            Ok(metadata_string) => {
                let metadata: DatabaseMetadata = serde_json::from_str(&metadata_string)
                    .map_err(|err| {
                        DatabaseError::Corruption(format!("db_metadata.msg: {}", err))
                    })?;

                for descriptor in &metadata.tables {
                    let table = Table::load(
                        &root,
                        &descriptor.name,
                        pool.clone(),
                        self.lock_manager.clone(),
                    )?;
                    tables.insert(descriptor.name.clone(), table);
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        info!("opened database at {:?} ({} tables)", root, tables.len());

        self.tables = tables;

        self.pool = Some(pool);
        self.path = Some(root);
        Ok(())
    }

    /// Persist every table and the database metadata, flush the buffer
    /// pool, stop merge threads, and clear in-memory state.
    pub fn close(&mut self) -> Result<()> {
        let root = self.path.take().ok_or(DatabaseError::NotOpen)?;
        let pool = self.pool.take().ok_or(DatabaseError::NotOpen)?;

        let mut names: Vec<&String> = self.tables.keys().collect();
        names.sort();

        let metadata = DatabaseMetadata {
            tables: names
                .iter()
                .map(|name| {
                    let table = &self.tables[*name];
                    TableDescriptor {
                        name: table.name().to_string(),
                        num_columns: table.num_columns(),
                        key_column: table.key_column(),
                    }
                })
                .collect(),
        };

        let metadata_string = serde_json::to_string(&metadata)
            .map_err(|err| DatabaseError::Corruption(format!("db_metadata.msg: {}", err)))?;
        fs::write(root.join("db_metadata.msg"), metadata_string)?;

        for table in self.tables.values() {
            table.shutdown_merge();
            table.persist(&root)?;
        }

        pool.reset()?;
        self.tables.clear();

        info!("closed database at {:?}", root);
        Ok(())
    }

    /// Create a new table associated with this database's pool and lock
    /// manager.
    pub fn create_table(
        &mut self,
        name: &str,
        num_columns: usize,
        key_column: usize,
    ) -> Result<Arc<Table>> {
        let (root, pool) = self.require_open()?;

        if num_columns == 0 || key_column >= num_columns {
            return Err(DatabaseError::ColumnCountMismatch {
                expected: num_columns,
                actual: key_column,
            });
        }

        if self.tables.contains_key(name) {
            return Err(DatabaseError::DuplicateTable(name.to_string()));
        }

        fs::create_dir_all(root.join(name))?;

        let table = Table::new(
            name.to_string(),
            num_columns,
            key_column,
            pool,
            self.lock_manager.clone(),
        );

        self.tables.insert(name.to_string(), table.clone());
        Ok(table)
    }

    /// Get a table that already exists using its name.
    pub fn get_table(&self, name: &str) -> Result<Arc<Table>> {
        self.require_open()?;

        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| DatabaseError::NoSuchTable(name.to_string()))
    }

    /// Drop a table: discard its cached pages and delete its directory.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        let (root, pool) = self.require_open()?;

        let table = self
            .tables
            .remove(name)
            .ok_or_else(|| DatabaseError::NoSuchTable(name.to_string()))?;

        table.shutdown_merge();
        pool.discard_table(name);

        match fs::remove_dir_all(root.join(name)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn require_open(&self) -> Result<(PathBuf, Arc<BufferPool>)> {
        match (&self.path, &self.pool) {
            (Some(path), Some(pool)) => Ok((path.clone(), pool.clone())),
            _ => Err(DatabaseError::NotOpen),
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Database::new()
    }
}
