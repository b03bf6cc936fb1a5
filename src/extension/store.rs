//! Extension-owned persistent stores.
//!
//! Each extension gets one redb file under the data directory
//! (`<data_dir>/<id>.redb`); each named store is a table in that file with
//! JSON-encoded values. Every operation runs in its own transaction, so a
//! failure never leaves a transaction open.

use crate::error::StoreError;
use dashmap::DashMap;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Opens and caches extension databases.
///
/// Shared by every connection so per-connection instances of one extension
/// use the same file.
#[derive(Debug)]
pub struct StoreManager {
    data_dir: PathBuf,
    open: DashMap<String, Arc<Database>>,
}

impl StoreManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            open: DashMap::new(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Open (creating if needed) the named store owned by `extension`.
    pub fn open(&self, extension: &str, name: &str) -> Result<Store, StoreError> {
        let db = self
            .open
            .entry(extension.to_string())
            .or_try_insert_with(|| self.create(extension).map(Arc::new))?
            .value()
            .clone();
        Ok(Store {
            db,
            table: name.to_string(),
        })
    }

    fn create(&self, extension: &str) -> Result<Database, StoreError> {
        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.data_dir.join(format!("{extension}.redb"));
        let db = Database::create(&path).map_err(|e| StoreError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!(extension = %extension, path = %path.display(), "Opened extension store");
        Ok(db)
    }

    /// Drop every cached database handle. Files close once the last
    /// outstanding [`Store`] is dropped.
    pub fn close_all(&self) {
        let count = self.open.len();
        self.open.clear();
        info!(count, "Closed extension stores");
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

/// One named key-value store.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
    table: String,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("table", &self.table).finish()
    }
}

impl Store {
    fn definition(&self) -> TableDefinition<'_, &'static str, &'static [u8]> {
        TableDefinition::new(&self.table)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = match read_txn.open_table(self.definition()) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(db_err(e)),
        };
        match table.get(key).map_err(db_err)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        let write_txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = write_txn.open_table(self.definition()).map_err(db_err)?;
            table.insert(key, bytes.as_slice()).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;
        Ok(())
    }

    /// Remove a key, returning whether it was present.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        let existed = {
            let mut table = write_txn.open_table(self.definition()).map_err(db_err)?;
            let removed = table.remove(key).map_err(db_err)?;
            removed.is_some()
        };
        write_txn.commit().map_err(db_err)?;
        Ok(existed)
    }

    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = match read_txn.open_table(self.definition()) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(db_err(e)),
        };
        let mut keys = Vec::new();
        for item in table.iter().map_err(db_err)? {
            let (key, _) = item.map_err(db_err)?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}

fn db_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Database(e.to_string())
}
