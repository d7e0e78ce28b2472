//! StateStore — redb-backed state persistence for chaincode governance.
//!
//! Values are JSON-serialized into redb's `&[u8]` value columns. Callers
//! work inside [`StateStore::read`] or [`StateStore::write`] closures so a
//! check and the mutation it guards share one transaction. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore").finish_non_exhaustive()
    }
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in ALL_TABLES {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Run `f` against a consistent read snapshot.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ReadTxn) -> Result<T, E>,
        E: From<StateError>,
    {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        f(&ReadTxn { txn })
    }

    /// Run `f` inside a single write transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and is aborted when it
    /// returns `Err`, so nothing `f` wrote survives a failed check. Only one
    /// write transaction is open at a time; concurrent callers block here.
    pub fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&WriteTxn) -> Result<T, E>,
        E: From<StateError>,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let wtxn = WriteTxn { txn };
        match f(&wtxn) {
            Ok(value) => {
                wtxn.txn.commit().map_err(map_err!(Transaction))?;
                Ok(value)
            }
            Err(err) => {
                wtxn.txn.abort().map_err(map_err!(Transaction))?;
                Err(err)
            }
        }
    }

    /// Fetch one record outside of any caller-managed transaction.
    pub fn get<T: DeserializeOwned>(&self, table: JsonTable, key: &str) -> StateResult<Option<T>> {
        self.read(|txn| txn.get(table, key))
    }

    /// List every record of a table in key order.
    pub fn list<T: DeserializeOwned>(&self, table: JsonTable) -> StateResult<Vec<T>> {
        self.read(|txn| txn.scan(table))
    }

    /// Insert or replace one record in its own transaction.
    pub fn put<T: Serialize>(&self, table: JsonTable, key: &str, value: &T) -> StateResult<()> {
        self.write(|txn| txn.put(table, key, value))
    }
}

/// Typed reads shared by read and write transactions.
pub trait TableRead {
    /// Get one record by key.
    fn get<T: DeserializeOwned>(&self, table: JsonTable, key: &str) -> StateResult<Option<T>>;

    /// All records whose key starts with `prefix`, in key order.
    fn scan_prefix<T: DeserializeOwned>(&self, table: JsonTable, prefix: &str)
    -> StateResult<Vec<T>>;

    /// All records of a table, in key order.
    fn scan<T: DeserializeOwned>(&self, table: JsonTable) -> StateResult<Vec<T>> {
        self.scan_prefix(table, "")
    }

    /// Whether a key is present.
    fn contains(&self, table: JsonTable, key: &str) -> StateResult<bool> {
        Ok(self.get::<serde_json::Value>(table, key)?.is_some())
    }
}

/// Read-only snapshot handed to [`StateStore::read`] closures.
pub struct ReadTxn {
    txn: redb::ReadTransaction,
}

impl TableRead for ReadTxn {
    fn get<T: DeserializeOwned>(&self, table: JsonTable, key: &str) -> StateResult<Option<T>> {
        let table = self.txn.open_table(table).map_err(map_err!(Table))?;
        get_json(&table, key)
    }

    fn scan_prefix<T: DeserializeOwned>(
        &self,
        table: JsonTable,
        prefix: &str,
    ) -> StateResult<Vec<T>> {
        let table = self.txn.open_table(table).map_err(map_err!(Table))?;
        scan_json(&table, prefix)
    }
}

/// Read-write transaction handed to [`StateStore::write`] closures.
pub struct WriteTxn {
    txn: redb::WriteTransaction,
}

impl TableRead for WriteTxn {
    fn get<T: DeserializeOwned>(&self, table: JsonTable, key: &str) -> StateResult<Option<T>> {
        let table = self.txn.open_table(table).map_err(map_err!(Table))?;
        get_json(&table, key)
    }

    fn scan_prefix<T: DeserializeOwned>(
        &self,
        table: JsonTable,
        prefix: &str,
    ) -> StateResult<Vec<T>> {
        let table = self.txn.open_table(table).map_err(map_err!(Table))?;
        scan_json(&table, prefix)
    }
}

impl WriteTxn {
    /// Insert or replace a record.
    pub fn put<T: Serialize>(&self, table: JsonTable, key: &str, value: &T) -> StateResult<()> {
        let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let mut table = self.txn.open_table(table).map_err(map_err!(Table))?;
        table
            .insert(key, bytes.as_slice())
            .map_err(map_err!(Write))?;
        Ok(())
    }

    /// Insert a record only if the key is free. Returns false if it was taken.
    pub fn insert_new<T: Serialize>(
        &self,
        table: JsonTable,
        key: &str,
        value: &T,
    ) -> StateResult<bool> {
        if self.contains(table, key)? {
            return Ok(false);
        }
        self.put(table, key, value)?;
        Ok(true)
    }

    /// Delete a record. Returns true if it existed.
    pub fn remove(&self, table: JsonTable, key: &str) -> StateResult<bool> {
        let mut table = self.txn.open_table(table).map_err(map_err!(Table))?;
        let existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        Ok(existed)
    }

    /// Bump a named counter and return its new value (first call yields 1).
    pub fn next_ordinal(&self, counter: &str) -> StateResult<u64> {
        let current: u64 = self.get(COUNTERS, counter)?.unwrap_or(0);
        let next = current + 1;
        self.put(COUNTERS, counter, &next)?;
        Ok(next)
    }
}

fn get_json<T, R>(table: &R, key: &str) -> StateResult<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => {
            let value = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn scan_json<T, R>(table: &R, prefix: &str) -> StateResult<Vec<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    let mut results = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        if key.value().starts_with(prefix) {
            let record = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
    }
    Ok(results)
}
