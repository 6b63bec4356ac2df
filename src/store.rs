//! The store handle: one SQLite connection plus the transaction helpers every
//! operation goes through.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, TransactionBehavior};

use crate::{
    config::{StoreConfig, open_store},
    errors::CalcStoreError,
    ordered::{CalculationFormulars, FormularNodes, OrderedList},
    schema::{
        MigrationReport, ensure_schema, ensure_schema_without_migrations, read_schema_version,
        run_pending_migrations,
    },
};

pub(crate) const DEFAULT_STATEMENT_CACHE: usize = 64;

/// Embedded store for calculations, formulars, nodes and the ordered
/// membership chains between them.
///
/// Opened once, shared by reference (or `Arc`) with every component that needs
/// persistence, and closed with [`CalcStore::close`].
pub struct CalcStore {
    conn: Mutex<Connection>,
}

fn is_in_memory_connection(conn: &Connection) -> bool {
    match conn.pragma_query_value(None, "database_list", |row| {
        let name: String = row.get(2)?;
        Ok(name)
    }) {
        Ok(file) => file.is_empty() || file == ":memory:",
        Err(_) => true,
    }
}

impl CalcStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CalcStoreError> {
        let conn =
            Connection::open(path).map_err(|e| CalcStoreError::connection(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(conn, DEFAULT_STATEMENT_CACHE))
    }

    pub fn open_without_migrations<P: AsRef<Path>>(path: P) -> Result<Self, CalcStoreError> {
        let conn =
            Connection::open(path).map_err(|e| CalcStoreError::connection(e.to_string()))?;
        ensure_schema_without_migrations(&conn)?;
        Ok(Self::from_connection(conn, DEFAULT_STATEMENT_CACHE))
    }

    pub fn open_in_memory() -> Result<Self, CalcStoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CalcStoreError::connection(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(conn, DEFAULT_STATEMENT_CACHE))
    }

    /// Opens a store with explicit options; see [`StoreConfig`].
    pub fn open_with_config(config: &StoreConfig) -> Result<Self, CalcStoreError> {
        open_store(config)
    }

    pub(crate) fn from_connection(conn: Connection, statement_cache: usize) -> Self {
        conn.set_prepared_statement_cache_capacity(statement_cache);

        if !is_in_memory_connection(&conn) {
            if conn.pragma_update(None, "journal_mode", "WAL").is_err() {
                // network filesystems without shared memory
                let _ = conn.pragma_update(None, "journal_mode", "DELETE");
            }
            let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        }

        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Closes the underlying connection, surfacing any error SQLite reports
    /// while finalizing.
    pub fn close(self) -> Result<(), CalcStoreError> {
        self.conn
            .into_inner()
            .close()
            .map_err(|(_, e)| CalcStoreError::connection(e.to_string()))
    }

    pub fn schema_version(&self) -> Result<i64, CalcStoreError> {
        read_schema_version(&self.conn.lock())
    }

    pub fn run_pending_migrations(
        &self,
        dry_run: bool,
    ) -> Result<MigrationReport, CalcStoreError> {
        run_pending_migrations(&self.conn.lock(), dry_run)
    }

    /// Ordered formulars of each calculation.
    pub fn calculation_formulars(&self) -> OrderedList<'_, CalculationFormulars> {
        OrderedList::new(self)
    }

    /// Ordered nodes of each formular.
    pub fn formular_nodes(&self) -> OrderedList<'_, FormularNodes> {
        OrderedList::new(self)
    }

    /// Runs `f` inside a deferred transaction so multi-statement reads see
    /// one consistent snapshot.
    pub(crate) fn read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, CalcStoreError>,
    ) -> Result<T, CalcStoreError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| CalcStoreError::transaction(e.to_string()))?;
        let value = f(&*tx)?;
        tx.commit()
            .map_err(|e| CalcStoreError::transaction(e.to_string()))?;
        Ok(value)
    }

    /// Runs `f` inside an immediate (write-locked) transaction. The
    /// transaction commits only when `f` succeeds; any error rolls back every
    /// statement `f` issued.
    pub(crate) fn write<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, CalcStoreError>,
    ) -> Result<T, CalcStoreError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| CalcStoreError::transaction(e.to_string()))?;
        let value = f(&*tx)?;
        tx.commit()
            .map_err(|e| CalcStoreError::transaction(e.to_string()))?;
        Ok(value)
    }
}
