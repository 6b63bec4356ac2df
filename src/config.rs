//! Store configuration and the `open_store` factory.

use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::Connection;

use crate::{
    errors::CalcStoreError,
    schema::{ensure_schema, ensure_schema_without_migrations},
    store::{CalcStore, DEFAULT_STATEMENT_CACHE},
};

/// Where the SQLite database lives.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Database {
    #[default]
    Memory,
    File(PathBuf),
}

impl Database {
    /// Parses the command-line spelling: `memory` or a filesystem path.
    pub fn parse(value: &str) -> Self {
        if value == "memory" || value == ":memory:" {
            Database::Memory
        } else {
            Database::File(PathBuf::from(value))
        }
    }
}

/// Options applied when opening a [`CalcStore`].
///
/// ```rust
/// use calcstore::{Database, StoreConfig};
/// let config = StoreConfig::default();
/// assert_eq!(config.database, Database::Memory);
/// assert!(!config.without_migrations);
/// assert!(config.pragma_settings.is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub database: Database,

    /// Skip pending schema migrations while opening. The base tables are
    /// still created.
    pub without_migrations: bool,

    /// Prepared statement cache capacity; `None` keeps the store default.
    pub cache_size: Option<usize>,

    /// How long a writer waits on a locked database file before failing.
    pub busy_timeout_ms: Option<u64>,

    /// Extra PRAGMAs applied after opening, before the schema check.
    ///
    /// ```rust
    /// use calcstore::StoreConfig;
    /// let mut config = StoreConfig::default();
    /// config.pragma_settings.insert("cache_size".to_string(), "-16000".to_string());
    /// ```
    pub pragma_settings: HashMap<String, String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: Database::Memory,
            without_migrations: false,
            cache_size: None,
            busy_timeout_ms: Some(5_000),
            pragma_settings: HashMap::new(),
        }
    }
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            database: Database::File(path.into()),
            ..Self::default()
        }
    }
}

/// Opens a store according to `config`.
pub fn open_store(config: &StoreConfig) -> Result<CalcStore, CalcStoreError> {
    let conn = match &config.database {
        Database::Memory => Connection::open_in_memory(),
        Database::File(path) => Connection::open(path),
    }
    .map_err(|e| CalcStoreError::connection(e.to_string()))?;

    if let Some(ms) = config.busy_timeout_ms {
        conn.busy_timeout(std::time::Duration::from_millis(ms))
            .map_err(|e| CalcStoreError::connection(e.to_string()))?;
    }
    for (key, value) in &config.pragma_settings {
        conn.pragma_update(None, key, value).map_err(|e| {
            CalcStoreError::connection(format!("failed to apply pragma {key}={value}: {e}"))
        })?;
    }

    if config.without_migrations {
        ensure_schema_without_migrations(&conn)?;
    } else {
        ensure_schema(&conn)?;
    }

    tracing::debug!(database = ?config.database, "opened store");
    Ok(CalcStore::from_connection(
        conn,
        config.cache_size.unwrap_or(DEFAULT_STATEMENT_CACHE),
    ))
}
