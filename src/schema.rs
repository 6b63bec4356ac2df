use rusqlite::{Connection, OptionalExtension};

use crate::errors::CalcStoreError;

pub const BASE_SCHEMA_VERSION: i64 = 1;

struct MigrationStep {
    target_version: i64,
    statements: &'static [&'static str],
}

const MIGRATION_STEPS: &[MigrationStep] = &[MigrationStep {
    target_version: 2,
    statements: &[
        "CREATE INDEX IF NOT EXISTS idx_calculation_formulars_next ON calculation_formulars(next_id)",
        "CREATE INDEX IF NOT EXISTS idx_formular_nodes_next ON formular_nodes(next_id)",
    ],
}];

pub const SCHEMA_VERSION: i64 = BASE_SCHEMA_VERSION + MIGRATION_STEPS.len() as i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: i64,
    pub to_version: i64,
    pub statements: Vec<&'static str>,
    pub dry_run: bool,
}

pub fn ensure_schema(conn: &Connection) -> Result<(), CalcStoreError> {
    ensure_base_schema(conn)?;
    ensure_meta(conn)?;
    run_pending_migrations(conn, false)?;
    Ok(())
}

pub fn ensure_schema_without_migrations(conn: &Connection) -> Result<(), CalcStoreError> {
    ensure_base_schema(conn)?;
    ensure_meta(conn)?;
    Ok(())
}

fn ensure_base_schema(conn: &Connection) -> Result<(), CalcStoreError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS calculations (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            name       TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE TABLE IF NOT EXISTS formulars (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            name       TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE TABLE IF NOT EXISTS nodes (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            name       TEXT NOT NULL,
            node_data  TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE TABLE IF NOT EXISTS calculation_formulars (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_id  INTEGER NOT NULL REFERENCES calculations(id) ON DELETE CASCADE,
            child_id   INTEGER NOT NULL REFERENCES formulars(id) ON DELETE CASCADE,
            next_id    INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE TABLE IF NOT EXISTS formular_nodes (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_id  INTEGER NOT NULL REFERENCES formulars(id) ON DELETE CASCADE,
            child_id   INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
            next_id    INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_calculation_formulars_pair
            ON calculation_formulars(parent_id, child_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_formular_nodes_pair
            ON formular_nodes(parent_id, child_id);
        CREATE INDEX IF NOT EXISTS idx_calculation_formulars_child ON calculation_formulars(child_id);
        CREATE INDEX IF NOT EXISTS idx_formular_nodes_child ON formular_nodes(child_id);
        CREATE TABLE IF NOT EXISTS schema_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL
        );
        "#,
    )
    .map_err(|e| CalcStoreError::schema(e.to_string()))
}

pub fn read_schema_version(conn: &Connection) -> Result<i64, CalcStoreError> {
    conn.query_row(
        "SELECT schema_version FROM schema_meta WHERE id=1",
        [],
        |row| row.get(0),
    )
    .map_err(|e| CalcStoreError::schema(e.to_string()))
}

pub fn run_pending_migrations(
    conn: &Connection,
    dry_run: bool,
) -> Result<MigrationReport, CalcStoreError> {
    let current = read_schema_version(conn)?;
    let mut statements: Vec<&'static str> = Vec::new();
    let mut target = current;
    for step in MIGRATION_STEPS {
        if step.target_version > current {
            target = step.target_version;
            statements.extend_from_slice(step.statements);
        }
    }
    if statements.is_empty() || dry_run {
        return Ok(MigrationReport {
            from_version: current,
            to_version: target,
            statements,
            dry_run,
        });
    }
    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| CalcStoreError::schema(e.to_string()))?;
    let result: Result<(), CalcStoreError> = (|| {
        for sql in statements.iter().copied() {
            conn.execute(sql, [])
                .map_err(|e| CalcStoreError::schema(e.to_string()))?;
        }
        conn.execute(
            "UPDATE schema_meta SET schema_version=?1 WHERE id=1",
            [target],
        )
        .map_err(|e| CalcStoreError::schema(e.to_string()))?;
        Ok(())
    })();
    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT")
                .map_err(|e| CalcStoreError::schema(e.to_string()))?;
        }
        Err(err) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(err);
        }
    }
    tracing::info!(from = current, to = target, "applied schema migrations");
    Ok(MigrationReport {
        from_version: current,
        to_version: target,
        statements,
        dry_run,
    })
}

fn ensure_meta(conn: &Connection) -> Result<(), CalcStoreError> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT schema_version FROM schema_meta WHERE id=1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| CalcStoreError::schema(e.to_string()))?;
    match version {
        Some(existing) if existing > SCHEMA_VERSION => Err(CalcStoreError::schema(format!(
            "database schema version {existing} is newer than supported {SCHEMA_VERSION}"
        ))),
        Some(_) => Ok(()),
        None => {
            conn.execute(
                "INSERT INTO schema_meta(id, schema_version) VALUES(1, ?1)",
                [BASE_SCHEMA_VERSION],
            )
            .map_err(|e| CalcStoreError::schema(e.to_string()))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_reports_pending_steps_without_applying() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema_without_migrations(&conn).unwrap();
        let report = run_pending_migrations(&conn, true).unwrap();
        assert_eq!(report.from_version, BASE_SCHEMA_VERSION);
        assert_eq!(report.to_version, SCHEMA_VERSION);
        assert_eq!(report.statements.len(), 2);
        assert_eq!(read_schema_version(&conn).unwrap(), BASE_SCHEMA_VERSION);
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        let report = run_pending_migrations(&conn, false).unwrap();
        assert!(report.statements.is_empty());
        assert_eq!(read_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn.execute(
            "UPDATE schema_meta SET schema_version=?1 WHERE id=1",
            [SCHEMA_VERSION + 1],
        )
        .unwrap();
        let err = ensure_schema(&conn).unwrap_err();
        assert!(matches!(err, CalcStoreError::SchemaError(_)));
    }
}
