//! Association record storage. Every function takes the connection (or open
//! transaction) it runs on, so the mutation engine can compose several of
//! them into one atomic unit.

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{entity::Entity, entity_ops::entity_exists, errors::CalcStoreError};

use super::relation::Relation;

const RECORD_COLUMNS: &str = "id, parent_id, child_id, next_id, created_at, updated_at";

/// One link in a parent's chain: binds a parent to a child and points at the
/// record that comes immediately after it (`next_id`), if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationRecord {
    pub id: i64,
    pub parent_id: i64,
    pub child_id: i64,
    pub next_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

pub(crate) fn row_to_record(row: &rusqlite::Row<'_>) -> Result<AssociationRecord, rusqlite::Error> {
    Ok(AssociationRecord {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        child_id: row.get(2)?,
        next_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Inserts a new record with no successor.
pub fn create<R: Relation>(
    conn: &Connection,
    parent_id: i64,
    child_id: i64,
) -> Result<AssociationRecord, CalcStoreError> {
    ensure_endpoints::<R>(conn, parent_id, child_id)?;
    let parent_kind = <R::Parent as Entity>::KIND;
    let child_kind = <R::Child as Entity>::KIND;
    if find_optional::<R>(conn, parent_id, child_id)?.is_some() {
        return Err(CalcStoreError::validation(format!(
            "{child_kind} {child_id} is already attached to {parent_kind} {parent_id}"
        )));
    }
    conn.execute(
        &format!(
            "INSERT INTO {}(parent_id, child_id, next_id) VALUES(?1, ?2, NULL)",
            R::TABLE
        ),
        params![parent_id, child_id],
    )
    .map_err(|e| CalcStoreError::query(e.to_string()))?;
    find_by_id::<R>(conn, conn.last_insert_rowid())
}

/// Fails with `ReferenceError` unless both the parent and the child entity
/// exist.
pub(crate) fn ensure_endpoints<R: Relation>(
    conn: &Connection,
    parent_id: i64,
    child_id: i64,
) -> Result<(), CalcStoreError> {
    let parent_kind = <R::Parent as Entity>::KIND;
    let child_kind = <R::Child as Entity>::KIND;
    if !entity_exists(conn, parent_kind, parent_id)? {
        return Err(CalcStoreError::reference(format!(
            "{parent_kind} {parent_id} does not exist"
        )));
    }
    if !entity_exists(conn, child_kind, child_id)? {
        return Err(CalcStoreError::reference(format!(
            "{child_kind} {child_id} does not exist"
        )));
    }
    Ok(())
}

pub fn find_by_parent_and_child<R: Relation>(
    conn: &Connection,
    parent_id: i64,
    child_id: i64,
) -> Result<AssociationRecord, CalcStoreError> {
    find_optional::<R>(conn, parent_id, child_id)?.ok_or_else(|| {
        CalcStoreError::not_found(format!(
            "{} {child_id} is not attached to {} {parent_id}",
            <R::Child as Entity>::KIND,
            <R::Parent as Entity>::KIND
        ))
    })
}

pub fn find_by_id<R: Relation>(
    conn: &Connection,
    id: i64,
) -> Result<AssociationRecord, CalcStoreError> {
    conn.prepare_cached(&format!(
        "SELECT {RECORD_COLUMNS} FROM {} WHERE id=?1",
        R::TABLE
    ))
    .and_then(|mut stmt| stmt.query_row(params![id], row_to_record))
    .map_err(|err| match err {
        rusqlite::Error::QueryReturnedNoRows => {
            CalcStoreError::not_found(format!("{} record {id}", R::NAME))
        }
        other => CalcStoreError::query(other.to_string()),
    })
}

/// All records of `parent_id`, by id. The order carries no meaning; use the
/// reader for chain order.
pub fn list_by_parent<R: Relation>(
    conn: &Connection,
    parent_id: i64,
) -> Result<Vec<AssociationRecord>, CalcStoreError> {
    collect_records(
        conn,
        &format!(
            "SELECT {RECORD_COLUMNS} FROM {} WHERE parent_id=?1 ORDER BY id",
            R::TABLE
        ),
        parent_id,
    )
}

pub fn list_by_child<R: Relation>(
    conn: &Connection,
    child_id: i64,
) -> Result<Vec<AssociationRecord>, CalcStoreError> {
    collect_records(
        conn,
        &format!(
            "SELECT {RECORD_COLUMNS} FROM {} WHERE child_id=?1 ORDER BY id",
            R::TABLE
        ),
        child_id,
    )
}

/// Records whose `next_id` is `id`. A well-formed chain yields at most one.
pub fn predecessors<R: Relation>(
    conn: &Connection,
    id: i64,
) -> Result<Vec<AssociationRecord>, CalcStoreError> {
    collect_records(
        conn,
        &format!(
            "SELECT {RECORD_COLUMNS} FROM {} WHERE next_id=?1 ORDER BY id",
            R::TABLE
        ),
        id,
    )
}

/// Records of `parent_id` without a successor. A well-formed, non-empty chain
/// yields exactly one.
pub fn tails<R: Relation>(
    conn: &Connection,
    parent_id: i64,
) -> Result<Vec<AssociationRecord>, CalcStoreError> {
    collect_records(
        conn,
        &format!(
            "SELECT {RECORD_COLUMNS} FROM {} WHERE parent_id=?1 AND next_id IS NULL ORDER BY id",
            R::TABLE
        ),
        parent_id,
    )
}

/// Points record `id` at `next_id`, or marks it as the tail when `None`.
pub fn set_next<R: Relation>(
    conn: &Connection,
    id: i64,
    next_id: Option<i64>,
) -> Result<(), CalcStoreError> {
    let record = find_by_id::<R>(conn, id)?;
    if let Some(next) = next_id {
        if next == id {
            return Err(CalcStoreError::reference(format!(
                "{} record {id} cannot follow itself",
                R::NAME
            )));
        }
        let target = find_by_id::<R>(conn, next).map_err(|err| match err {
            CalcStoreError::NotFound(msg) => CalcStoreError::reference(msg),
            other => other,
        })?;
        if target.parent_id != record.parent_id {
            return Err(CalcStoreError::reference(format!(
                "{} record {next} belongs to parent {}, not {}",
                R::NAME,
                target.parent_id,
                record.parent_id
            )));
        }
    }
    conn.execute(
        &format!(
            "UPDATE {} SET next_id=?1, updated_at=CURRENT_TIMESTAMP WHERE id=?2",
            R::TABLE
        ),
        params![next_id, id],
    )
    .map_err(|e| CalcStoreError::query(e.to_string()))?;
    Ok(())
}

/// Removes record `id`. Returns whether a row was deleted; a missing row is
/// not an error.
pub fn delete<R: Relation>(conn: &Connection, id: i64) -> Result<bool, CalcStoreError> {
    let affected = conn
        .execute(&format!("DELETE FROM {} WHERE id=?1", R::TABLE), params![id])
        .map_err(|e| CalcStoreError::query(e.to_string()))?;
    Ok(affected > 0)
}

/// Removes every record owned by `parent_id`.
pub(crate) fn delete_by_parent<R: Relation>(
    conn: &Connection,
    parent_id: i64,
) -> Result<usize, CalcStoreError> {
    conn.execute(
        &format!("DELETE FROM {} WHERE parent_id=?1", R::TABLE),
        params![parent_id],
    )
    .map_err(|e| CalcStoreError::query(e.to_string()))
}

/// Distinct parents that own at least one record.
pub(crate) fn parent_ids<R: Relation>(conn: &Connection) -> Result<Vec<i64>, CalcStoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT DISTINCT parent_id FROM {} ORDER BY parent_id",
            R::TABLE
        ))
        .map_err(|e| CalcStoreError::query(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| CalcStoreError::query(e.to_string()))?;
    let mut ids = Vec::new();
    for id in rows {
        ids.push(id.map_err(|e| CalcStoreError::query(e.to_string()))?);
    }
    Ok(ids)
}

fn find_optional<R: Relation>(
    conn: &Connection,
    parent_id: i64,
    child_id: i64,
) -> Result<Option<AssociationRecord>, CalcStoreError> {
    conn.prepare_cached(&format!(
        "SELECT {RECORD_COLUMNS} FROM {} WHERE parent_id=?1 AND child_id=?2",
        R::TABLE
    ))
    .and_then(|mut stmt| {
        stmt.query_row(params![parent_id, child_id], row_to_record)
            .optional()
    })
    .map_err(|e| CalcStoreError::query(e.to_string()))
}

fn collect_records(
    conn: &Connection,
    sql: &str,
    key: i64,
) -> Result<Vec<AssociationRecord>, CalcStoreError> {
    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(|e| CalcStoreError::query(e.to_string()))?;
    let rows = stmt
        .query_map(params![key], row_to_record)
        .map_err(|e| CalcStoreError::query(e.to_string()))?;
    let mut records = Vec::new();
    for record in rows {
        records.push(record.map_err(|e| CalcStoreError::query(e.to_string()))?);
    }
    Ok(records)
}
