//! Entity CRUD for CalcStore.

use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    entity::{Calculation, Entity, EntityKind, Formular, Node, NodeUpdate, validate_name},
    errors::CalcStoreError,
    ordered::{self, CalculationFormulars, FormularNodes, Relation},
    store::CalcStore,
};

pub(crate) fn entity_exists(
    conn: &Connection,
    kind: EntityKind,
    id: i64,
) -> Result<bool, CalcStoreError> {
    let exists: Option<i64> = conn
        .prepare_cached(&format!("SELECT 1 FROM {} WHERE id=?1", kind.table()))
        .and_then(|mut stmt| stmt.query_row(params![id], |row| row.get(0)).optional())
        .map_err(|e| CalcStoreError::query(e.to_string()))?;
    Ok(exists.is_some())
}

pub(crate) fn get_entity<E: Entity>(conn: &Connection, id: i64) -> Result<E, CalcStoreError> {
    conn.prepare_cached(&format!(
        "SELECT {} FROM {} WHERE id=?1",
        E::COLUMNS,
        E::KIND.table()
    ))
    .and_then(|mut stmt| stmt.query_row(params![id], E::from_row))
    .map_err(|err| match err {
        rusqlite::Error::QueryReturnedNoRows => {
            CalcStoreError::not_found(format!("{} {id}", E::KIND))
        }
        other => CalcStoreError::query(other.to_string()),
    })
}

fn list_entities<E: Entity>(conn: &Connection) -> Result<Vec<E>, CalcStoreError> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {} FROM {} ORDER BY id",
            E::COLUMNS,
            E::KIND.table()
        ))
        .map_err(|e| CalcStoreError::query(e.to_string()))?;
    let rows = stmt
        .query_map([], E::from_row)
        .map_err(|e| CalcStoreError::query(e.to_string()))?;
    let mut entities = Vec::new();
    for entity in rows {
        entities.push(entity.map_err(|e| CalcStoreError::query(e.to_string()))?);
    }
    Ok(entities)
}

fn insert_named(conn: &Connection, kind: EntityKind, name: &str) -> Result<i64, CalcStoreError> {
    validate_name(name)?;
    conn.execute(
        &format!("INSERT INTO {}(name) VALUES(?1)", kind.table()),
        params![name],
    )
    .map_err(|e| CalcStoreError::query(e.to_string()))?;
    Ok(conn.last_insert_rowid())
}

fn rename(
    conn: &Connection,
    kind: EntityKind,
    id: i64,
    name: Option<&str>,
) -> Result<(), CalcStoreError> {
    if let Some(name) = name {
        validate_name(name)?;
    }
    let affected = conn
        .execute(
            &format!(
                "UPDATE {} SET name=COALESCE(?1, name), updated_at=CURRENT_TIMESTAMP WHERE id=?2",
                kind.table()
            ),
            params![name, id],
        )
        .map_err(|e| CalcStoreError::query(e.to_string()))?;
    if affected == 0 {
        return Err(CalcStoreError::not_found(format!("{kind} {id}")));
    }
    Ok(())
}

fn delete_row(conn: &Connection, kind: EntityKind, id: i64) -> Result<(), CalcStoreError> {
    let affected = conn
        .execute(
            &format!("DELETE FROM {} WHERE id=?1", kind.table()),
            params![id],
        )
        .map_err(|e| CalcStoreError::query(e.to_string()))?;
    if affected == 0 {
        return Err(CalcStoreError::not_found(format!("{kind} {id}")));
    }
    Ok(())
}

/// Takes `child_id` out of every chain it belongs to in `R`, repairing each.
fn unlink_child_everywhere<R: Relation>(
    conn: &Connection,
    child_id: i64,
) -> Result<usize, CalcStoreError> {
    let records = ordered::list_by_child::<R>(conn, child_id)?;
    for record in &records {
        ordered::unlink::<R>(conn, record)?;
    }
    Ok(records.len())
}

impl CalcStore {
    pub fn create_calculation(&self, name: &str) -> Result<Calculation, CalcStoreError> {
        self.write(|conn| {
            let id = insert_named(conn, EntityKind::Calculation, name)?;
            get_entity(conn, id)
        })
    }

    pub fn get_calculation(&self, id: i64) -> Result<Calculation, CalcStoreError> {
        self.read(|conn| get_entity(conn, id))
    }

    pub fn list_calculations(&self) -> Result<Vec<Calculation>, CalcStoreError> {
        self.read(list_entities::<Calculation>)
    }

    pub fn update_calculation(
        &self,
        id: i64,
        name: Option<&str>,
    ) -> Result<Calculation, CalcStoreError> {
        self.write(|conn| {
            rename(conn, EntityKind::Calculation, id, name)?;
            get_entity(conn, id)
        })
    }

    /// Deletes a calculation together with its formular chain. The formulars
    /// themselves are kept.
    pub fn delete_calculation(&self, id: i64) -> Result<(), CalcStoreError> {
        self.write(|conn| {
            ordered::delete_by_parent::<CalculationFormulars>(conn, id)?;
            delete_row(conn, EntityKind::Calculation, id)
        })
    }

    pub fn create_formular(&self, name: &str) -> Result<Formular, CalcStoreError> {
        self.write(|conn| {
            let id = insert_named(conn, EntityKind::Formular, name)?;
            get_entity(conn, id)
        })
    }

    pub fn get_formular(&self, id: i64) -> Result<Formular, CalcStoreError> {
        self.read(|conn| get_entity(conn, id))
    }

    pub fn list_formulars(&self) -> Result<Vec<Formular>, CalcStoreError> {
        self.read(list_entities::<Formular>)
    }

    pub fn update_formular(
        &self,
        id: i64,
        name: Option<&str>,
    ) -> Result<Formular, CalcStoreError> {
        self.write(|conn| {
            rename(conn, EntityKind::Formular, id, name)?;
            get_entity(conn, id)
        })
    }

    /// Deletes a formular: it is unlinked from every calculation chain that
    /// contains it, and its own node chain is dropped.
    pub fn delete_formular(&self, id: i64) -> Result<(), CalcStoreError> {
        self.write(|conn| {
            let unlinked = unlink_child_everywhere::<CalculationFormulars>(conn, id)?;
            ordered::delete_by_parent::<FormularNodes>(conn, id)?;
            delete_row(conn, EntityKind::Formular, id)?;
            tracing::debug!(formular = id, unlinked, "deleted formular");
            Ok(())
        })
    }

    pub fn create_node(&self, name: &str, node_data: &str) -> Result<Node, CalcStoreError> {
        validate_name(name)?;
        self.write(|conn| {
            conn.execute(
                "INSERT INTO nodes(name, node_data) VALUES(?1, ?2)",
                params![name, node_data],
            )
            .map_err(|e| CalcStoreError::query(e.to_string()))?;
            get_entity(conn, conn.last_insert_rowid())
        })
    }

    pub fn get_node(&self, id: i64) -> Result<Node, CalcStoreError> {
        self.read(|conn| get_entity(conn, id))
    }

    pub fn list_nodes(&self) -> Result<Vec<Node>, CalcStoreError> {
        self.read(list_entities::<Node>)
    }

    pub fn update_node(&self, id: i64, update: &NodeUpdate) -> Result<Node, CalcStoreError> {
        if let Some(name) = update.name.as_deref() {
            validate_name(name)?;
        }
        self.write(|conn| {
            let affected = conn
                .execute(
                    "UPDATE nodes SET name=COALESCE(?1, name), node_data=COALESCE(?2, node_data), \
                     updated_at=CURRENT_TIMESTAMP WHERE id=?3",
                    params![update.name, update.node_data, id],
                )
                .map_err(|e| CalcStoreError::query(e.to_string()))?;
            if affected == 0 {
                return Err(CalcStoreError::not_found(format!("node {id}")));
            }
            get_entity(conn, id)
        })
    }

    /// Deletes a node after unlinking it from every formular chain.
    pub fn delete_node(&self, id: i64) -> Result<(), CalcStoreError> {
        self.write(|conn| {
            let unlinked = unlink_child_everywhere::<FormularNodes>(conn, id)?;
            delete_row(conn, EntityKind::Node, id)?;
            tracing::debug!(node = id, unlinked, "deleted node");
            Ok(())
        })
    }
}
