//! Entity records: calculations, formulars and nodes.

use std::{fmt, str::FromStr};

use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::errors::CalcStoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Calculation,
    Formular,
    Node,
}

impl EntityKind {
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Calculation => "calculations",
            EntityKind::Formular => "formulars",
            EntityKind::Node => "nodes",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Calculation => "calculation",
            EntityKind::Formular => "formular",
            EntityKind::Node => "node",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityKind {
    type Err = CalcStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calculation" | "calculations" => Ok(EntityKind::Calculation),
            "formular" | "formulars" => Ok(EntityKind::Formular),
            "node" | "nodes" => Ok(EntityKind::Node),
            other => Err(CalcStoreError::invalid_input(format!(
                "unknown entity kind {other}"
            ))),
        }
    }
}

/// A row type stored in one of the entity tables.
pub trait Entity: Sized {
    const KIND: EntityKind;
    /// Column list matching the order `from_row` reads.
    const COLUMNS: &'static str;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calculation {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formular {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: i64,
    pub name: String,
    pub node_data: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial update for a node; `None` fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    pub name: Option<String>,
    pub node_data: Option<String>,
}

impl Entity for Calculation {
    const KIND: EntityKind = EntityKind::Calculation;
    const COLUMNS: &'static str = "id, name, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Calculation {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }
}

impl Entity for Formular {
    const KIND: EntityKind = EntityKind::Formular;
    const COLUMNS: &'static str = "id, name, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Formular {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }
}

impl Entity for Node {
    const KIND: EntityKind = EntityKind::Node;
    const COLUMNS: &'static str = "id, name, node_data, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Node {
            id: row.get(0)?,
            name: row.get(1)?,
            node_data: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), CalcStoreError> {
    if name.trim().is_empty() {
        return Err(CalcStoreError::invalid_input("name must be set"));
    }
    Ok(())
}
