//! Chain reconstruction: turns a parent's unordered association records back
//! into the declared order by walking `next_id` from the head.

use ahash::{AHashMap, AHashSet};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    entity::Entity,
    entity_ops::{entity_exists, get_entity},
    errors::CalcStoreError,
};

use super::{
    records::{AssociationRecord, list_by_parent},
    relation::Relation,
};

/// An association record together with the child it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEntry<C> {
    #[serde(flatten)]
    pub association: AssociationRecord,
    pub child: C,
}

/// Records of `parent_id` in chain order.
pub fn read<R: Relation>(
    conn: &Connection,
    parent_id: i64,
) -> Result<Vec<AssociationRecord>, CalcStoreError> {
    let parent_kind = <R::Parent as Entity>::KIND;
    if !entity_exists(conn, parent_kind, parent_id)? {
        return Err(CalcStoreError::not_found(format!("{parent_kind} {parent_id}")));
    }
    order_chain(list_by_parent::<R>(conn, parent_id)?)
}

/// Like [`read`], with each record's child entity loaded alongside.
pub fn read_expanded<R: Relation>(
    conn: &Connection,
    parent_id: i64,
) -> Result<Vec<ChainEntry<R::Child>>, CalcStoreError> {
    let mut entries = Vec::new();
    for association in read::<R>(conn, parent_id)? {
        let child = get_entity::<R::Child>(conn, association.child_id)?;
        entries.push(ChainEntry { association, child });
    }
    Ok(entries)
}

/// Orders the records of a single parent by following `next_id`.
///
/// Fails with `IntegrityError` unless the records form exactly one simple
/// path: every `next_id` resolves within the set, exactly one record has no
/// predecessor, no record is targeted twice, and the walk from the head
/// visits every record once.
pub fn order_chain(
    records: Vec<AssociationRecord>,
) -> Result<Vec<AssociationRecord>, CalcStoreError> {
    if records.is_empty() {
        return Ok(records);
    }
    let total = records.len();
    let mut by_id: AHashMap<i64, AssociationRecord> = AHashMap::with_capacity(total);
    for record in records {
        by_id.insert(record.id, record);
    }

    let mut targeted: AHashSet<i64> = AHashSet::with_capacity(total);
    for record in by_id.values() {
        let Some(next) = record.next_id else {
            continue;
        };
        if !by_id.contains_key(&next) {
            return Err(CalcStoreError::integrity(format!(
                "record {} points at {next}, which is not in the chain",
                record.id
            )));
        }
        if !targeted.insert(next) {
            return Err(CalcStoreError::integrity(format!(
                "record {next} has more than one predecessor"
            )));
        }
    }

    let mut heads: Vec<i64> = by_id
        .keys()
        .copied()
        .filter(|id| !targeted.contains(id))
        .collect();
    if heads.len() != 1 {
        heads.sort_unstable();
        return Err(CalcStoreError::integrity(format!(
            "expected exactly one head, found {} ({heads:?})",
            heads.len()
        )));
    }

    let mut ordered = Vec::with_capacity(total);
    let mut cursor = Some(heads[0]);
    while let Some(id) = cursor {
        let Some(record) = by_id.remove(&id) else {
            return Err(CalcStoreError::integrity(format!(
                "cycle detected at record {id}"
            )));
        };
        cursor = record.next_id;
        ordered.push(record);
    }
    if !by_id.is_empty() {
        return Err(CalcStoreError::integrity(format!(
            "{} of {total} records are unreachable from the head",
            by_id.len()
        )));
    }
    Ok(ordered)
}
