//! Attach, detach and reorder. Each function issues several statements and
//! expects to run inside one immediate transaction (see `CalcStore::write`);
//! on error the caller's transaction rolls every statement back.

use ahash::{AHashMap, AHashSet};
use rusqlite::Connection;

use crate::{entity::Entity, entity_ops::entity_exists, errors::CalcStoreError};

use super::{
    reader,
    records::{self, AssociationRecord},
    relation::Relation,
};

/// Adds `child_id` to the chain of `parent_id`.
///
/// With `before` set, the new record is linked in directly ahead of the record
/// `before` (which must belong to the same parent): it takes over the
/// predecessor's pointer and points at `before` itself. Without it, the new
/// record is appended after the current tail.
pub fn attach<R: Relation>(
    conn: &Connection,
    parent_id: i64,
    child_id: i64,
    before: Option<i64>,
) -> Result<AssociationRecord, CalcStoreError> {
    records::ensure_endpoints::<R>(conn, parent_id, child_id)?;
    let anchor = match before {
        Some(id) => Some(resolve_anchor::<R>(conn, parent_id, id)?),
        None => None,
    };
    // Resolved before the insert: the new record is itself a tail until linked.
    let tail = match anchor {
        Some(_) => None,
        None => single_tail::<R>(conn, parent_id)?,
    };

    let created = records::create::<R>(conn, parent_id, child_id)?;

    match anchor {
        Some(anchor) => {
            let predecessor = single_predecessor::<R>(conn, anchor.id)?;
            records::set_next::<R>(conn, created.id, Some(anchor.id))?;
            if let Some(predecessor) = predecessor {
                records::set_next::<R>(conn, predecessor.id, Some(created.id))?;
            }
        }
        None => {
            if let Some(tail) = tail {
                records::set_next::<R>(conn, tail.id, Some(created.id))?;
            }
        }
    }

    records::find_by_id::<R>(conn, created.id)
}

/// Removes `child_id` from the chain of `parent_id`, linking its predecessor
/// straight to its successor. Returns the removed record.
pub fn detach<R: Relation>(
    conn: &Connection,
    parent_id: i64,
    child_id: i64,
) -> Result<AssociationRecord, CalcStoreError> {
    let record = records::find_by_parent_and_child::<R>(conn, parent_id, child_id)?;
    unlink::<R>(conn, &record)?;
    Ok(record)
}

/// Rewrites the `next_id` pointers of `parent_id` so the chain follows
/// `order`, a list of child ids. `order` must name every attached child
/// exactly once; it is checked in full before anything is written.
pub fn reorder<R: Relation>(
    conn: &Connection,
    parent_id: i64,
    order: &[i64],
) -> Result<Vec<AssociationRecord>, CalcStoreError> {
    let parent_kind = <R::Parent as Entity>::KIND;
    if !entity_exists(conn, parent_kind, parent_id)? {
        return Err(CalcStoreError::not_found(format!("{parent_kind} {parent_id}")));
    }
    let current = records::list_by_parent::<R>(conn, parent_id)?;
    let by_child = validate_permutation::<R>(&current, order)?;

    for (position, child_id) in order.iter().enumerate() {
        let record = by_child[child_id];
        let wanted = order.get(position + 1).map(|next| by_child[next].id);
        if record.next_id != wanted {
            records::set_next::<R>(conn, record.id, wanted)?;
        }
    }

    reader::read::<R>(conn, parent_id)
}

/// Repoints the predecessor of `record` at its successor, then deletes it.
pub(crate) fn unlink<R: Relation>(
    conn: &Connection,
    record: &AssociationRecord,
) -> Result<(), CalcStoreError> {
    if let Some(predecessor) = single_predecessor::<R>(conn, record.id)? {
        records::set_next::<R>(conn, predecessor.id, record.next_id)?;
    }
    records::delete::<R>(conn, record.id)?;
    Ok(())
}

fn resolve_anchor<R: Relation>(
    conn: &Connection,
    parent_id: i64,
    id: i64,
) -> Result<AssociationRecord, CalcStoreError> {
    let anchor = records::find_by_id::<R>(conn, id).map_err(|err| match err {
        CalcStoreError::NotFound(_) => CalcStoreError::validation(format!(
            "next record {id} does not exist in {}",
            R::NAME
        )),
        other => other,
    })?;
    if anchor.parent_id != parent_id {
        return Err(CalcStoreError::validation(format!(
            "next record {id} belongs to parent {}, not {parent_id}",
            anchor.parent_id
        )));
    }
    Ok(anchor)
}

fn single_tail<R: Relation>(
    conn: &Connection,
    parent_id: i64,
) -> Result<Option<AssociationRecord>, CalcStoreError> {
    let mut tails = records::tails::<R>(conn, parent_id)?;
    match tails.len() {
        0 if !records::list_by_parent::<R>(conn, parent_id)?.is_empty() => {
            Err(CalcStoreError::integrity(format!(
                "parent {parent_id} in {} has records but no tail",
                R::NAME
            )))
        }
        0 | 1 => Ok(tails.pop()),
        n => Err(CalcStoreError::integrity(format!(
            "parent {parent_id} in {} has {n} tail records",
            R::NAME
        ))),
    }
}

fn single_predecessor<R: Relation>(
    conn: &Connection,
    id: i64,
) -> Result<Option<AssociationRecord>, CalcStoreError> {
    let mut found = records::predecessors::<R>(conn, id)?;
    match found.len() {
        0 | 1 => Ok(found.pop()),
        n => Err(CalcStoreError::integrity(format!(
            "record {id} in {} has {n} predecessors",
            R::NAME
        ))),
    }
}

fn validate_permutation<'a, R: Relation>(
    current: &'a [AssociationRecord],
    order: &[i64],
) -> Result<AHashMap<i64, &'a AssociationRecord>, CalcStoreError> {
    let by_child: AHashMap<i64, &AssociationRecord> =
        current.iter().map(|record| (record.child_id, record)).collect();

    let mut seen = AHashSet::with_capacity(order.len());
    for child_id in order {
        if !seen.insert(*child_id) {
            return Err(CalcStoreError::validation(format!(
                "{} {child_id} appears more than once in the new order",
                <R::Child as Entity>::KIND
            )));
        }
        if !by_child.contains_key(child_id) {
            return Err(CalcStoreError::validation(format!(
                "{} {child_id} is not attached to this {}",
                <R::Child as Entity>::KIND,
                <R::Parent as Entity>::KIND
            )));
        }
    }
    if order.len() != current.len() {
        return Err(CalcStoreError::validation(format!(
            "new order names {} of {} attached children",
            order.len(),
            current.len()
        )));
    }
    Ok(by_child)
}
