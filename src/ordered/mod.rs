//! Ordered membership chains.
//!
//! A parent's children are kept as association records linked through
//! `next_id`. The same machinery serves both relations
//! ([`CalculationFormulars`] and [`FormularNodes`]); only the [`Relation`]
//! type parameter differs.

mod mutation;
mod reader;
mod records;
mod relation;

use std::marker::PhantomData;

use crate::{errors::CalcStoreError, store::CalcStore};

pub use reader::{ChainEntry, order_chain};
pub use records::AssociationRecord;
pub use relation::{CalculationFormulars, FormularNodes, Relation, RelationKind};

pub(crate) use mutation::unlink;
pub(crate) use records::{delete_by_parent, list_by_child, list_by_parent, parent_ids};

/// Handle for one relation on a store. Every mutation runs in its own
/// immediate transaction, so concurrent callers never observe a half-linked
/// chain and a failed call leaves the store as it was.
pub struct OrderedList<'a, R: Relation> {
    store: &'a CalcStore,
    relation: PhantomData<R>,
}

impl<'a, R: Relation> OrderedList<'a, R> {
    pub(crate) fn new(store: &'a CalcStore) -> Self {
        Self {
            store,
            relation: PhantomData,
        }
    }

    /// Adds `child_id` to the chain of `parent_id`: appended at the end, or
    /// linked in directly ahead of record `before` when given.
    pub fn attach(
        &self,
        parent_id: i64,
        child_id: i64,
        before: Option<i64>,
    ) -> Result<AssociationRecord, CalcStoreError> {
        let record = self
            .store
            .write(|conn| mutation::attach::<R>(conn, parent_id, child_id, before))?;
        tracing::debug!(
            relation = R::NAME,
            parent = parent_id,
            child = child_id,
            record = record.id,
            before = ?before,
            "attached"
        );
        Ok(record)
    }

    /// Removes `child_id` from the chain of `parent_id`, joining its
    /// neighbours.
    pub fn detach(&self, parent_id: i64, child_id: i64) -> Result<(), CalcStoreError> {
        let removed = self
            .store
            .write(|conn| mutation::detach::<R>(conn, parent_id, child_id))?;
        tracing::debug!(
            relation = R::NAME,
            parent = parent_id,
            child = child_id,
            record = removed.id,
            "detached"
        );
        Ok(())
    }

    /// Relinks the chain of `parent_id` to follow `order` (child ids) and
    /// returns the records in their new order.
    pub fn reorder(
        &self,
        parent_id: i64,
        order: &[i64],
    ) -> Result<Vec<AssociationRecord>, CalcStoreError> {
        let records = self
            .store
            .write(|conn| mutation::reorder::<R>(conn, parent_id, order))
            .inspect_err(|err| log_integrity::<R>(parent_id, err))?;
        tracing::debug!(
            relation = R::NAME,
            parent = parent_id,
            children = order.len(),
            "reordered"
        );
        Ok(records)
    }

    /// Records of `parent_id` in chain order.
    pub fn read(&self, parent_id: i64) -> Result<Vec<AssociationRecord>, CalcStoreError> {
        self.store
            .read(|conn| reader::read::<R>(conn, parent_id))
            .inspect_err(|err| log_integrity::<R>(parent_id, err))
    }

    /// Records of `parent_id` in chain order, each with its child entity.
    pub fn read_expanded(
        &self,
        parent_id: i64,
    ) -> Result<Vec<ChainEntry<R::Child>>, CalcStoreError> {
        self.store
            .read(|conn| reader::read_expanded::<R>(conn, parent_id))
            .inspect_err(|err| log_integrity::<R>(parent_id, err))
    }

    /// Raw records of `parent_id`, unordered.
    pub fn records(&self, parent_id: i64) -> Result<Vec<AssociationRecord>, CalcStoreError> {
        self.store
            .read(|conn| records::list_by_parent::<R>(conn, parent_id))
    }

    pub fn find(&self, parent_id: i64, child_id: i64) -> Result<AssociationRecord, CalcStoreError> {
        self.store
            .read(|conn| records::find_by_parent_and_child::<R>(conn, parent_id, child_id))
    }

    pub fn record(&self, id: i64) -> Result<AssociationRecord, CalcStoreError> {
        self.store.read(|conn| records::find_by_id::<R>(conn, id))
    }

    /// Creates a record with no successor without linking it into the chain.
    /// Callers must follow up with [`OrderedList::set_next`] or
    /// [`OrderedList::reorder`] to keep the chain readable.
    pub fn create_record(
        &self,
        parent_id: i64,
        child_id: i64,
    ) -> Result<AssociationRecord, CalcStoreError> {
        self.store
            .write(|conn| records::create::<R>(conn, parent_id, child_id))
    }

    /// Overwrites a single record's successor pointer.
    pub fn set_next(&self, id: i64, next_id: Option<i64>) -> Result<(), CalcStoreError> {
        self.store
            .write(|conn| records::set_next::<R>(conn, id, next_id))
    }

    /// Deletes a record without repairing its predecessor. Missing records are
    /// ignored.
    pub fn delete_record(&self, id: i64) -> Result<bool, CalcStoreError> {
        self.store.write(|conn| records::delete::<R>(conn, id))
    }
}

fn log_integrity<R: Relation>(parent_id: i64, err: &CalcStoreError) {
    if let CalcStoreError::IntegrityError(detail) = err {
        tracing::warn!(
            relation = R::NAME,
            parent = parent_id,
            detail = %detail,
            "chain integrity violation"
        );
    }
}
