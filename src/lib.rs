//! SQLite-backed store for calculations, formulars and nodes.
//!
//! A calculation holds an ordered list of formulars and a formular holds an
//! ordered list of nodes. Each list is kept as a chain of association records,
//! every record pointing at the one that follows it (`next_id`); the last
//! record points nowhere.
//!
//! # Quick Start
//!
//! ```rust
//! use calcstore::CalcStore;
//!
//! let store = CalcStore::open_in_memory()?;
//! let calc = store.create_calculation("payroll")?;
//! let gross = store.create_formular("gross")?;
//! let net = store.create_formular("net")?;
//!
//! let chain = store.calculation_formulars();
//! chain.attach(calc.id, gross.id, None)?;
//! chain.attach(calc.id, net.id, None)?;
//! chain.reorder(calc.id, &[net.id, gross.id])?;
//!
//! let order: Vec<i64> = chain.read(calc.id)?.iter().map(|r| r.child_id).collect();
//! assert_eq!(order, vec![net.id, gross.id]);
//! # Ok::<(), calcstore::CalcStoreError>(())
//! ```
//!
//! # Guarantees
//!
//! - Every mutation runs in one immediate SQLite transaction. A failed call
//!   leaves the store exactly as it was.
//! - After any successful mutation, each parent's records form one simple
//!   path: one head, one tail, no forks, no cycles.
//! - Reads never repair a broken chain; they fail with
//!   [`CalcStoreError::IntegrityError`] instead. Use [`run_chain_checks`] to
//!   audit a database.
//!
//! # Public API Organization
//!
//! - [`CalcStore`] - store handle; entity CRUD and the two chain handles
//! - [`OrderedList`] - attach, detach, reorder and read for one relation
//! - [`StoreConfig`] / [`open_store`] - configured opening
//! - [`run_chain_checks`] / [`run_strict_chain_checks`] - chain audit
//! - [`cli`] - argument parsing and dispatch behind the `calcstore` binary

pub mod cli;
pub mod config;
pub mod entity;
mod entity_ops;
pub mod errors;
pub mod integrity;
pub mod ordered;
pub mod schema;
mod store;

pub use crate::config::{Database, StoreConfig, open_store};
pub use crate::entity::{Calculation, Entity, EntityKind, Formular, Node, NodeUpdate};
pub use crate::errors::CalcStoreError;
pub use crate::integrity::{
    ChainCheckError, ChainReport, IntegrityReport, run_chain_checks, run_strict_chain_checks,
};
pub use crate::ordered::{
    AssociationRecord, CalculationFormulars, ChainEntry, FormularNodes, OrderedList, Relation,
    RelationKind,
};
pub use crate::schema::{MigrationReport, SCHEMA_VERSION};
pub use crate::store::CalcStore;
