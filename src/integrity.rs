//! Chain audit over both association tables.

use std::{fmt, result};

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::{
    errors::CalcStoreError,
    ordered::{self, CalculationFormulars, FormularNodes, Relation},
    store::CalcStore,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub relation: &'static str,
    pub total_records: i64,
    pub dangling_next: i64,
    pub cross_parent_next: i64,
    pub forked_next: i64,
    pub self_loops: i64,
    pub duplicate_pairs: i64,
    /// Parents whose records do not reconstruct into a single chain.
    pub broken_parents: Vec<i64>,
}

impl ChainReport {
    pub fn has_issues(&self) -> bool {
        self.dangling_next > 0
            || self.cross_parent_next > 0
            || self.forked_next > 0
            || self.self_loops > 0
            || self.duplicate_pairs > 0
            || !self.broken_parents.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub calculation_formulars: ChainReport,
    pub formular_nodes: ChainReport,
}

impl IntegrityReport {
    pub fn has_issues(&self) -> bool {
        self.calculation_formulars.has_issues() || self.formular_nodes.has_issues()
    }
}

#[derive(Debug)]
pub struct ChainCheckError {
    pub report: IntegrityReport,
    pub source: Option<CalcStoreError>,
}

impl fmt::Display for ChainCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain integrity violations detected")
    }
}

impl std::error::Error for ChainCheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| err as &dyn std::error::Error)
    }
}

pub fn run_chain_checks(store: &CalcStore) -> Result<IntegrityReport, CalcStoreError> {
    store.read(|conn| {
        Ok(IntegrityReport {
            calculation_formulars: check_relation::<CalculationFormulars>(conn)?,
            formular_nodes: check_relation::<FormularNodes>(conn)?,
        })
    })
}

pub fn run_strict_chain_checks(store: &CalcStore) -> result::Result<(), ChainCheckError> {
    let report = run_chain_checks(store).map_err(|err| ChainCheckError {
        report: IntegrityReport::default(),
        source: Some(err),
    })?;
    if report.has_issues() {
        Err(ChainCheckError {
            report,
            source: None,
        })
    } else {
        Ok(())
    }
}

fn check_relation<R: Relation>(conn: &Connection) -> Result<ChainReport, CalcStoreError> {
    let table = R::TABLE;
    let mut report = ChainReport {
        relation: R::NAME,
        total_records: query_single(conn, &format!("SELECT COUNT(*) FROM {table}"))?,
        ..ChainReport::default()
    };
    report.dangling_next = query_single(
        conn,
        &format!(
            "SELECT COUNT(*) FROM {table} r \
             LEFT JOIN {table} n ON n.id = r.next_id \
             WHERE r.next_id IS NOT NULL AND n.id IS NULL"
        ),
    )?;
    report.cross_parent_next = query_single(
        conn,
        &format!(
            "SELECT COUNT(*) FROM {table} r \
             JOIN {table} n ON n.id = r.next_id \
             WHERE n.parent_id <> r.parent_id"
        ),
    )?;
    report.forked_next = query_single(
        conn,
        &format!(
            "SELECT COUNT(*) FROM (\
                 SELECT next_id FROM {table} WHERE next_id IS NOT NULL \
                 GROUP BY next_id HAVING COUNT(*) > 1\
             )"
        ),
    )?;
    report.self_loops = query_single(
        conn,
        &format!("SELECT COUNT(*) FROM {table} WHERE next_id = id"),
    )?;
    report.duplicate_pairs = query_single(
        conn,
        &format!(
            "SELECT COALESCE(SUM(cnt - 1), 0) FROM (\
                 SELECT COUNT(*) AS cnt FROM {table} \
                 GROUP BY parent_id, child_id HAVING cnt > 1\
             )"
        ),
    )?;
    for parent_id in ordered::parent_ids::<R>(conn)? {
        let records = ordered::list_by_parent::<R>(conn, parent_id)?;
        if ordered::order_chain(records).is_err() {
            report.broken_parents.push(parent_id);
        }
    }
    if report.has_issues() {
        tracing::warn!(
            relation = R::NAME,
            dangling = report.dangling_next,
            cross_parent = report.cross_parent_next,
            forked = report.forked_next,
            self_loops = report.self_loops,
            broken = report.broken_parents.len(),
            "chain audit found problems"
        );
    }
    Ok(report)
}

fn query_single(conn: &Connection, sql: &str) -> Result<i64, CalcStoreError> {
    conn.query_row(sql, [], |row| row.get(0))
        .optional()
        .map(|opt| opt.unwrap_or(0))
        .map_err(|e| CalcStoreError::query(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_store_has_no_issues() {
        let store = CalcStore::open_in_memory().unwrap();
        let calc = store.create_calculation("c").unwrap();
        let f1 = store.create_formular("f1").unwrap();
        let f2 = store.create_formular("f2").unwrap();
        let chain = store.calculation_formulars();
        chain.attach(calc.id, f1.id, None).unwrap();
        chain.attach(calc.id, f2.id, None).unwrap();

        let report = run_chain_checks(&store).unwrap();
        assert!(!report.has_issues());
        assert_eq!(report.calculation_formulars.total_records, 2);
        assert_eq!(report.formular_nodes.total_records, 0);
        assert!(run_strict_chain_checks(&store).is_ok());
    }

    #[test]
    fn raw_record_without_link_breaks_chain() {
        let store = CalcStore::open_in_memory().unwrap();
        let calc = store.create_calculation("c").unwrap();
        let f1 = store.create_formular("f1").unwrap();
        let f2 = store.create_formular("f2").unwrap();
        let chain = store.calculation_formulars();
        chain.attach(calc.id, f1.id, None).unwrap();
        // Second head: created but never linked.
        chain.create_record(calc.id, f2.id).unwrap();

        let err = run_strict_chain_checks(&store).unwrap_err();
        assert!(err.source.is_none());
        assert_eq!(err.report.calculation_formulars.broken_parents, vec![calc.id]);
    }
}
