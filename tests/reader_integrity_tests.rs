use calcstore::{CalcStore, CalcStoreError, run_chain_checks, run_strict_chain_checks};
use rusqlite::{Connection, params};
use tempfile::TempDir;

struct StoreContext {
    store: CalcStore,
    raw: Connection,
    parent: i64,
    children: Vec<i64>,
    records: Vec<i64>,
    _dir: TempDir,
}

/// File-backed store with one calculation holding three formulars, plus a raw
/// connection to the same file for corrupting rows behind the store's back.
fn store_context() -> StoreContext {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("calc.db");
    let store = CalcStore::open(&path).expect("store");
    let parent = store.create_calculation("calc").expect("calc").id;
    let list = store.calculation_formulars();
    let mut children = Vec::new();
    let mut records = Vec::new();
    for i in 0..3 {
        let child = store.create_formular(&format!("f{i}")).expect("formular").id;
        records.push(list.attach(parent, child, None).expect("attach").id);
        children.push(child);
    }
    let raw = Connection::open(&path).expect("raw connection");
    raw.busy_timeout(std::time::Duration::from_secs(5))
        .expect("busy timeout");
    StoreContext {
        store,
        raw,
        parent,
        children,
        records,
        _dir: dir,
    }
}

fn set_next_raw(ctx: &StoreContext, id: i64, next: Option<i64>) {
    ctx.raw
        .execute(
            "UPDATE calculation_formulars SET next_id=?1 WHERE id=?2",
            params![next, id],
        )
        .expect("raw update");
}

fn assert_integrity_error(ctx: &StoreContext) {
    let err = ctx
        .store
        .calculation_formulars()
        .read(ctx.parent)
        .unwrap_err();
    assert!(
        matches!(err, CalcStoreError::IntegrityError(_)),
        "unexpected {err}"
    );
}

#[test]
fn test_clean_chain_passes_checks() {
    let ctx = store_context();
    let report = run_chain_checks(&ctx.store).expect("checks");
    assert!(!report.has_issues());
    assert_eq!(report.calculation_formulars.total_records, 3);
    assert!(run_strict_chain_checks(&ctx.store).is_ok());
}

#[test]
fn test_read_follows_pointers_not_insertion_order() {
    let ctx = store_context();
    // Rewire by hand to [r2, r0, r1].
    set_next_raw(&ctx, ctx.records[2], Some(ctx.records[0]));
    set_next_raw(&ctx, ctx.records[0], Some(ctx.records[1]));
    set_next_raw(&ctx, ctx.records[1], None);

    let order: Vec<i64> = ctx
        .store
        .calculation_formulars()
        .read(ctx.parent)
        .expect("read")
        .iter()
        .map(|r| r.child_id)
        .collect();
    assert_eq!(order, vec![ctx.children[2], ctx.children[0], ctx.children[1]]);
}

#[test]
fn test_dangling_pointer_is_integrity_error() {
    let ctx = store_context();
    set_next_raw(&ctx, ctx.records[2], Some(99_999));
    assert_integrity_error(&ctx);

    let report = run_chain_checks(&ctx.store).expect("checks");
    assert_eq!(report.calculation_formulars.dangling_next, 1);
    assert_eq!(report.calculation_formulars.broken_parents, vec![ctx.parent]);
}

#[test]
fn test_fork_is_integrity_error() {
    let ctx = store_context();
    // r0 and r1 both point at r2; r1 no longer points anywhere else.
    set_next_raw(&ctx, ctx.records[0], Some(ctx.records[2]));
    assert_integrity_error(&ctx);

    let report = run_chain_checks(&ctx.store).expect("checks");
    assert_eq!(report.calculation_formulars.forked_next, 1);
}

#[test]
fn test_cycle_is_integrity_error() {
    let ctx = store_context();
    set_next_raw(&ctx, ctx.records[2], Some(ctx.records[0]));
    assert_integrity_error(&ctx);
}

#[test]
fn test_self_loop_is_integrity_error() {
    let ctx = store_context();
    set_next_raw(&ctx, ctx.records[1], Some(ctx.records[1]));
    assert_integrity_error(&ctx);

    let report = run_chain_checks(&ctx.store).expect("checks");
    assert_eq!(report.calculation_formulars.self_loops, 1);
}

#[test]
fn test_cross_parent_pointer_is_integrity_error() {
    let ctx = store_context();
    let other = ctx.store.create_calculation("other").expect("other").id;
    let foreign = ctx
        .store
        .calculation_formulars()
        .attach(other, ctx.children[0], None)
        .expect("attach");
    set_next_raw(&ctx, ctx.records[2], Some(foreign.id));
    assert_integrity_error(&ctx);

    let err = run_strict_chain_checks(&ctx.store).unwrap_err();
    assert_eq!(err.report.calculation_formulars.cross_parent_next, 1);
}

#[test]
fn test_attach_on_broken_chain_fails_without_writing() {
    let ctx = store_context();
    // Two tails.
    set_next_raw(&ctx, ctx.records[0], None);
    let extra = ctx.store.create_formular("extra").expect("extra").id;

    let err = ctx
        .store
        .calculation_formulars()
        .attach(ctx.parent, extra, None)
        .unwrap_err();
    assert!(matches!(err, CalcStoreError::IntegrityError(_)));
    assert_eq!(
        ctx.store
            .calculation_formulars()
            .records(ctx.parent)
            .expect("records")
            .len(),
        3
    );
}

#[test]
fn test_append_to_tailless_chain_fails_without_writing() {
    let ctx = store_context();
    let list = ctx.store.calculation_formulars();
    // Close the loop: r2 -> r0 leaves every record with a successor.
    list.set_next(ctx.records[2], Some(ctx.records[0]))
        .expect("set_next");
    let extra = ctx.store.create_formular("extra").expect("extra").id;

    let err = list.attach(ctx.parent, extra, None).unwrap_err();
    assert!(
        matches!(err, CalcStoreError::IntegrityError(_)),
        "unexpected {err}"
    );
    assert_eq!(list.records(ctx.parent).expect("records").len(), 3);
    assert!(matches!(
        list.find(ctx.parent, extra).unwrap_err(),
        CalcStoreError::NotFound(_)
    ));
}

#[test]
fn test_reorder_relinks_a_broken_chain() {
    let ctx = store_context();
    set_next_raw(&ctx, ctx.records[0], None);
    assert_integrity_error(&ctx);

    let order = [ctx.children[1], ctx.children[2], ctx.children[0]];
    let records = ctx
        .store
        .calculation_formulars()
        .reorder(ctx.parent, &order)
        .expect("reorder");
    let children: Vec<i64> = records.iter().map(|r| r.child_id).collect();
    assert_eq!(children, order);
    assert!(run_strict_chain_checks(&ctx.store).is_ok());
}

#[test]
fn test_store_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("reopen.db");
    let (parent, order) = {
        let store = CalcStore::open(&path).expect("store");
        let parent = store.create_calculation("calc").expect("calc").id;
        let a = store.create_formular("a").expect("a").id;
        let b = store.create_formular("b").expect("b").id;
        let list = store.calculation_formulars();
        list.attach(parent, a, None).expect("a");
        list.attach(parent, b, None).expect("b");
        list.reorder(parent, &[b, a]).expect("reorder");
        store.close().expect("close");
        (parent, vec![b, a])
    };

    let store = CalcStore::open(&path).expect("reopen");
    let children: Vec<i64> = store
        .calculation_formulars()
        .read(parent)
        .expect("read")
        .iter()
        .map(|r| r.child_id)
        .collect();
    assert_eq!(children, order);
}
