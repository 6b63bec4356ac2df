use calcstore::{CalcStore, CalcStoreError, run_strict_chain_checks};
use proptest::prelude::*;

const POOL: usize = 8;

#[derive(Clone, Debug)]
enum Op {
    Attach { child: usize, before: Option<usize> },
    Detach { child: usize },
    Reorder { keys: Vec<u8> },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..POOL, proptest::option::of(0..POOL))
            .prop_map(|(child, before)| Op::Attach { child, before }),
        2 => (0..POOL).prop_map(|child| Op::Detach { child }),
        1 => proptest::collection::vec(any::<u8>(), 1..POOL)
            .prop_map(|keys| Op::Reorder { keys }),
    ]
}

fn read_children(store: &CalcStore, parent: i64) -> Vec<i64> {
    store
        .calculation_formulars()
        .read(parent)
        .expect("read")
        .iter()
        .map(|r| r.child_id)
        .collect()
}

/// Applies `op` to the store and to `model` (the expected child order).
fn apply(store: &CalcStore, parent: i64, pool: &[i64], model: &mut Vec<i64>, op: &Op) {
    let list = store.calculation_formulars();
    match op {
        Op::Attach { child, before } => {
            let child = pool[*child];
            if model.contains(&child) {
                let err = list.attach(parent, child, None).unwrap_err();
                assert!(matches!(err, CalcStoreError::ValidationError(_)));
                return;
            }
            match (*before).filter(|_| !model.is_empty()) {
                Some(pos) => {
                    let pos = pos % model.len();
                    let anchor = list.find(parent, model[pos]).expect("anchor");
                    list.attach(parent, child, Some(anchor.id)).expect("attach");
                    model.insert(pos, child);
                }
                None => {
                    list.attach(parent, child, None).expect("attach");
                    model.push(child);
                }
            }
        }
        Op::Detach { child } => {
            let child = pool[*child];
            match model.iter().position(|c| *c == child) {
                Some(pos) => {
                    list.detach(parent, child).expect("detach");
                    model.remove(pos);
                }
                None => {
                    let err = list.detach(parent, child).unwrap_err();
                    assert!(matches!(err, CalcStoreError::NotFound(_)));
                }
            }
        }
        Op::Reorder { keys } => {
            let mut keyed: Vec<(u8, i64)> = model
                .iter()
                .enumerate()
                .map(|(i, c)| (keys[i % keys.len()], *c))
                .collect();
            keyed.sort_by_key(|(key, _)| *key);
            let order: Vec<i64> = keyed.into_iter().map(|(_, c)| c).collect();
            let records = list.reorder(parent, &order).expect("reorder");
            let returned: Vec<i64> = records.iter().map(|r| r.child_id).collect();
            assert_eq!(returned, order);
            *model = order;
        }
    }
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(64))]

    #[test]
    fn chain_matches_model_after_any_operation_sequence(
        ops in proptest::collection::vec(arb_op(), 1..40)
    ) {
        let store = CalcStore::open_in_memory().expect("store");
        let parent = store.create_calculation("calc").expect("calc").id;
        let pool: Vec<i64> = (0..POOL)
            .map(|i| store.create_formular(&format!("f{i}")).expect("formular").id)
            .collect();
        let mut model = Vec::new();

        for op in &ops {
            apply(&store, parent, &pool, &mut model, op);
            prop_assert_eq!(read_children(&store, parent), model.clone());
        }
        prop_assert!(run_strict_chain_checks(&store).is_ok());
    }

    #[test]
    fn reorder_then_read_yields_the_permutation(
        keys in proptest::collection::vec(any::<u16>(), 1..12)
    ) {
        let store = CalcStore::open_in_memory().expect("store");
        let parent = store.create_calculation("calc").expect("calc").id;
        let list = store.calculation_formulars();
        let mut children = Vec::new();
        for i in 0..keys.len() {
            let f = store.create_formular(&format!("f{i}")).expect("formular").id;
            list.attach(parent, f, None).expect("attach");
            children.push(f);
        }

        let mut keyed: Vec<(u16, i64)> = keys.iter().copied().zip(children).collect();
        keyed.sort();
        let order: Vec<i64> = keyed.into_iter().map(|(_, c)| c).collect();

        list.reorder(parent, &order).expect("reorder");
        prop_assert_eq!(read_children(&store, parent), order);
    }
}
