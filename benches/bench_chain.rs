use std::time::Duration;

use calcstore::CalcStore;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

const SHUFFLE_SEED: u64 = 0xC4A1;
const SAMPLE_SIZE: usize = 20;
const WARM_UP: Duration = Duration::from_millis(300);
const MEASURE: Duration = Duration::from_millis(500);
const CHAIN_LENGTHS: &[usize] = &[10, 100, 1_000];

struct ChainFixture {
    store: CalcStore,
    parent: i64,
    children: Vec<i64>,
}

fn build_chain(length: usize) -> ChainFixture {
    let store = CalcStore::open_in_memory().expect("store");
    let parent = store.create_calculation("bench").expect("calc").id;
    let list = store.calculation_formulars();
    let mut children = Vec::with_capacity(length);
    for i in 0..length {
        let child = store.create_formular(&format!("f{i}")).expect("formular").id;
        list.attach(parent, child, None).expect("attach");
        children.push(child);
    }
    ChainFixture {
        store,
        parent,
        children,
    }
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_read");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for &length in CHAIN_LENGTHS {
        let fixture = build_chain(length);
        let mut order = fixture.children.clone();
        order.shuffle(&mut StdRng::seed_from_u64(SHUFFLE_SEED + length as u64));
        fixture
            .store
            .calculation_formulars()
            .reorder(fixture.parent, &order)
            .expect("reorder");
        group.bench_function(BenchmarkId::from_parameter(length), |b| {
            b.iter(|| {
                fixture
                    .store
                    .calculation_formulars()
                    .read(fixture.parent)
                    .expect("read")
            });
        });
    }
    group.finish();
}

fn bench_reorder(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_reorder");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for &length in CHAIN_LENGTHS {
        let fixture = build_chain(length);
        let mut rng = StdRng::seed_from_u64(SHUFFLE_SEED ^ length as u64);
        let mut order = fixture.children.clone();
        group.bench_function(BenchmarkId::from_parameter(length), |b| {
            b.iter(|| {
                order.shuffle(&mut rng);
                fixture
                    .store
                    .calculation_formulars()
                    .reorder(fixture.parent, &order)
                    .expect("reorder")
            });
        });
    }
    group.finish();
}

fn bench_attach_detach(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_attach_detach");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for &length in CHAIN_LENGTHS {
        let fixture = build_chain(length);
        let middle = fixture.children[length / 2];
        group.bench_function(BenchmarkId::from_parameter(length), |b| {
            let list = fixture.store.calculation_formulars();
            b.iter(|| {
                list.detach(fixture.parent, middle).expect("detach");
                list.attach(fixture.parent, middle, None).expect("attach");
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = chain_benches;
    config = Criterion::default();
    targets = bench_read, bench_reorder, bench_attach_detach
);
criterion_main!(chain_benches);
