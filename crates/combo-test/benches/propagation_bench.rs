//! Benchmarks for combo propagation

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use combo_core::{FieldType, FieldValue, Record};
use combo_state::{FilterBuilder, UpdateEvent};
use combo_test::{account_configs, chain_configs, Scenario, ACCOUNT, CLIENT};
use combo_transport::NoLookup;

fn bench_chain_toggle(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_toggle");

    for len in [4usize, 16, 64] {
        let scenario = Scenario::new(chain_configs(len)).unwrap();
        let mut form = scenario.form(Arc::new(NoLookup)).unwrap();
        let root = FieldType::new("link0");
        let values = [
            FieldValue::single(Record::new("a", "a")),
            FieldValue::single(Record::new("b", "b")),
        ];
        let mut flip = 0;

        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                flip ^= 1;
                black_box(form.select(&root, values[flip].clone()).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_settle_pass(c: &mut Criterion) {
    let scenario = Scenario::new(chain_configs(64)).unwrap();
    let mut form = scenario.form(Arc::new(NoLookup)).unwrap();

    c.bench_function("settle_pass_64", |b| {
        b.iter(|| black_box(form.update(UpdateEvent::settle()).unwrap()))
    });
}

fn bench_register_form(c: &mut Criterion) {
    let scenario = Scenario::new(chain_configs(16)).unwrap();

    c.bench_function("register_chain_16", |b| {
        b.iter(|| black_box(scenario.form(Arc::new(NoLookup)).unwrap()))
    });
}

fn bench_filter_build(c: &mut Criterion) {
    let scenario = Scenario::new(account_configs()).unwrap();
    let mut form = scenario.form(Arc::new(NoLookup)).unwrap();
    form.set_value(&FieldType::new(CLIENT), FieldValue::single(Record::new("7", "acme")))
        .unwrap();
    let account = FieldType::new(ACCOUNT);

    c.bench_function("filter_search_request", |b| {
        b.iter(|| {
            let field = form.field(&account).unwrap();
            black_box(FilterBuilder::search_request(field, &form.view(), black_box("roo"), "_like").unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_chain_toggle,
    bench_settle_pass,
    bench_register_form,
    bench_filter_build,
);

criterion_main!(benches);
