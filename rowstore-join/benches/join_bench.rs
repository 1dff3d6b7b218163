//! Benchmarks for the join result container.
//!
//! A synthetic equi-join of two 10k row tables where every left row matches
//! one right row and a quarter of the rows on each side stay unmatched.
//! Compares pass-through and deferred unmatched collection, with and without
//! match de-duplication.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use rowstore_join::{
    InputTable, JoinContainer, JoinContainerOptions, JoinSpecification, JoinTableSettings,
};
use rowstore_storage::{BufferedTable, DataCell, DataRow, DefaultExecutionContext, TableSpec};

const ROWS: u64 = 10_000;

fn table(prefix: &str) -> BufferedTable {
    let rows = (0..ROWS)
        .map(|i| {
            DataRow::new(
                format!("{prefix}{i}"),
                vec![DataCell::from(i as i64), DataCell::from(format!("v{}", i % 31))],
            )
        })
        .collect();
    BufferedTable::from_rows(TableSpec::from_names(["id", "value"]), rows).unwrap()
}

fn run(left: &BufferedTable, right: &BufferedTable, deferred: bool, dedup: bool) -> u64 {
    let left_rows = left.rows().unwrap();
    let right_rows = right.rows().unwrap();
    let spec = JoinSpecification::new(
        JoinTableSettings::for_table(left.clone()).with_retain_unmatched(true),
        JoinTableSettings::for_table(right.clone()).with_retain_unmatched(true),
    );
    let ctx = Arc::new(DefaultExecutionContext::default());
    let mut join = JoinContainer::split(spec, ctx, JoinContainerOptions::default()).unwrap();
    if deferred {
        join.defer_unmatched_rows(InputTable::Left).unwrap();
        join.defer_unmatched_rows(InputTable::Right).unwrap();
    }
    if dedup {
        join.deduplicate_matches();
    }

    let unmatched_from = ROWS * 3 / 4;
    for offset in 0..ROWS {
        let idx = offset as usize;
        if offset < unmatched_from {
            join.offer_match(&left_rows[idx], offset, &right_rows[idx], offset)
                .unwrap();
        } else {
            join.offer_left_outer(&left_rows[idx], offset).unwrap();
            join.offer_right_outer(&right_rows[idx], offset).unwrap();
        }
    }
    let out = join.finish().unwrap();
    out.tables.matches.row_count() + out.tables.left_unmatched.row_count()
}

fn bench_join_container(c: &mut Criterion) {
    let left = table("l");
    let right = table("r");
    let mut group = c.benchmark_group("join_container_10k");
    group.throughput(Throughput::Elements(ROWS));

    for (name, deferred, dedup) in [
        ("pass_through", false, false),
        ("pass_through_dedup", false, true),
        ("deferred", true, false),
        ("deferred_dedup", true, true),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(run(&left, &right, deferred, dedup)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_join_container);
criterion_main!(benches);
