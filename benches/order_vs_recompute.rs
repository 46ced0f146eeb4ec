use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use thunderpick::columns::{ColumnKind, ComputedColumn, ComputedColumns};
use thunderpick::ingest::ingest;
use thunderpick::order::{OrderModel, SortDirection};

fn sample_csv(rows: usize) -> String {
    let mut csv = String::from("Team Number,Auto EPA,Teleop EPA\n");
    for i in 0..rows {
        let team = i + 1;
        let auto = (i * 7) % 50;
        let teleop = (i * 13) % 80;
        csv.push_str(&format!("{team},{auto},{teleop}\n"));
    }
    csv
}

fn bench_sort_vs_recompute(c: &mut Criterion) {
    let ingested = ingest(&sample_csv(2_000)).expect("sample csv");
    let columns = ComputedColumns::new(vec![ComputedColumn {
        name: "Weighted".to_string(),
        formula: "0.4 * Auto EPA + 0.6 * Teleop EPA".to_string(),
        kind: ColumnKind::Numeric,
    }]);
    let base = columns.base_fields(&ingested.catalog);

    let mut group = c.benchmark_group("picklist");

    group.bench_function("sort_2k_rows", |b| {
        let model = OrderModel::new("Auto EPA".to_string(), SortDirection::Desc);
        b.iter(|| {
            let mut rows = ingested.rows.clone();
            model.apply_sort(&mut rows);
            black_box(rows);
        });
    });

    group.bench_function("recompute_2k_rows", |b| {
        b.iter(|| {
            let mut rows = ingested.rows.clone();
            columns.recompute(&mut rows, &base);
            black_box(rows);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_sort_vs_recompute);
criterion_main!(benches);
