use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use smis_core::{SparePartId, StockInId, StockOutId};
use smis_infra::reconciliation::ReconciliationEngine;
use smis_infra::reporting;
use smis_infra::store::InMemoryLedgerStore;
use smis_inventory::{
    NewSparePart, NewStockIn, NewStockOut, SparePart, StockInEntry, StockOutEntry, StockOutRevision,
};
use tokio::runtime::Runtime;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn seeded(rt: &Runtime, opening: i64) -> (ReconciliationEngine<InMemoryLedgerStore>, SparePartId) {
    let engine = ReconciliationEngine::new(InMemoryLedgerStore::new());
    let part = rt
        .block_on(engine.register_spare_part(NewSparePart {
            name: "Bench part".to_string(),
            category: "Bench".to_string(),
            quantity: opening,
            unit_price: dec!(5),
        }))
        .unwrap();
    (engine, part.id)
}

fn bench_engine_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_latency");
    let rt = runtime();
    let (engine, part) = seeded(&rt, i64::MAX / 2);

    group.bench_function("record_stock_in", |b| {
        b.iter(|| {
            rt.block_on(engine.record_stock_in(NewStockIn {
                spare_part_id: part,
                quantity: 1,
                date: day(),
            }))
            .unwrap();
        });
    });

    group.bench_function("record_stock_out", |b| {
        b.iter(|| {
            rt.block_on(engine.record_stock_out(NewStockOut {
                spare_part_id: part,
                quantity: 1,
                unit_price: dec!(7),
                date: day(),
            }))
            .unwrap();
        });
    });

    let entry = rt
        .block_on(engine.record_stock_out(NewStockOut {
            spare_part_id: part,
            quantity: 2,
            unit_price: dec!(7),
            date: day(),
        }))
        .unwrap();
    let mut quantity = 2;
    group.bench_function("revise_stock_out", |b| {
        b.iter(|| {
            quantity = if quantity == 2 { 3 } else { 2 };
            rt.block_on(engine.revise_stock_out(
                entry.id,
                StockOutRevision {
                    spare_part_id: part,
                    quantity,
                    unit_price: dec!(7),
                    date: day(),
                },
            ))
            .unwrap();
        });
    });

    group.finish();
}

fn bench_stock_status(c: &mut Criterion) {
    let mut group = c.benchmark_group("stock_status");

    for entries in [100usize, 1_000, 10_000] {
        let parts: Vec<SparePart> = (0..50)
            .map(|i| SparePart {
                id: SparePartId::new(),
                name: format!("Part {i}"),
                category: "Bench".to_string(),
                quantity: 100,
                unit_price: dec!(1.5),
            })
            .collect();
        let stock_in: Vec<StockInEntry> = (0..entries)
            .map(|i| StockInEntry {
                id: StockInId::new(),
                spare_part_id: parts[i % parts.len()].id,
                quantity: 3,
                date: day(),
            })
            .collect();
        let stock_out: Vec<StockOutEntry> = (0..entries)
            .map(|i| StockOutEntry {
                id: StockOutId::new(),
                spare_part_id: parts[(i * 7) % parts.len()].id,
                quantity: 1,
                unit_price: dec!(2),
                date: day(),
            })
            .collect();

        group.throughput(Throughput::Elements((entries * 2) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(entries), &entries, |b, _| {
            b.iter(|| black_box(reporting::stock_status(&parts, &stock_in, &stock_out)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_engine_latency, bench_stock_status);
criterion_main!(benches);
