use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sheetcalc_eval::{Engine, EvalConfig};

/// `A1` literal, `A{n} = A{n-1}+1` below it.
fn chain(len: u32, prune: bool) -> Engine {
    let mut engine = Engine::new(EvalConfig {
        prune_unchanged: prune,
        ..EvalConfig::default()
    });
    let sheet = engine.add_sheet("Sheet1").unwrap();
    engine.set_cell_input(sheet, 0, 0, "1").unwrap();
    for row in 1..len {
        engine
            .set_cell_input(sheet, row, 0, &format!("=A{row}+1"))
            .unwrap();
    }
    engine
}

/// `len` literals in column A summed by a single range formula in B1.
fn fan_in(len: u32) -> Engine {
    let mut engine = Engine::new(EvalConfig::default());
    let sheet = engine.add_sheet("Sheet1").unwrap();
    for row in 0..len {
        engine
            .set_cell_input(sheet, row, 0, &row.to_string())
            .unwrap();
    }
    engine
        .set_cell_input(sheet, 0, 1, &format!("=SUM(A1:A{len})"))
        .unwrap();
    engine
}

fn bench_recalc(c: &mut Criterion) {
    #[cfg(feature = "tracing")]
    sheetcalc_eval::telemetry::init_tracing();

    let mut group = c.benchmark_group("Recalc");
    for len in [100u32, 1_000, 5_000] {
        // Head edit that changes every value downstream.
        group.bench_with_input(BenchmarkId::new("Chain/HeadEdit", len), &len, |b, &len| {
            b.iter_batched(
                || chain(len, true),
                |mut engine| engine.set_cell_input(0, 0, 0, black_box("2")).unwrap(),
                BatchSize::LargeInput,
            )
        });

        // Tail edit: closure of one cell.
        let mut engine = chain(len, true);
        let mut flip = false;
        group.bench_with_input(BenchmarkId::new("Chain/TailEdit", len), &len, |b, &len| {
            b.iter(|| {
                flip = !flip;
                let raw = if flip { "=7" } else { "=8" };
                engine.set_cell_input(0, len - 1, 0, black_box(raw)).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("FanIn/Edit", len), &len, |b, &len| {
            b.iter_batched(
                || fan_in(len),
                |mut engine| engine.set_cell_input(0, len / 2, 0, black_box("-1")).unwrap(),
                BatchSize::LargeInput,
            )
        });

        group.bench_with_input(BenchmarkId::new("Chain/FullRecalc", len), &len, |b, &len| {
            let mut engine = chain(len, false);
            b.iter(|| engine.recalculate_all())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_recalc);
criterion_main!(benches);
