//! Benchmarks for position conversion, template building, and drag resizing.
//!
//! Run with: cargo bench -p panelgrid-layout

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use panelgrid_layout::{
    Cell, ContainerExtent, GridLayout, PointerPosition, PositionCache, ResizeSession, Row,
    TemplateCatalog, build_layout, convert,
};
use std::hint::black_box;

/// Build a layout with `rows` rows of four equal cells each.
fn make_layout(rows: usize) -> GridLayout {
    let height = 100.0 / rows as f64;
    GridLayout::new(
        (0..rows)
            .map(|r| {
                Row::new(
                    format!("row-{r}"),
                    height,
                    (0..4)
                        .map(|c| Cell::new(format!("cell-{r}-{c}"), "camera", 25.0))
                        .collect(),
                )
            })
            .collect(),
    )
}

fn bench_convert_builtins(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert/builtin");
    let catalog = TemplateCatalog::builtin();

    for template in catalog.iter() {
        let layout = build_layout(template);
        group.bench_with_input(
            BenchmarkId::from_parameter(&template.id),
            &layout,
            |b, layout| b.iter(|| black_box(convert(layout))),
        );
    }

    group.finish();
}

fn bench_convert_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert/rows");

    for rows in [1, 4, 16, 64] {
        let layout = make_layout(rows);
        group.bench_with_input(BenchmarkId::new("four_cells", rows), &layout, |b, layout| {
            b.iter(|| black_box(convert(layout)))
        });
    }

    group.finish();
}

fn bench_position_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert/cache");
    let layout = make_layout(16);

    group.bench_function("hit", |b| {
        let mut cache = PositionCache::new();
        let _ = cache.positions(&layout);
        b.iter(|| black_box(cache.positions(&layout).len()))
    });

    group.bench_function("miss", |b| {
        let mut cache = PositionCache::new();
        b.iter(|| {
            cache.invalidate();
            black_box(cache.positions(&layout).len())
        })
    });

    group.finish();
}

fn bench_build_templates(c: &mut Criterion) {
    let catalog = TemplateCatalog::builtin();
    c.bench_function("template/build_all", |b| {
        b.iter(|| {
            for template in catalog.iter() {
                black_box(build_layout(template));
            }
        })
    });
}

fn bench_column_drag(c: &mut Criterion) {
    let extent = ContainerExtent {
        width: 1200.0,
        height: 800.0,
    };
    c.bench_function("resize/column_drag_32_moves", |b| {
        b.iter_batched(
            || make_layout(4),
            |mut layout| {
                let mut session =
                    ResizeSession::begin_column(&layout, 0, 0, PointerPosition::new(300.0, 10.0))
                        .expect("divider exists");
                for step in 0..32 {
                    let x = 300.0 + f64::from(step) * 7.5;
                    let _ = session.update(&mut layout, PointerPosition::new(x, 10.0), &extent);
                }
                black_box(session.commit(&mut layout).expect("target intact"))
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_convert_builtins,
    bench_convert_rows,
    bench_position_cache,
    bench_build_templates,
    bench_column_drag
);
criterion_main!(benches);
