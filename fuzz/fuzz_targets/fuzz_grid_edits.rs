#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use panelgrid_layout::{
    ContainerExtent, GridLayout, PointerPosition, ResizeSession, TemplateCatalog, add_cell,
    add_row, assign_panel, convert, delete_cell, delete_row,
};

#[derive(Debug, Arbitrary)]
enum Op {
    AddRow,
    AddCell { row: u8 },
    DeleteCell { row: u8, cell: u8 },
    DeleteRow { row: u8 },
    Assign { row: u8, cell: u8 },
    DragColumn { row: u8, cell: u8, dx: i16, commit: bool },
    DragRow { row: u8, dy: i16, commit: bool },
}

#[derive(Debug, Arbitrary)]
struct Input {
    template: u8,
    ops: Vec<Op>,
}

const EXTENT: ContainerExtent = ContainerExtent {
    width: 1200.0,
    height: 800.0,
};

fn pick(len: usize, raw: u8) -> usize {
    if len == 0 { 0 } else { usize::from(raw) % len }
}

fn apply(layout: &mut GridLayout, op: &Op) {
    let rows = layout.rows().len();
    match *op {
        Op::AddRow => {
            if rows < 12 {
                add_row(layout);
            }
        }
        Op::AddCell { row } => {
            let _ = add_cell(layout, pick(rows, row));
        }
        Op::DeleteCell { row, cell } => {
            let row = pick(rows, row);
            let cells = layout.row(row).map_or(0, |r| r.cells.len());
            let _ = delete_cell(layout, row, pick(cells, cell));
        }
        Op::DeleteRow { row } => {
            let _ = delete_row(layout, pick(rows, row));
        }
        Op::Assign { row, cell } => {
            let row = pick(rows, row);
            let cells = layout.row(row).map_or(0, |r| r.cells.len());
            let _ = assign_panel(layout, row, pick(cells, cell), "camera", "Camera");
        }
        Op::DragColumn { row, cell, dx, commit } => {
            let row = pick(rows, row);
            let cells = layout.row(row).map_or(0, |r| r.cells.len());
            let start = PointerPosition::new(600.0, 400.0);
            let Ok(mut session) =
                ResizeSession::begin_column(layout, row, pick(cells, cell), start)
            else {
                return;
            };
            let end = PointerPosition::new(600.0 + f64::from(dx), 400.0);
            let _ = session.update(layout, end, &EXTENT);
            if commit {
                let _ = session.commit(layout);
            } else {
                let _ = session.cancel(layout);
            }
        }
        Op::DragRow { row, dy, commit } => {
            let start = PointerPosition::new(600.0, 400.0);
            let Ok(mut session) = ResizeSession::begin_row(layout, pick(rows, row), start) else {
                return;
            };
            let end = PointerPosition::new(600.0, 400.0 + f64::from(dy));
            let _ = session.update(layout, end, &EXTENT);
            if commit {
                let _ = session.commit(layout);
            } else {
                let _ = session.cancel(layout);
            }
        }
    }
}

fuzz_target!(|input: Input| {
    let catalog = TemplateCatalog::builtin();
    let ids = catalog.ids();
    let id = ids[usize::from(input.template) % ids.len()];
    let Ok(definition) = catalog.build(id, false) else {
        return;
    };
    let mut layout = definition.layouts.desktop.clone();

    for op in input.ops.iter().take(64) {
        apply(&mut layout, op);
        let report = layout.invariant_report();
        assert!(report.is_clean(), "{op:?} broke invariants: {report:?}");
        let _ = convert(&layout);
    }
});
