#![forbid(unsafe_code)]

//! Structural edits on a [`GridLayout`]: add and delete rows and cells,
//! and assign a device to a cell.
//!
//! # Invariants
//!
//! After every successful edit:
//! 1. every row has at least one cell of its own; a row left with none is
//!    removed and spans crossing it are shortened;
//! 2. each row's coverage (own cells plus covering spans) is 100;
//! 3. row heights sum to 100 when any row remains;
//! 4. `panel_ids` matches the cells present.
//!
//! # Failure Modes
//!
//! Out-of-range row or cell indices return [`EditError`] and leave the
//! layout untouched.

use std::fmt;

use crate::model::{
    ANY_DEVICE, Cell, CellSpan, GridLayout, PERCENT_TOLERANCE, Row, covering_spans, rescale,
};

/// Name given to cells created by edits.
pub const EMPTY_CELL_NAME: &str = "Empty";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditError {
    RowOutOfRange { row: usize, rows: usize },
    CellOutOfRange { row: usize, cell: usize, cells: usize },
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowOutOfRange { row, rows } => {
                write!(f, "row {row} out of range (layout has {rows} rows)")
            }
            Self::CellOutOfRange { row, cell, cells } => {
                write!(f, "cell {cell} out of range (row {row} has {cells} cells)")
            }
        }
    }
}

impl std::error::Error for EditError {}

fn check_row(layout: &GridLayout, row: usize) -> Result<&Row, EditError> {
    layout.row(row).ok_or(EditError::RowOutOfRange {
        row,
        rows: layout.rows().len(),
    })
}

fn check_cell(layout: &GridLayout, row: usize, cell: usize) -> Result<(), EditError> {
    let cells = check_row(layout, row)?.cells.len();
    if cell < cells {
        Ok(())
    } else {
        Err(EditError::CellOutOfRange { row, cell, cells })
    }
}

/// Smallest `"{prefix}-{n}"` (n >= 1) not in `taken`.
fn next_id<'a>(prefix: &str, taken: impl Iterator<Item = &'a str> + Clone) -> String {
    (1usize..)
        .map(|n| format!("{prefix}-{n}"))
        .find(|candidate| !taken.clone().any(|id| id == candidate.as_str()))
        .unwrap_or_else(|| format!("{prefix}-0"))
}

fn next_cell_id(layout: &GridLayout) -> String {
    next_id("cell", layout.panel_ids().iter().map(String::as_str))
}

fn next_row_id(layout: &GridLayout) -> String {
    next_id("row", layout.rows().iter().map(|row| row.id.as_str()))
}

/// Append a row holding one full-width empty cell. Returns the new cell id.
pub fn add_row(layout: &mut GridLayout) -> String {
    let row_id = next_row_id(layout);
    let cell_id = next_cell_id(layout);
    let cell = Cell::new(cell_id.clone(), ANY_DEVICE, 100.0).with_name(EMPTY_CELL_NAME);

    layout.update_rows(|rows| {
        let existing = rows.len() as f64;
        let new_height = 100.0 / (existing + 1.0);
        let heights: Vec<f64> = rows.iter().map(|row| row.height).collect();
        for (row, height) in rows.iter_mut().zip(rescale(&heights, 100.0 - new_height)) {
            row.height = height;
        }
        rows.push(Row::new(row_id, new_height, vec![cell]));
    });

    tracing::debug!(cell = %cell_id, rows = layout.rows().len(), "row added");
    cell_id
}

/// Append an empty cell to `row` and split the row's free width evenly
/// across its own cells. Returns the new cell id.
pub fn add_cell(layout: &mut GridLayout, row: usize) -> Result<String, EditError> {
    check_row(layout, row)?;
    let cell_id = next_cell_id(layout);
    let cell = Cell::new(cell_id.clone(), ANY_DEVICE, 0.0).with_name(EMPTY_CELL_NAME);

    layout.update_rows(|rows| {
        rows[row].cells.push(cell);
        split_evenly(rows, row);
        settle(rows);
    });

    tracing::debug!(row, cell = %cell_id, "cell added");
    Ok(cell_id)
}

/// Remove a cell. Remaining cells in its row grow proportionally; rows that
/// lose the cell's span are refilled; rows left empty are removed.
pub fn delete_cell(layout: &mut GridLayout, row: usize, cell: usize) -> Result<Cell, EditError> {
    check_cell(layout, row, cell)?;
    let was_marker = layout.is_continuation(row, cell);

    let removed = layout.update_rows(|rows| {
        let removed = rows[row].cells.remove(cell);
        if !was_marker {
            let span = usize::from(removed.row_span());
            drop_markers(rows, &removed.id, row + 1..row + span);
        }
        settle(rows);
        removed
    });

    tracing::debug!(row, cell = %removed.id, "cell deleted");
    Ok(removed)
}

/// Remove a row. Spans from earlier rows that crossed it are shortened,
/// spans starting in it stop covering the rows below, and the remaining
/// heights are rescaled to 100.
pub fn delete_row(layout: &mut GridLayout, row: usize) -> Result<Row, EditError> {
    check_row(layout, row)?;
    let removed = layout.update_rows(|rows| {
        let removed = remove_row_at(rows, row);
        settle(rows);
        removed
    });

    tracing::debug!(row = %removed.id, rows = layout.rows().len(), "row deleted");
    Ok(removed)
}

/// Put a device (or `"any"`) into a cell.
pub fn assign_panel(
    layout: &mut GridLayout,
    row: usize,
    cell: usize,
    device_type: impl Into<String>,
    name: impl Into<String>,
) -> Result<(), EditError> {
    check_cell(layout, row, cell)?;
    let (device_type, name) = (device_type.into(), name.into());
    layout.update_rows(|rows| {
        let target = &mut rows[row].cells[cell];
        target.device_type = device_type;
        target.name = name;
    });
    Ok(())
}

// =========================================================================
// Repair helpers
// =========================================================================

/// Indices of the row's own cells (not continuation markers) and the width
/// left for them.
fn own_cells(rows: &[Row], row_index: usize) -> (Vec<usize>, f64) {
    let covering = covering_spans(rows, row_index);
    let carried: f64 = covering.iter().map(|(_, width)| width).sum();
    let own = rows[row_index]
        .cells
        .iter()
        .enumerate()
        .filter(|(_, cell)| !covering.iter().any(|(id, _)| *id == cell.id))
        .map(|(index, _)| index)
        .collect();
    (own, (100.0 - carried).max(0.0))
}

fn split_evenly(rows: &mut [Row], row_index: usize) {
    let (own, available) = own_cells(rows, row_index);
    if own.is_empty() {
        return;
    }
    let share = available / own.len() as f64;
    for index in own {
        rows[row_index].cells[index].set_width(share);
    }
}

/// Rescale the own cells of every row whose coverage drifted.
pub(crate) fn repair_widths(rows: &mut [Row]) {
    for row_index in 0..rows.len() {
        let (own, available) = own_cells(rows, row_index);
        if own.is_empty() {
            continue;
        }
        let widths: Vec<f64> = own
            .iter()
            .map(|&index| rows[row_index].cells[index].width())
            .collect();
        let total: f64 = widths.iter().sum();
        if (total - available).abs() <= PERCENT_TOLERANCE {
            continue;
        }
        for (index, width) in own.into_iter().zip(rescale(&widths, available)) {
            rows[row_index].cells[index].set_width(width);
        }
    }
}

fn drop_markers(rows: &mut [Row], id: &str, range: std::ops::Range<usize>) {
    let end = range.end.min(rows.len());
    for row in rows.iter_mut().take(end).skip(range.start) {
        row.cells.retain(|cell| cell.id != id);
    }
}

/// Remove `rows[row]`, shortening spans from earlier rows that crossed it
/// and dropping continuation markers of spans that started in it.
fn remove_row_at(rows: &mut Vec<Row>, row: usize) -> Row {
    let crossing: Vec<String> = covering_spans(rows, row)
        .into_iter()
        .map(|(id, _)| id.to_owned())
        .collect();
    for earlier in rows.iter_mut().take(row) {
        for cell in earlier
            .cells
            .iter_mut()
            .filter(|cell| cell.is_spanning() && crossing.contains(&cell.id))
        {
            cell.span = CellSpan::new(cell.width(), cell.row_span() - 1);
        }
    }

    let removed = rows.remove(row);
    for spanning in removed.cells.iter().filter(|cell| cell.is_spanning()) {
        if crossing.contains(&spanning.id) {
            continue;
        }
        let below = usize::from(spanning.row_span()) - 1;
        drop_markers(rows, &spanning.id, row..row + below);
    }
    removed
}

/// Restore the edit invariants: refill drifted rows, remove rows without
/// cells of their own, rescale heights.
fn settle(rows: &mut Vec<Row>) {
    let before = rows.len();
    loop {
        repair_widths(rows);
        let hollow = (0..rows.len()).find(|&index| own_cells(rows.as_slice(), index).0.is_empty());
        let Some(hollow) = hollow else {
            break;
        };
        remove_row_at(rows, hollow);
    }

    let heights: Vec<f64> = rows.iter().map(|row| row.height).collect();
    let total: f64 = heights.iter().sum();
    if rows.len() != before {
        tracing::debug!(removed = before - rows.len(), "rows without own cells removed");
    } else if (total - 100.0).abs() <= PERCENT_TOLERANCE {
        return;
    }
    for (row, height) in rows.iter_mut().zip(rescale(&heights, 100.0)) {
        row.height = height;
    }
}
