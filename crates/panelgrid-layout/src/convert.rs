#![forbid(unsafe_code)]

//! Row/cell grid to absolute panel placements.
//!
//! [`convert`] walks rows top to bottom and cells left to right, placing each
//! cell in the 12-unit column grid at `y = row index`. Spanning cells claim
//! units in the rows below them through a per-call occupancy set, so later
//! rows flow around them.
//!
//! # Invariants
//!
//! 1. No two emitted positions share a unit.
//! 2. Every position satisfies `x + width <= 12`, `width >= 1`, `height >= 1`.
//! 3. Output is a pure function of the layout: same input, same output.
//!
//! # Failure Modes
//!
//! None surface as errors. Inconsistent data degrades:
//! - a continuation marker (a repeat of a covering spanning cell) is skipped
//!   and the cursor advances by its width;
//! - a cell starting on a claimed unit moves right to the next free unit.
//!   Rows below a span store only their own cells (the hybrid templates
//!   write row 1 as just the bottom-right cell), so such a cell is
//!   placed beside the span rather than skipped (DESIGN.md, decision 1);
//! - a cell wider than the free run ahead of it is narrowed to that run;
//! - a cell with no free run left in its row is dropped with a warning.

use panelgrid_core::GridRect;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::model::{Cell, GRID_COLUMNS, GridLayout, GridLayoutDefinition};
use crate::viewport::Viewport;

/// Absolute placement of one panel in grid units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelPosition {
    pub panel_id: String,
    /// Column, `0..12`.
    pub x: u16,
    /// Row index.
    pub y: u16,
    /// Columns, `1..=12`.
    pub width: u16,
    /// Rows spanned, `>= 1`.
    pub height: u16,
}

impl PanelPosition {
    /// Units covered by this placement.
    #[must_use]
    pub const fn footprint(&self) -> GridRect {
        GridRect::new(self.x, self.y, self.width, self.height)
    }
}

/// Convert a percentage width to whole grid units (nearest, at least 1).
#[must_use]
pub fn grid_units(width_percent: f64) -> u16 {
    let units = (width_percent / 100.0 * f64::from(GRID_COLUMNS)).round();
    if units.is_nan() {
        return 1;
    }
    units.clamp(1.0, f64::from(GRID_COLUMNS)) as u16
}

/// Units claimed during one conversion pass.
#[derive(Debug, Default)]
struct Occupancy {
    units: FxHashSet<(u16, u16)>,
}

impl Occupancy {
    fn is_free(&self, x: u16, y: u16) -> bool {
        !self.units.contains(&(x, y))
    }

    /// Length of the free run starting at `x` that is clear on every row of
    /// `y..y + height`.
    fn free_run(&self, x: u16, y: u16, height: u16) -> u16 {
        (x..GRID_COLUMNS)
            .take_while(|&col| (0..height).all(|r| self.is_free(col, y.saturating_add(r))))
            .count() as u16
    }

    fn claim(&mut self, rect: GridRect) {
        self.units.extend(rect.units());
    }
}

/// Convert one viewport layout into panel placements.
#[must_use]
pub fn convert(layout: &GridLayout) -> Vec<PanelPosition> {
    let mut positions = Vec::new();
    let mut occupancy = Occupancy::default();
    // Spanning cells already placed: id -> (top row, bottom row exclusive).
    let mut spans: FxHashMap<&str, (u16, u16)> = FxHashMap::default();

    for (row_index, row) in layout.rows().iter().enumerate() {
        let y = row_index as u16;
        let mut x: u16 = 0;

        for cell in &row.cells {
            let requested = grid_units(cell.width());

            if is_continuation(&spans, cell, y) {
                x = x.saturating_add(requested);
                continue;
            }

            while x < GRID_COLUMNS && !occupancy.is_free(x, y) {
                x += 1;
            }

            let height = cell.row_span();
            let available = occupancy.free_run(x, y, height);
            if available == 0 {
                tracing::warn!(
                    cell = %cell.id,
                    row = row_index,
                    x,
                    "no free grid units left for cell; skipping"
                );
                x = x.saturating_add(requested);
                continue;
            }

            let width = requested.min(available);
            if width < requested {
                tracing::debug!(
                    cell = %cell.id,
                    row = row_index,
                    requested,
                    width,
                    "cell narrowed to fit free grid units"
                );
            }

            let position = PanelPosition {
                panel_id: cell.panel_id().to_owned(),
                x,
                y,
                width,
                height,
            };
            occupancy.claim(position.footprint());
            if cell.is_spanning() {
                spans.insert(cell.id.as_str(), (y, y.saturating_add(height)));
            }
            positions.push(position);
            x += width;
        }
    }

    positions
}

fn is_continuation(spans: &FxHashMap<&str, (u16, u16)>, cell: &Cell, y: u16) -> bool {
    spans
        .get(cell.id.as_str())
        .is_some_and(|&(top, bottom)| top < y && y < bottom)
}

/// Convert the layout a definition holds for `viewport`.
#[must_use]
pub fn convert_definition(definition: &GridLayoutDefinition, viewport: Viewport) -> Vec<PanelPosition> {
    convert(definition.layout(viewport))
}

/// Single-entry memo for [`convert`], keyed by [`GridLayout::fingerprint`].
#[derive(Debug, Default)]
pub struct PositionCache {
    entry: Option<(u64, Vec<PanelPosition>)>,
    hits: u64,
    misses: u64,
}

impl PositionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Positions for `layout`, recomputed only when the layout changed.
    pub fn positions(&mut self, layout: &GridLayout) -> &[PanelPosition] {
        let key = layout.fingerprint();
        let fresh = matches!(&self.entry, Some((cached, _)) if *cached == key);
        if fresh {
            self.hits += 1;
        } else {
            self.misses += 1;
            self.entry = Some((key, convert(layout)));
        }
        self.entry
            .as_ref()
            .map(|(_, positions)| positions.as_slice())
            .unwrap_or_default()
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }
}
