#![forbid(unsafe_code)]

//! Grid layout data model.
//!
//! A [`GridLayoutDefinition`] owns one [`GridLayout`] per viewport. A layout
//! is an ordered list of [`Row`]s; each row is an ordered list of [`Cell`]s
//! carrying a width percentage and, for cells taller than one row, a row
//! span.
//!
//! # Invariants
//!
//! 1. Row coverage (own cell widths plus widths carried down by spanning
//!    cells from earlier rows) is 100 ± [`PERCENT_TOLERANCE`].
//! 2. Row heights of one layout sum to 100 ± [`PERCENT_TOLERANCE`].
//! 3. `panel_ids` is derived from `rows`, never edited independently. The
//!    rows are only reachable mutably through [`GridLayout::update_rows`] and
//!    crate-internal editors, all of which re-derive it.
//!
//! Invariants 1 and 2 are reported by [`GridLayout::invariant_report`], not
//! enforced: hand-edited and legacy data is expected to drift.
//!
//! # Legacy continuation markers
//!
//! Older layouts repeat a spanning cell (same `id`) in the rows it spans
//! into. Such a repeat is a *continuation marker*: it contributes nothing to
//! coverage and produces no panel position.

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashSet, FxHasher};
use serde::{Deserialize, Serialize};

use crate::viewport::{PerViewport, Viewport};

/// Number of grid units per row.
pub const GRID_COLUMNS: u16 = 12;

/// Accepted drift for percentage sums.
pub const PERCENT_TOLERANCE: f64 = 0.1;

/// Device type string for cells that accept any panel.
pub const ANY_DEVICE: &str = "any";

// =========================================================================
// Device kinds
// =========================================================================

/// Device kinds with a dedicated, shared panel slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Telescope,
    Camera,
    Focuser,
    FilterWheel,
    Dome,
    Rotator,
    Weather,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 7] = [
        DeviceKind::Telescope,
        DeviceKind::Camera,
        DeviceKind::Focuser,
        DeviceKind::FilterWheel,
        DeviceKind::Dome,
        DeviceKind::Rotator,
        DeviceKind::Weather,
    ];

    /// Canonical device type string (also the panel id).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Telescope => "telescope",
            Self::Camera => "camera",
            Self::Focuser => "focuser",
            Self::FilterWheel => "filterwheel",
            Self::Dome => "dome",
            Self::Rotator => "rotator",
            Self::Weather => "weather",
        }
    }

    /// Recognize a device type string, case-insensitively.
    #[must_use]
    pub fn parse(device_type: &str) -> Option<Self> {
        let lowered = device_type.trim().to_ascii_lowercase();
        let kind = match lowered.as_str() {
            "telescope" => Self::Telescope,
            "camera" => Self::Camera,
            "focuser" => Self::Focuser,
            "filterwheel" | "filter-wheel" | "filter_wheel" => Self::FilterWheel,
            "dome" => Self::Dome,
            "rotator" => Self::Rotator,
            "weather" | "observingconditions" => Self::Weather,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display priority of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Primary,
    Secondary,
    Tertiary,
}

// =========================================================================
// Cells
// =========================================================================

/// Horizontal size and vertical extent of a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellSpan {
    /// Occupies one row.
    Simple { width: f64 },
    /// Occupies `row_span >= 2` rows starting at its own row.
    Spanning { width: f64, row_span: u16 },
}

impl CellSpan {
    /// Build from a raw width and row span; spans of 0 or 1 are simple.
    #[must_use]
    pub const fn new(width: f64, row_span: u16) -> Self {
        if row_span > 1 {
            Self::Spanning { width, row_span }
        } else {
            Self::Simple { width }
        }
    }

    #[must_use]
    pub const fn width(self) -> f64 {
        match self {
            Self::Simple { width } | Self::Spanning { width, .. } => width,
        }
    }

    #[must_use]
    pub const fn row_span(self) -> u16 {
        match self {
            Self::Simple { .. } => 1,
            Self::Spanning { row_span, .. } => row_span,
        }
    }

    #[must_use]
    pub const fn with_width(self, width: f64) -> Self {
        match self {
            Self::Simple { .. } => Self::Simple { width },
            Self::Spanning { row_span, .. } => Self::Spanning { width, row_span },
        }
    }
}

/// One panel slot in a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CellRecord", into = "CellRecord")]
pub struct Cell {
    pub id: String,
    /// A [`DeviceKind`] string, [`ANY_DEVICE`], or a free-form panel type.
    pub device_type: String,
    pub name: String,
    pub priority: Priority,
    pub span: CellSpan,
}

impl Cell {
    /// A simple, primary cell.
    #[must_use]
    pub fn new(id: impl Into<String>, device_type: impl Into<String>, width: f64) -> Self {
        Self {
            id: id.into(),
            device_type: device_type.into(),
            name: String::new(),
            priority: Priority::Primary,
            span: CellSpan::Simple { width },
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_row_span(mut self, row_span: u16) -> Self {
        self.span = CellSpan::new(self.span.width(), row_span);
        self
    }

    #[must_use]
    pub const fn width(&self) -> f64 {
        self.span.width()
    }

    pub fn set_width(&mut self, width: f64) {
        self.span = self.span.with_width(width);
    }

    #[must_use]
    pub const fn row_span(&self) -> u16 {
        self.span.row_span()
    }

    #[must_use]
    pub const fn is_spanning(&self) -> bool {
        matches!(self.span, CellSpan::Spanning { .. })
    }

    #[must_use]
    pub fn device_kind(&self) -> Option<DeviceKind> {
        DeviceKind::parse(&self.device_type)
    }

    /// Panel slot this cell renders into.
    ///
    /// Recognized device kinds share one slot per kind across layouts; any
    /// other cell is its own custom panel.
    #[must_use]
    pub fn panel_id(&self) -> &str {
        match self.device_kind() {
            Some(kind) => kind.as_str(),
            None => &self.id,
        }
    }
}

/// Persisted (flat) cell shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellRecord {
    id: String,
    #[serde(default = "default_device_type")]
    device_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    priority: Priority,
    width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    row_span: Option<u16>,
}

fn default_device_type() -> String {
    ANY_DEVICE.to_owned()
}

impl From<CellRecord> for Cell {
    fn from(record: CellRecord) -> Self {
        Self {
            id: record.id,
            device_type: record.device_type,
            name: record.name,
            priority: record.priority,
            span: CellSpan::new(record.width, record.row_span.unwrap_or(1)),
        }
    }
}

impl From<Cell> for CellRecord {
    fn from(cell: Cell) -> Self {
        let row_span = cell.is_spanning().then(|| cell.row_span());
        Self {
            id: cell.id,
            device_type: cell.device_type,
            name: cell.name,
            priority: cell.priority,
            width: cell.span.width(),
            row_span,
        }
    }
}

// =========================================================================
// Rows and layouts
// =========================================================================

/// One horizontal band of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    pub cells: Vec<Cell>,
    /// Percent of the container height.
    pub height: f64,
}

impl Row {
    #[must_use]
    pub fn new(id: impl Into<String>, height: f64, cells: Vec<Cell>) -> Self {
        Self {
            id: id.into(),
            cells,
            height,
        }
    }
}

/// Width budget of one row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RowCoverage {
    /// Sum of the row's own (non-continuation) cell widths.
    pub own: f64,
    /// Sum of widths of spanning cells from earlier rows covering this row.
    pub carried: f64,
}

impl RowCoverage {
    #[must_use]
    pub fn total(self) -> f64 {
        self.own + self.carried
    }

    /// Width available to the row's own cells.
    #[must_use]
    pub fn available(self) -> f64 {
        (100.0 - self.carried).max(0.0)
    }
}

/// Layout for one viewport.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "GridLayoutRecord", rename_all = "camelCase")]
pub struct GridLayout {
    rows: Vec<Row>,
    panel_ids: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridLayoutRecord {
    #[serde(default)]
    rows: Vec<Row>,
}

impl From<GridLayoutRecord> for GridLayout {
    fn from(record: GridLayoutRecord) -> Self {
        Self::new(record.rows)
    }
}

impl GridLayout {
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        let mut layout = Self {
            rows,
            panel_ids: Vec::new(),
        };
        layout.rebuild_panel_ids();
        layout
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    #[must_use]
    pub fn cell(&self, row: usize, cell: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.cells.get(cell))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// De-duplicated cell ids in first-appearance order.
    #[must_use]
    pub fn panel_ids(&self) -> &[String] {
        &self.panel_ids
    }

    /// Mutate rows freely, then re-derive `panel_ids`.
    pub fn update_rows<R>(&mut self, f: impl FnOnce(&mut Vec<Row>) -> R) -> R {
        let out = f(&mut self.rows);
        self.rebuild_panel_ids();
        out
    }

    /// Raw row access for in-crate editors that only touch widths/heights
    /// (membership, and therefore `panel_ids`, is unchanged).
    pub(crate) fn rows_mut_sizes_only(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub(crate) fn rebuild_panel_ids(&mut self) {
        let mut seen = FxHashSet::default();
        self.panel_ids = self
            .rows
            .iter()
            .flat_map(|row| row.cells.iter())
            .filter(|cell| seen.insert(cell.id.as_str()))
            .map(|cell| cell.id.clone())
            .collect();
    }

    /// Sum of row heights.
    #[must_use]
    pub fn total_height(&self) -> f64 {
        self.rows.iter().map(|row| row.height).sum()
    }

    /// Ids of spanning cells from earlier rows that still cover `row_index`,
    /// with their widths.
    pub(crate) fn covering_spans(&self, row_index: usize) -> Vec<(&str, f64)> {
        covering_spans(&self.rows, row_index)
    }

    /// Whether `cell_index` of `row_index` repeats a covering spanning cell.
    #[must_use]
    pub fn is_continuation(&self, row_index: usize, cell_index: usize) -> bool {
        let Some(cell) = self.cell(row_index, cell_index) else {
            return false;
        };
        self.covering_spans(row_index)
            .iter()
            .any(|(id, _)| *id == cell.id)
    }

    /// Width budget of a row, or `None` if the row does not exist.
    #[must_use]
    pub fn row_coverage(&self, row_index: usize) -> Option<RowCoverage> {
        let row = self.rows.get(row_index)?;
        let covering = self.covering_spans(row_index);
        let carried = covering.iter().map(|(_, width)| width).sum();
        let own = row
            .cells
            .iter()
            .filter(|cell| !covering.iter().any(|(id, _)| *id == cell.id))
            .map(Cell::width)
            .sum();
        Some(RowCoverage { own, carried })
    }

    /// Check the percentage invariants without modifying anything.
    #[must_use]
    pub fn invariant_report(&self) -> LayoutInvariantReport {
        let mut issues = Vec::new();
        if self.rows.is_empty() {
            return LayoutInvariantReport { issues };
        }

        let total_height = self.total_height();
        if (total_height - 100.0).abs() > PERCENT_TOLERANCE {
            issues.push(LayoutInvariantIssue {
                code: LayoutInvariantCode::RowHeightDrift,
                row: None,
                cell: None,
                value: total_height,
            });
        }

        for (row_index, row) in self.rows.iter().enumerate() {
            if let Some(coverage) = self.row_coverage(row_index) {
                let total = coverage.total();
                if (total - 100.0).abs() > PERCENT_TOLERANCE {
                    issues.push(LayoutInvariantIssue {
                        code: LayoutInvariantCode::RowWidthDrift,
                        row: Some(row_index),
                        cell: None,
                        value: total,
                    });
                }
            }
            for (cell_index, cell) in row.cells.iter().enumerate() {
                let width = cell.width();
                if !(0.0..=100.0).contains(&width) {
                    issues.push(LayoutInvariantIssue {
                        code: LayoutInvariantCode::WidthOutOfRange,
                        row: Some(row_index),
                        cell: Some(cell_index),
                        value: width,
                    });
                }
                let bottom = row_index + usize::from(cell.row_span());
                if bottom > self.rows.len() {
                    issues.push(LayoutInvariantIssue {
                        code: LayoutInvariantCode::SpanOverflow,
                        row: Some(row_index),
                        cell: Some(cell_index),
                        value: f64::from(cell.row_span()),
                    });
                }
            }
        }

        LayoutInvariantReport { issues }
    }

    /// Structural fingerprint used for memoizing conversions.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.rows.len().hash(&mut hasher);
        for row in &self.rows {
            row.cells.len().hash(&mut hasher);
            for cell in &row.cells {
                cell.id.hash(&mut hasher);
                cell.device_type.hash(&mut hasher);
                cell.width().to_bits().hash(&mut hasher);
                cell.row_span().hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

/// Spanning cells from rows before `row_index` that still cover it, as
/// `(id, width)`, first origin wins on repeated ids.
pub(crate) fn covering_spans(rows: &[Row], row_index: usize) -> Vec<(&str, f64)> {
    let mut covering: Vec<(&str, f64)> = Vec::new();
    for (origin, row) in rows.iter().enumerate().take(row_index) {
        for cell in &row.cells {
            let span = usize::from(cell.row_span());
            if span > 1
                && origin + span > row_index
                && !covering.iter().any(|(id, _)| *id == cell.id)
            {
                covering.push((cell.id.as_str(), cell.width()));
            }
        }
    }
    covering
}

/// Scale `values` to sum to `target`; equal split when they sum to zero.
pub(crate) fn rescale(values: &[f64], target: f64) -> Vec<f64> {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        values.iter().map(|value| value / sum * target).collect()
    } else if values.is_empty() {
        Vec::new()
    } else {
        vec![target / values.len() as f64; values.len()]
    }
}

/// Invariant categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayoutInvariantCode {
    /// Row coverage is not 100.
    RowWidthDrift,
    /// Row heights do not sum to 100.
    RowHeightDrift,
    /// A cell width lies outside `0..=100`.
    WidthOutOfRange,
    /// A spanning cell extends past the last row.
    SpanOverflow,
}

/// One invariant finding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutInvariantIssue {
    pub code: LayoutInvariantCode,
    pub row: Option<usize>,
    pub cell: Option<usize>,
    /// The offending sum or value.
    pub value: f64,
}

/// Invariant findings for one layout.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutInvariantReport {
    pub issues: Vec<LayoutInvariantIssue>,
}

impl LayoutInvariantReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    #[must_use]
    pub fn has(&self, code: LayoutInvariantCode) -> bool {
        self.issues.iter().any(|issue| issue.code == code)
    }
}

// =========================================================================
// Definitions
// =========================================================================

/// A named layout with one grid per viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridLayoutDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub layouts: PerViewport<GridLayout>,
    #[serde(default)]
    pub is_default: bool,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_at: u64,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl GridLayoutDefinition {
    /// Create a definition stamped with the current time.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        layouts: PerViewport<GridLayout>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            layouts,
            is_default: false,
            created_at: now,
            updated_at: now,
            icon: None,
        }
    }

    #[must_use]
    pub fn layout(&self, viewport: Viewport) -> &GridLayout {
        self.layouts.get(viewport)
    }

    /// Mutable layout access; bumps `updated_at`.
    pub fn layout_mut(&mut self, viewport: Viewport) -> &mut GridLayout {
        self.touch();
        self.layouts.get_mut(viewport)
    }

    /// Record a modification.
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at);
    }
}

/// Wall-clock milliseconds since the Unix epoch (0 if the clock is unset).
#[must_use]
pub fn now_millis() -> u64 {
    web_time::SystemTime::now()
        .duration_since(web_time::SystemTime::UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
