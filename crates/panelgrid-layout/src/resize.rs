#![forbid(unsafe_code)]

//! Divider drags with snap-to-fraction behavior.
//!
//! A [`ResizeSession`] adjusts two siblings that share a divider: two
//! adjacent cells of a row (column resize) or two adjacent rows (row
//! resize). Their sum `total` is fixed for the whole session.
//!
//! ```text
//! Idle --begin--> Dragging --update*--> Dragging --commit|cancel--> Idle
//! ```
//!
//! # Invariants
//!
//! 1. After every update and after commit, `value_a + value_b == total`.
//! 2. `value_a` stays inside `[min_percent, min(max_percent, total - min_percent)]`;
//!    when that interval is empty it is `total / 2`.
//! 3. Commit lands on the snap point nearest the current value among those
//!    inside the bounds, or keeps the clamped value if none are.
//! 4. Committing a value that already is a snap point leaves it unchanged.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Divider has no right/lower sibling | `begin_*` returns [`ResizeError::NoSibling`] |
//! | Target edited away mid-drag | `update`/`commit`/`cancel` return [`ResizeError::TargetVanished`] |
//! | Extent is zero, negative or not finite | Update leaves values unchanged |
//! | Second drag while one is active | [`ResizeMachine`] returns [`ResizeMachineError::ActiveDragAlreadyInProgress`] |

use std::fmt;

use panelgrid_core::{Axis, ExtentSource, PointerPosition};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::edit::repair_widths;
use crate::model::GridLayout;

/// Canonical column fractions.
pub const COLUMN_SNAP_POINTS: [f64; 9] = [20.0, 25.0, 33.33, 40.0, 50.0, 60.0, 66.67, 75.0, 80.0];

/// Canonical row fractions.
pub const ROW_SNAP_POINTS: [f64; 7] = [20.0, 25.0, 33.33, 50.0, 66.67, 75.0, 80.0];

/// Live snapping engages strictly below this distance (percentage points).
pub const DEFAULT_SNAP_THRESHOLD: f64 = 5.0;

pub const DEFAULT_MIN_PERCENT: f64 = 15.0;
pub const DEFAULT_MAX_PERCENT: f64 = 85.0;

// =========================================================================
// Snap policy
// =========================================================================

/// Snap points and limits for one drag axis.
///
/// There is no `Default`: columns and rows have different snap sets, so
/// pick [`SnapConfig::columns`] or [`SnapConfig::rows`] explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapConfig {
    pub snap_points: Vec<f64>,
    pub snap_threshold: f64,
    pub min_percent: f64,
    pub max_percent: f64,
}

impl SnapConfig {
    /// Column divider defaults.
    #[must_use]
    pub fn columns() -> Self {
        Self {
            snap_points: COLUMN_SNAP_POINTS.to_vec(),
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
            min_percent: DEFAULT_MIN_PERCENT,
            max_percent: DEFAULT_MAX_PERCENT,
        }
    }

    /// Row divider defaults.
    #[must_use]
    pub fn rows() -> Self {
        Self {
            snap_points: ROW_SNAP_POINTS.to_vec(),
            ..Self::columns()
        }
    }

    /// Nearest snap point; ties go to the one listed first.
    #[must_use]
    pub fn nearest(&self, value: f64) -> Option<f64> {
        nearest_of(self.snap_points.iter().copied(), value)
    }

    /// Allowed range for the first sibling when both sum to `total`.
    #[must_use]
    pub fn bounds(&self, total: f64) -> Option<(f64, f64)> {
        let low = self.min_percent;
        let high = self.max_percent.min(total - self.min_percent);
        (low <= high).then_some((low, high))
    }

    #[must_use]
    pub fn clamp(&self, value: f64, total: f64) -> f64 {
        match self.bounds(total) {
            Some((low, high)) => value.clamp(low, high),
            None => total / 2.0,
        }
    }

    /// Value shown while dragging: the snap point if strictly within the
    /// threshold, otherwise `raw`, then clamped.
    #[must_use]
    pub fn live_value(&self, raw: f64, total: f64) -> f64 {
        let snapped = self
            .nearest(raw)
            .filter(|point| (point - raw).abs() < self.snap_threshold)
            .unwrap_or(raw);
        self.clamp(snapped, total)
    }

    /// Value committed on release.
    #[must_use]
    pub fn release_value(&self, current: f64, total: f64) -> f64 {
        let Some((low, high)) = self.bounds(total) else {
            return total / 2.0;
        };
        let reachable = self
            .snap_points
            .iter()
            .copied()
            .filter(|point| (low..=high).contains(point));
        nearest_of(reachable, current).unwrap_or_else(|| current.clamp(low, high))
    }

    /// Every problem with this configuration, prefixed with `label`.
    #[must_use]
    pub fn problems(&self, label: &str) -> Vec<String> {
        let mut problems = Vec::new();
        if self.snap_points.is_empty() {
            problems.push(format!("{label}.snap_points must not be empty"));
        }
        for point in &self.snap_points {
            if !(0.0..=100.0).contains(point) {
                problems.push(format!("{label}.snap_points entry {point} is outside 0..=100"));
            }
        }
        if !(self.snap_threshold > 0.0) {
            problems.push(format!(
                "{label}.snap_threshold must be > 0 (got {})",
                self.snap_threshold
            ));
        }
        if !(self.min_percent >= 0.0 && self.min_percent < self.max_percent) {
            problems.push(format!(
                "{label}.min_percent ({}) must be >= 0 and below max_percent ({})",
                self.min_percent, self.max_percent
            ));
        }
        if self.max_percent > 100.0 {
            problems.push(format!(
                "{label}.max_percent must be <= 100 (got {})",
                self.max_percent
            ));
        }
        problems
    }
}

fn nearest_of(points: impl Iterator<Item = f64>, value: f64) -> Option<f64> {
    points.min_by(|a, b| (a - value).abs().total_cmp(&(b - value).abs()))
}

// =========================================================================
// Targets and errors
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeAxis {
    Column,
    Row,
}

impl ResizeAxis {
    /// Pointer axis the drag is measured along.
    #[must_use]
    pub const fn axis(self) -> Axis {
        match self {
            Self::Column => Axis::Horizontal,
            Self::Row => Axis::Vertical,
        }
    }
}

/// The divider being dragged, named by its first sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "axis", rename_all = "snake_case")]
pub enum ResizeTarget {
    /// Between `cells[cell]` and `cells[cell + 1]` of `row`.
    Column { row: usize, cell: usize },
    /// Between `rows[row]` and `rows[row + 1]`.
    Row { row: usize },
}

impl ResizeTarget {
    #[must_use]
    pub const fn axis(self) -> ResizeAxis {
        match self {
            Self::Column { .. } => ResizeAxis::Column,
            Self::Row { .. } => ResizeAxis::Row,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeError {
    RowOutOfRange { row: usize, rows: usize },
    CellOutOfRange { row: usize, cell: usize, cells: usize },
    NoSibling { target: ResizeTarget },
    TargetVanished { target: ResizeTarget },
}

impl fmt::Display for ResizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowOutOfRange { row, rows } => {
                write!(f, "row {row} out of range (layout has {rows} rows)")
            }
            Self::CellOutOfRange { row, cell, cells } => {
                write!(f, "cell {cell} out of range (row {row} has {cells} cells)")
            }
            Self::NoSibling { target } => {
                write!(f, "no resizable sibling after divider {target:?}")
            }
            Self::TargetVanished { target } => {
                write!(f, "resize target {target:?} no longer matches the layout")
            }
        }
    }
}

impl std::error::Error for ResizeError {}

// =========================================================================
// Session
// =========================================================================

/// Values after one drag step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeUpdate {
    pub value_a: f64,
    pub value_b: f64,
    /// Value before snapping and clamping.
    pub raw_a: f64,
    /// Whether `value_a` is a snap point.
    pub snapped: bool,
}

/// One divider drag from pointer-down to pointer-up.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeSession {
    target: ResizeTarget,
    /// Ids of the two siblings, rechecked on every step.
    sibling_ids: (String, String),
    initial_a: f64,
    initial_b: f64,
    total: f64,
    origin: PointerPosition,
    current_a: f64,
    snap: SnapConfig,
}

impl ResizeSession {
    /// Start dragging the divider right of `cells[cell]` in `row`.
    pub fn begin_column(
        layout: &GridLayout,
        row: usize,
        cell: usize,
        pointer: PointerPosition,
    ) -> Result<Self, ResizeError> {
        let target = ResizeTarget::Column { row, cell };
        let cells = &layout
            .row(row)
            .ok_or(ResizeError::RowOutOfRange {
                row,
                rows: layout.rows().len(),
            })?
            .cells;
        let a = cells.get(cell).ok_or(ResizeError::CellOutOfRange {
            row,
            cell,
            cells: cells.len(),
        })?;
        let b = cells.get(cell + 1).ok_or(ResizeError::NoSibling { target })?;
        if layout.is_continuation(row, cell) || layout.is_continuation(row, cell + 1) {
            return Err(ResizeError::NoSibling { target });
        }
        let session = Self::new(
            target,
            (a.id.clone(), b.id.clone()),
            (a.width(), b.width()),
            pointer,
            SnapConfig::columns(),
        );
        tracing::debug!(row, cell, total = session.total, "column resize started");
        Ok(session)
    }

    /// Start dragging the divider below `rows[row]`.
    pub fn begin_row(
        layout: &GridLayout,
        row: usize,
        pointer: PointerPosition,
    ) -> Result<Self, ResizeError> {
        let target = ResizeTarget::Row { row };
        let a = layout.row(row).ok_or(ResizeError::RowOutOfRange {
            row,
            rows: layout.rows().len(),
        })?;
        let b = layout.row(row + 1).ok_or(ResizeError::NoSibling { target })?;
        let session = Self::new(
            target,
            (a.id.clone(), b.id.clone()),
            (a.height, b.height),
            pointer,
            SnapConfig::rows(),
        );
        tracing::debug!(row, total = session.total, "row resize started");
        Ok(session)
    }

    fn new(
        target: ResizeTarget,
        sibling_ids: (String, String),
        (initial_a, initial_b): (f64, f64),
        origin: PointerPosition,
        snap: SnapConfig,
    ) -> Self {
        Self {
            target,
            sibling_ids,
            initial_a,
            initial_b,
            total: initial_a + initial_b,
            origin,
            current_a: initial_a,
            snap,
        }
    }

    /// Replace the snap policy (defaults come from the axis).
    #[must_use]
    pub fn with_snap(mut self, snap: SnapConfig) -> Self {
        self.snap = snap;
        self
    }

    #[must_use]
    pub const fn target(&self) -> ResizeTarget {
        self.target
    }

    #[must_use]
    pub const fn total(&self) -> f64 {
        self.total
    }

    #[must_use]
    pub const fn initial_values(&self) -> (f64, f64) {
        (self.initial_a, self.initial_b)
    }

    /// Current `(value_a, value_b)`.
    #[must_use]
    pub fn values(&self) -> (f64, f64) {
        (self.current_a, self.total - self.current_a)
    }

    /// Apply a pointer move and write the live values into `layout`.
    pub fn update(
        &mut self,
        layout: &mut GridLayout,
        pointer: PointerPosition,
        extent: &impl ExtentSource,
    ) -> Result<ResizeUpdate, ResizeError> {
        self.check_target(layout)?;
        let axis = self.target.axis().axis();
        let size = extent.extent().along(axis);
        let delta = pointer.delta_from(self.origin, axis) * 100.0 / size;
        if !(size > 0.0) || !delta.is_finite() {
            return Ok(self.report(self.current_a));
        }

        let raw_a = self.initial_a + delta;
        self.current_a = self.snap.live_value(raw_a, self.total);
        self.write(layout, self.current_a, self.total - self.current_a);
        Ok(self.report(raw_a))
    }

    /// Release: snap to the nearest reachable fraction and write it.
    pub fn commit(self, layout: &mut GridLayout) -> Result<ResizeUpdate, ResizeError> {
        self.check_target(layout)?;
        let value_a = self.snap.release_value(self.current_a, self.total);
        let value_b = self.total - value_a;
        self.write(layout, value_a, value_b);
        tracing::debug!(divider = ?self.target, value_a, value_b, "resize committed");
        Ok(ResizeUpdate {
            value_a,
            value_b,
            raw_a: self.current_a,
            snapped: self.is_snap_point(value_a),
        })
    }

    /// Abort: restore the values captured at `begin_*`.
    pub fn cancel(self, layout: &mut GridLayout) -> Result<(), ResizeError> {
        self.check_target(layout)?;
        self.write(layout, self.initial_a, self.initial_b);
        tracing::debug!(divider = ?self.target, "resize cancelled");
        Ok(())
    }

    fn report(&self, raw_a: f64) -> ResizeUpdate {
        let (value_a, value_b) = self.values();
        ResizeUpdate {
            value_a,
            value_b,
            raw_a,
            snapped: self.is_snap_point(value_a),
        }
    }

    fn is_snap_point(&self, value: f64) -> bool {
        self.snap.snap_points.contains(&value)
    }

    fn check_target(&self, layout: &GridLayout) -> Result<(), ResizeError> {
        let vanished = ResizeError::TargetVanished {
            target: self.target,
        };
        let (a, b) = match self.target {
            ResizeTarget::Column { row, cell } => (
                layout.cell(row, cell).map(|c| c.id.as_str()),
                layout.cell(row, cell + 1).map(|c| c.id.as_str()),
            ),
            ResizeTarget::Row { row } => (
                layout.row(row).map(|r| r.id.as_str()),
                layout.row(row + 1).map(|r| r.id.as_str()),
            ),
        };
        let (id_a, id_b) = (&self.sibling_ids.0, &self.sibling_ids.1);
        match (a, b) {
            (Some(a), Some(b)) if a == id_a.as_str() && b == id_b.as_str() => Ok(()),
            _ => Err(vanished),
        }
    }

    fn write(&self, layout: &mut GridLayout, value_a: f64, value_b: f64) {
        let rows = layout.rows_mut_sizes_only();
        match self.target {
            ResizeTarget::Column { row, cell } => {
                let spanning = {
                    let cells = &mut rows[row].cells;
                    cells[cell].set_width(value_a);
                    cells[cell + 1].set_width(value_b);
                    cells[cell].is_spanning() || cells[cell + 1].is_spanning()
                };
                // Rows under a resized span must give up or take the difference.
                if spanning {
                    repair_widths(rows);
                }
            }
            ResizeTarget::Row { row } => {
                rows[row].height = value_a;
                rows[row + 1].height = value_b;
            }
        }
    }
}

// =========================================================================
// Machine
// =========================================================================

/// Observable state of a [`ResizeMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeState {
    Idle,
    Dragging { target: ResizeTarget },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMachineError {
    ActiveDragAlreadyInProgress { active: ResizeTarget },
    Session(ResizeError),
}

impl fmt::Display for ResizeMachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActiveDragAlreadyInProgress { active } => {
                write!(f, "a resize drag is already in progress on {active:?}")
            }
            Self::Session(error) => write!(f, "resize failed: {error}"),
        }
    }
}

impl std::error::Error for ResizeMachineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Self::Session(error) = self {
            return Some(error);
        }
        None
    }
}

impl From<ResizeError> for ResizeMachineError {
    fn from(error: ResizeError) -> Self {
        Self::Session(error)
    }
}

/// Holds at most one [`ResizeSession`] for a drag surface.
///
/// Moves and releases while idle are ignored (`Ok(None)`), matching pointer
/// events that arrive after the drag already ended.
#[derive(Debug, Clone)]
pub struct ResizeMachine {
    session: Option<ResizeSession>,
    column_snap: SnapConfig,
    row_snap: SnapConfig,
}

impl Default for ResizeMachine {
    fn default() -> Self {
        Self::new(SnapConfig::columns(), SnapConfig::rows())
    }
}

impl ResizeMachine {
    #[must_use]
    pub fn new(column_snap: SnapConfig, row_snap: SnapConfig) -> Self {
        Self {
            session: None,
            column_snap,
            row_snap,
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.column_resize.clone(), config.row_resize.clone())
    }

    #[must_use]
    pub fn state(&self) -> ResizeState {
        match &self.session {
            None => ResizeState::Idle,
            Some(session) => ResizeState::Dragging {
                target: session.target(),
            },
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Snap policy applied to new drags on `axis`.
    #[must_use]
    pub fn snap(&self, axis: ResizeAxis) -> &SnapConfig {
        match axis {
            ResizeAxis::Column => &self.column_snap,
            ResizeAxis::Row => &self.row_snap,
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&ResizeSession> {
        self.session.as_ref()
    }

    pub fn begin_column_resize(
        &mut self,
        layout: &GridLayout,
        row: usize,
        cell: usize,
        pointer: PointerPosition,
    ) -> Result<(), ResizeMachineError> {
        self.ensure_idle()?;
        let session = ResizeSession::begin_column(layout, row, cell, pointer)?
            .with_snap(self.column_snap.clone());
        self.session = Some(session);
        Ok(())
    }

    pub fn begin_row_resize(
        &mut self,
        layout: &GridLayout,
        row: usize,
        pointer: PointerPosition,
    ) -> Result<(), ResizeMachineError> {
        self.ensure_idle()?;
        let session =
            ResizeSession::begin_row(layout, row, pointer)?.with_snap(self.row_snap.clone());
        self.session = Some(session);
        Ok(())
    }

    /// Pointer move. A vanished target ends the drag.
    pub fn pointer_move(
        &mut self,
        layout: &mut GridLayout,
        pointer: PointerPosition,
        extent: &impl ExtentSource,
    ) -> Result<Option<ResizeUpdate>, ResizeMachineError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        match session.update(layout, pointer, extent) {
            Ok(update) => Ok(Some(update)),
            Err(error) => {
                self.session = None;
                Err(error.into())
            }
        }
    }

    /// Pointer up: commit and return to idle.
    pub fn pointer_up(
        &mut self,
        layout: &mut GridLayout,
    ) -> Result<Option<ResizeUpdate>, ResizeMachineError> {
        match self.session.take() {
            None => Ok(None),
            Some(session) => Ok(Some(session.commit(layout)?)),
        }
    }

    /// Restore the pre-drag values and return to idle. `Ok(false)` if idle.
    pub fn cancel(&mut self, layout: &mut GridLayout) -> Result<bool, ResizeMachineError> {
        match self.session.take() {
            None => Ok(false),
            Some(session) => {
                session.cancel(layout)?;
                Ok(true)
            }
        }
    }

    /// Drop the active session without touching any layout.
    pub fn force_cancel(&mut self) -> Option<ResizeTarget> {
        let target = self.session.take().map(|session| session.target());
        if let Some(divider) = target {
            tracing::debug!(?divider, "resize session dropped");
        }
        target
    }

    fn ensure_idle(&self) -> Result<(), ResizeMachineError> {
        match &self.session {
            Some(active) => Err(ResizeMachineError::ActiveDragAlreadyInProgress {
                active: active.target(),
            }),
            None => Ok(()),
        }
    }
}
