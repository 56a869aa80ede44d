#![forbid(unsafe_code)]

//! Canned layout templates.
//!
//! A [`Template`] lists cells by `(row, col)` with optional widths and row
//! spans. [`build_layout`] turns it into a [`GridLayout`]; every template
//! yields rows whose coverage and heights sum to 100.
//!
//! Two shapes exist:
//!
//! - **Grid**: cells without an explicit width split whatever their row has
//!   left after explicit widths and spans carried down from earlier rows.
//! - **Hybrid**: one tall left cell beside two stacked right cells. It is
//!   recognized structurally (a `row_span == 2` cell, a cell at row 0/col 1,
//!   a cell at row 1/col 1) and assembled directly. If those cells are not
//!   all present the builder logs the anomaly and takes the grid path.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{
    ANY_DEVICE, Cell, CellSpan, GridLayout, GridLayoutDefinition, Priority, Row, rescale,
};
use crate::viewport::PerViewport;

/// Accepted drift for template output before renormalizing.
const TEMPLATE_TOLERANCE: f64 = 0.01;

/// Hybrid left width when none is given.
pub const DEFAULT_HYBRID_LEFT_WIDTH: f64 = 50.0;

/// Template shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TemplateKind {
    Grid,
    Hybrid {
        #[serde(default = "default_left_width")]
        left_width: f64,
    },
}

fn default_left_width() -> f64 {
    DEFAULT_HYBRID_LEFT_WIDTH
}

/// One cell of a template, addressed by grid coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCell {
    pub row: usize,
    pub col: usize,
    #[serde(default = "one")]
    pub row_span: u16,
    /// Percent of the row; `None` shares the row's remaining width.
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default = "any_device")]
    pub device_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub priority: Priority,
}

fn one() -> u16 {
    1
}

fn any_device() -> String {
    ANY_DEVICE.to_owned()
}

impl TemplateCell {
    #[must_use]
    pub fn new(row: usize, col: usize, device_type: impl Into<String>) -> Self {
        Self {
            row,
            col,
            row_span: 1,
            width: None,
            device_type: device_type.into(),
            name: String::new(),
            priority: Priority::Primary,
        }
    }

    #[must_use]
    pub fn width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    #[must_use]
    pub fn row_span(mut self, row_span: u16) -> Self {
        self.row_span = row_span.max(1);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// A named, reusable layout shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub kind: TemplateKind,
    pub cells: Vec<TemplateCell>,
    /// Per-row height percentages; missing or `None` rows share the rest.
    #[serde(default)]
    pub row_heights: Vec<Option<f64>>,
}

impl Template {
    #[must_use]
    pub fn grid(id: impl Into<String>, name: impl Into<String>, cells: Vec<TemplateCell>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            icon: None,
            kind: TemplateKind::Grid,
            cells,
            row_heights: Vec::new(),
        }
    }

    #[must_use]
    pub fn hybrid(
        id: impl Into<String>,
        name: impl Into<String>,
        left_width: f64,
        cells: Vec<TemplateCell>,
    ) -> Self {
        Self {
            kind: TemplateKind::Hybrid { left_width },
            ..Self::grid(id, name, cells)
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn with_row_heights(mut self, heights: impl IntoIterator<Item = Option<f64>>) -> Self {
        self.row_heights = heights.into_iter().collect();
        self
    }

    /// Id of definitions built from this template.
    #[must_use]
    pub fn definition_id(&self) -> String {
        template_definition_id(&self.id)
    }

    fn row_count(&self) -> usize {
        self.cells
            .iter()
            .map(|cell| cell.row + usize::from(cell.row_span.max(1)))
            .max()
            .unwrap_or(0)
            .max(self.row_heights.len())
    }
}

/// Definition id used for a template id.
#[must_use]
pub fn template_definition_id(template_id: &str) -> String {
    format!("template-{template_id}")
}

// =========================================================================
// Errors
// =========================================================================

/// Template lookup failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    UnknownTemplate { id: String },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTemplate { id } => write!(f, "unknown layout template '{id}'"),
        }
    }
}

impl std::error::Error for TemplateError {}

// =========================================================================
// Building
// =========================================================================

/// Build the layout for one viewport.
#[must_use]
pub fn build_layout(template: &Template) -> GridLayout {
    match template.kind {
        TemplateKind::Hybrid { left_width } => match HybridCells::find(template) {
            Some(cells) => build_hybrid(template, left_width, &cells),
            None => {
                tracing::warn!(
                    template = %template.id,
                    "hybrid template lacks a spanning left cell and two right cells; using grid layout"
                );
                build_grid(template)
            }
        },
        TemplateKind::Grid => build_grid(template),
    }
}

/// Build a definition using the same rows for every viewport.
#[must_use]
pub fn build_from_template(template: &Template, is_default: bool) -> GridLayoutDefinition {
    let layout = build_layout(template);
    let mut definition = GridLayoutDefinition::new(
        template.definition_id(),
        template.name.clone(),
        PerViewport::splat(layout),
    );
    definition.description = template.description.clone();
    definition.icon = template.icon.clone();
    definition.is_default = is_default;
    definition
}

struct HybridCells<'a> {
    left: &'a TemplateCell,
    top_right: &'a TemplateCell,
    bottom_right: &'a TemplateCell,
}

impl<'a> HybridCells<'a> {
    fn find(template: &'a Template) -> Option<Self> {
        let at = |row: usize, col: usize| {
            template
                .cells
                .iter()
                .find(|cell| cell.row == row && cell.col == col)
        };
        // Distinct positions, so three distinct cells.
        let left = at(0, 0).filter(|cell| cell.row_span == 2)?;
        let top_right = at(0, 1)?;
        let bottom_right = at(1, 1)?;
        Some(Self {
            left,
            top_right,
            bottom_right,
        })
    }
}

fn build_hybrid(template: &Template, left_width: f64, cells: &HybridCells<'_>) -> GridLayout {
    let left_width = if left_width > 0.0 && left_width < 100.0 {
        left_width
    } else {
        tracing::warn!(
            template = %template.id,
            left_width,
            "hybrid left width out of range; using default"
        );
        DEFAULT_HYBRID_LEFT_WIDTH
    };
    let right_width = 100.0 - left_width;

    let left = make_cell(template, cells.left, CellSpan::new(left_width, 2));
    let top_right = make_cell(template, cells.top_right, CellSpan::new(right_width, 1));
    let bottom_right = make_cell(template, cells.bottom_right, CellSpan::new(right_width, 1));

    GridLayout::new(vec![
        Row::new(row_id(template, 0), 50.0, vec![left, top_right]),
        Row::new(row_id(template, 1), 50.0, vec![bottom_right]),
    ])
}

fn build_grid(template: &Template) -> GridLayout {
    let row_count = template.row_count();
    let heights = distribute_heights(template, row_count);

    // Resolved spans from earlier rows: (bottom row exclusive, width).
    let mut carried_spans: Vec<(usize, f64)> = Vec::new();
    let mut rows = Vec::with_capacity(row_count);

    for (row_index, height) in heights.into_iter().enumerate() {
        let mut members: Vec<&TemplateCell> = template
            .cells
            .iter()
            .filter(|cell| cell.row == row_index)
            .collect();
        members.sort_by_key(|cell| cell.col);

        let carried: f64 = carried_spans
            .iter()
            .filter(|(bottom, _)| *bottom > row_index)
            .map(|(_, width)| width)
            .sum();
        let widths = distribute_widths(template, row_index, &members, carried);

        let cells: Vec<Cell> = members
            .iter()
            .zip(widths)
            .map(|(member, width)| make_cell(template, member, CellSpan::new(width, member.row_span)))
            .collect();

        for cell in cells.iter().filter(|cell| cell.is_spanning()) {
            carried_spans.push((row_index + usize::from(cell.row_span()), cell.width()));
        }

        rows.push(Row::new(row_id(template, row_index), height, cells));
    }

    GridLayout::new(rows)
}

/// Widths for one row's own cells so that own + carried = 100.
fn distribute_widths(
    template: &Template,
    row_index: usize,
    members: &[&TemplateCell],
    carried: f64,
) -> Vec<f64> {
    if members.is_empty() {
        if (carried - 100.0).abs() > TEMPLATE_TOLERANCE {
            tracing::warn!(
                template = %template.id,
                row = row_index,
                carried,
                "template row has no cells and is not fully covered by spans"
            );
        }
        return Vec::new();
    }

    let budget = (100.0 - carried).max(0.0);
    let explicit: f64 = members.iter().filter_map(|cell| cell.width).sum();
    let auto_count = members.iter().filter(|cell| cell.width.is_none()).count();
    let share = if auto_count > 0 {
        (budget - explicit).max(0.0) / auto_count as f64
    } else {
        0.0
    };

    let widths: Vec<f64> = members
        .iter()
        .map(|cell| cell.width.unwrap_or(share))
        .collect();

    let own: f64 = widths.iter().sum();
    if (own - budget).abs() <= TEMPLATE_TOLERANCE {
        return widths;
    }

    tracing::warn!(
        template = %template.id,
        row = row_index,
        own,
        budget,
        "template row widths do not fill the row; rescaling"
    );
    rescale(&widths, budget)
}

fn distribute_heights(template: &Template, row_count: usize) -> Vec<f64> {
    let explicit: Vec<Option<f64>> = (0..row_count)
        .map(|row| template.row_heights.get(row).copied().flatten())
        .collect();
    let explicit_sum: f64 = explicit.iter().flatten().sum();
    let auto_count = explicit.iter().filter(|height| height.is_none()).count();
    let share = if auto_count > 0 {
        (100.0 - explicit_sum).max(0.0) / auto_count as f64
    } else {
        0.0
    };
    let heights: Vec<f64> = explicit
        .iter()
        .map(|height| height.unwrap_or(share))
        .collect();

    let total: f64 = heights.iter().sum();
    if heights.is_empty() || (total - 100.0).abs() <= TEMPLATE_TOLERANCE {
        return heights;
    }
    tracing::warn!(
        template = %template.id,
        total,
        "template row heights do not sum to 100; rescaling"
    );
    rescale(&heights, 100.0)
}

fn make_cell(template: &Template, source: &TemplateCell, span: CellSpan) -> Cell {
    let name = if source.name.is_empty() {
        source.device_type.clone()
    } else {
        source.name.clone()
    };
    Cell {
        id: format!("{}-r{}-c{}", template.id, source.row, source.col),
        device_type: source.device_type.clone(),
        name,
        priority: source.priority,
        span,
    }
}

fn row_id(template: &Template, row_index: usize) -> String {
    format!("{}-row-{}", template.id, row_index)
}

// =========================================================================
// Catalog
// =========================================================================

/// The set of known templates, looked up by id.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
}

impl TemplateCatalog {
    #[must_use]
    pub fn new(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    /// The stock observatory templates.
    #[must_use]
    pub fn builtin() -> Self {
        let cell = TemplateCell::new;
        Self::new(vec![
            Template::grid("single", "Single Panel", vec![cell(0, 0, "camera")])
                .with_description("One full-size panel")
                .with_icon("square"),
            Template::grid(
                "two-column",
                "Two Columns",
                vec![cell(0, 0, "telescope"), cell(0, 1, "camera")],
            )
            .with_description("Two side-by-side panels")
            .with_icon("columns"),
            Template::grid(
                "three-column",
                "Three Columns",
                vec![
                    cell(0, 0, "telescope"),
                    cell(0, 1, "camera"),
                    cell(0, 2, "focuser"),
                ],
            )
            .with_description("Three side-by-side panels")
            .with_icon("columns-3"),
            Template::grid(
                "two-row",
                "Two Rows",
                vec![cell(0, 0, "camera"), cell(1, 0, "telescope")],
            )
            .with_description("Two stacked panels")
            .with_icon("rows"),
            Template::grid(
                "grid-2x2",
                "2 x 2 Grid",
                vec![
                    cell(0, 0, "telescope"),
                    cell(0, 1, "camera"),
                    cell(1, 0, "focuser"),
                    cell(1, 1, "filterwheel"),
                ],
            )
            .with_description("Four equal panels")
            .with_icon("grid"),
            Template::grid(
                "dashboard",
                "Observatory Dashboard",
                vec![
                    cell(0, 0, "camera").priority(Priority::Primary),
                    cell(1, 0, "telescope").priority(Priority::Secondary),
                    cell(1, 1, "focuser").priority(Priority::Secondary),
                    cell(2, 0, "filterwheel").priority(Priority::Tertiary),
                    cell(2, 1, "dome").priority(Priority::Tertiary),
                    cell(2, 2, "weather").priority(Priority::Tertiary),
                ],
            )
            .with_row_heights([Some(50.0), Some(25.0), Some(25.0)])
            .with_description("Imaging on top, mount and focus below, site status last")
            .with_icon("layout-dashboard"),
            Template::hybrid("hybrid-50", "Hybrid 50/50", 50.0, hybrid_cells())
                .with_description("Tall camera panel beside two stacked panels")
                .with_icon("layout-sidebar"),
            Template::hybrid("hybrid-66", "Hybrid 2/3", 66.67, hybrid_cells())
                .with_description("Wide tall camera panel beside two stacked panels")
                .with_icon("layout-sidebar"),
        ])
    }

    /// Look up a template.
    pub fn get(&self, id: &str) -> Result<&Template, TemplateError> {
        self.templates
            .iter()
            .find(|template| template.id == id)
            .ok_or_else(|| TemplateError::UnknownTemplate { id: id.to_owned() })
    }

    /// Add or replace a template by id.
    pub fn insert(&mut self, template: Template) {
        match self.templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => self.templates.push(template),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.id.as_str()).collect()
    }

    /// Build a definition from a template id.
    pub fn build(&self, id: &str, is_default: bool) -> Result<GridLayoutDefinition, TemplateError> {
        self.get(id)
            .map(|template| build_from_template(template, is_default))
    }
}

fn hybrid_cells() -> Vec<TemplateCell> {
    vec![
        TemplateCell::new(0, 0, "camera").row_span(2),
        TemplateCell::new(0, 1, "telescope").priority(Priority::Secondary),
        TemplateCell::new(1, 1, "focuser").priority(Priority::Secondary),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::convert;
    use crate::model::PERCENT_TOLERANCE;

    fn assert_conserves(layout: &GridLayout) {
        for row_index in 0..layout.rows().len() {
            let coverage = layout.row_coverage(row_index).expect("row");
            assert!(
                (coverage.total() - 100.0).abs() <= TEMPLATE_TOLERANCE,
                "row {row_index} covers {}",
                coverage.total()
            );
        }
        assert!((layout.total_height() - 100.0).abs() <= TEMPLATE_TOLERANCE);
    }

    #[test]
    fn every_builtin_conserves_widths_and_heights() {
        let catalog = TemplateCatalog::builtin();
        for template in catalog.iter() {
            let layout = build_layout(template);
            assert!(!layout.is_empty(), "{} is empty", template.id);
            assert_conserves(&layout);
            assert!(layout.invariant_report().is_clean(), "{}", template.id);
        }
    }

    #[test]
    fn dashboard_matches_three_row_scenario() {
        let catalog = TemplateCatalog::builtin();
        let layout = build_layout(catalog.get("dashboard").expect("builtin"));
        let positions = convert(&layout);
        let ys: Vec<u16> = positions.iter().map(|p| p.y).collect();
        let xs: Vec<u16> = positions.iter().map(|p| p.x).collect();
        let widths: Vec<u16> = positions.iter().map(|p| p.width).collect();
        assert_eq!(ys, [0, 1, 1, 2, 2, 2]);
        assert_eq!(xs, [0, 0, 6, 0, 4, 8]);
        assert_eq!(widths, [12, 6, 6, 4, 4, 4]);
    }

    #[test]
    fn hybrid_is_assembled_directly() {
        let catalog = TemplateCatalog::builtin();
        let layout = build_layout(catalog.get("hybrid-50").expect("builtin"));
        assert_eq!(layout.rows().len(), 2);
        assert_eq!(layout.rows()[0].cells.len(), 2);
        assert_eq!(layout.rows()[1].cells.len(), 1);
        assert_eq!(layout.rows()[0].height, 50.0);
        assert_eq!(
            layout.rows()[0].cells[0].span,
            CellSpan::Spanning {
                width: 50.0,
                row_span: 2
            }
        );
    }

    #[test]
    fn hybrid_66_widths() {
        let catalog = TemplateCatalog::builtin();
        let layout = build_layout(catalog.get("hybrid-66").expect("builtin"));
        let left = &layout.rows()[0].cells[0];
        let right = &layout.rows()[1].cells[0];
        assert!((left.width() - 66.67).abs() < 1e-9);
        assert!((right.width() - 33.33).abs() < 1e-9);
        let positions = convert(&layout);
        assert_eq!((positions[0].x, positions[0].width, positions[0].height), (0, 8, 2));
        assert_eq!((positions[2].x, positions[2].y, positions[2].width), (8, 1, 4));
    }

    #[test]
    fn malformed_hybrid_falls_back_to_grid() {
        let template = Template::hybrid(
            "broken",
            "Broken",
            50.0,
            vec![TemplateCell::new(0, 0, "camera"), TemplateCell::new(0, 1, "dome")],
        );
        let layout = build_layout(&template);
        assert_eq!(layout.rows().len(), 1);
        assert_eq!(layout.rows()[0].cells.len(), 2);
        assert_conserves(&layout);
    }

    #[test]
    fn hybrid_needs_spanning_cell_at_origin() {
        let template = Template::hybrid(
            "offset",
            "Offset span",
            50.0,
            vec![
                TemplateCell::new(0, 0, "camera"),
                TemplateCell::new(0, 1, "dome").row_span(2),
                TemplateCell::new(1, 1, "weather"),
            ],
        );
        let layout = build_layout(&template);
        let ids: Vec<&str> = layout.rows()[0].cells.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["offset-r0-c0", "offset-r0-c1"]);
        assert_eq!(layout.rows()[0].cells[1].row_span(), 2);
        assert_eq!(layout.panel_ids().len(), 3);
    }

    #[test]
    fn explicit_widths_leave_remainder_to_auto_cells() {
        let template = Template::grid(
            "mix",
            "Mix",
            vec![
                TemplateCell::new(0, 0, "camera").width(50.0),
                TemplateCell::new(0, 1, "dome"),
                TemplateCell::new(0, 2, "weather"),
            ],
        );
        let layout = build_layout(&template);
        let widths: Vec<f64> = layout.rows()[0].cells.iter().map(Cell::width).collect();
        assert_eq!(widths, [50.0, 25.0, 25.0]);
    }

    #[test]
    fn spanning_width_is_subtracted_in_later_rows() {
        let template = Template::grid(
            "side",
            "Sidebar",
            vec![
                TemplateCell::new(0, 0, "camera").width(40.0).row_span(3),
                TemplateCell::new(0, 1, "telescope"),
                TemplateCell::new(1, 1, "focuser"),
                TemplateCell::new(1, 2, "dome"),
                TemplateCell::new(2, 1, "weather"),
            ],
        );
        let layout = build_layout(&template);
        assert_conserves(&layout);
        assert_eq!(layout.rows()[0].cells[1].width(), 60.0);
        assert_eq!(layout.rows()[1].cells[0].width(), 30.0);
        assert_eq!(layout.rows()[2].cells[0].width(), 60.0);

        let positions = convert(&layout);
        assert_eq!(positions[0].height, 3);
        assert!(positions.iter().skip(1).all(|p| p.x >= 5));
    }

    #[test]
    fn overfull_row_is_rescaled() {
        let template = Template::grid(
            "wide",
            "Too wide",
            vec![
                TemplateCell::new(0, 0, "camera").width(80.0),
                TemplateCell::new(0, 1, "dome").width(80.0),
            ],
        );
        let layout = build_layout(&template);
        let widths: Vec<f64> = layout.rows()[0].cells.iter().map(Cell::width).collect();
        assert_eq!(widths, [50.0, 50.0]);
    }

    #[test]
    fn heights_mix_explicit_and_auto() {
        let template = Template::grid(
            "h",
            "Heights",
            vec![
                TemplateCell::new(0, 0, "camera"),
                TemplateCell::new(1, 0, "dome"),
                TemplateCell::new(2, 0, "weather"),
            ],
        )
        .with_row_heights([Some(60.0)]);
        let layout = build_layout(&template);
        let heights: Vec<f64> = layout.rows().iter().map(|r| r.height).collect();
        assert_eq!(heights, [60.0, 20.0, 20.0]);
        assert!((layout.total_height() - 100.0).abs() <= PERCENT_TOLERANCE);
    }

    #[test]
    fn build_from_template_reuses_rows_per_viewport() {
        let catalog = TemplateCatalog::builtin();
        let definition = catalog.build("grid-2x2", true).expect("builtin");
        assert_eq!(definition.id, "template-grid-2x2");
        assert!(definition.is_default);
        assert_eq!(definition.icon.as_deref(), Some("grid"));
        assert_eq!(definition.layouts.desktop, definition.layouts.mobile);
        assert_eq!(definition.layouts.desktop, definition.layouts.tablet);
        assert_eq!(definition.layouts.desktop.panel_ids().len(), 4);
    }

    #[test]
    fn unknown_template_is_an_error() {
        let catalog = TemplateCatalog::builtin();
        let err = catalog.build("nope", false).expect_err("unknown id");
        assert_eq!(err, TemplateError::UnknownTemplate { id: "nope".into() });
        assert_eq!(err.to_string(), "unknown layout template 'nope'");
    }

    #[test]
    fn catalog_insert_replaces_by_id() {
        let mut catalog = TemplateCatalog::builtin();
        let count = catalog.ids().len();
        catalog.insert(Template::grid("single", "Solo", vec![TemplateCell::new(0, 0, "dome")]));
        assert_eq!(catalog.ids().len(), count);
        assert_eq!(catalog.get("single").expect("present").name, "Solo");
    }

    #[test]
    fn template_json_round_trip() {
        let catalog = TemplateCatalog::builtin();
        let template = catalog.get("hybrid-66").expect("builtin");
        let json = serde_json::to_string(template).expect("serialize");
        let back: Template = serde_json::from_str(&json).expect("decode");
        assert_eq!(&back, template);
    }
}
