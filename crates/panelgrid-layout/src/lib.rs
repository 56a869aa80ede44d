#![forbid(unsafe_code)]

//! Responsive panel grid layouts.
//!
//! A [`GridLayoutDefinition`] holds one row/cell [`GridLayout`] per
//! [`Viewport`]. Cells size themselves in row percentages and may span rows.
//! The engine turns that model into absolute 12-column placements
//! ([`convert`]), builds layouts from canned [`Template`]s, edits them
//! structurally ([`edit`]), resizes them by divider drags with snapping
//! ([`resize`]), and keeps a repository of definitions with an active one
//! ([`LayoutRepository`]).
//!
//! Everything is synchronous and single-threaded. Rendering, pointer event
//! wiring and storage belong to the host.
//!
//! ```
//! use panelgrid_layout::{TemplateCatalog, Viewport, build_from_template, convert};
//!
//! let catalog = TemplateCatalog::builtin();
//! let definition = build_from_template(catalog.get("hybrid-50")?, true);
//! let positions = convert(definition.layout(Viewport::Desktop));
//! assert_eq!(positions.len(), 3);
//! assert_eq!((positions[2].x, positions[2].y), (6, 1));
//! # Ok::<(), panelgrid_layout::TemplateError>(())
//! ```

pub mod config;
pub mod convert;
pub mod edit;
pub mod model;
pub mod repository;
pub mod resize;
pub mod template;
pub mod viewport;

pub use config::{ConfigError, EngineConfig};
pub use convert::{PanelPosition, PositionCache, convert, convert_definition, grid_units};
pub use edit::{EditError, add_cell, add_row, assign_panel, delete_cell, delete_row};
pub use model::{
    Cell, CellSpan, DeviceKind, GRID_COLUMNS, GridLayout, GridLayoutDefinition,
    LayoutInvariantCode, LayoutInvariantIssue, LayoutInvariantReport, PERCENT_TOLERANCE, Priority,
    Row, RowCoverage,
};
pub use repository::{
    LayoutRepository, LayoutStore, MemoryLayoutStore, REPOSITORY_SCHEMA_VERSION, RepositoryError,
    RepositorySnapshot, SnapshotError,
};
pub use resize::{
    ResizeAxis, ResizeError, ResizeMachine, ResizeMachineError, ResizeSession, ResizeState,
    ResizeTarget, ResizeUpdate, SnapConfig,
};
pub use template::{
    Template, TemplateCatalog, TemplateCell, TemplateError, TemplateKind, build_from_template,
    build_layout,
};
pub use viewport::{
    Breakpoints, PerViewport, Viewport, ViewportSelector, ViewportTransition, classify,
};

pub use panelgrid_core::{ContainerExtent, ExtentSource, GridRect, PointerPosition};

#[cfg(feature = "tracing-json")]
pub use panelgrid_core::logging::{LoggingError, init_json_subscriber};
