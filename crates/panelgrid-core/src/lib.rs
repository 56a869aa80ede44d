#![forbid(unsafe_code)]

//! Core: grid-unit geometry, pointer input, and logging bootstrap.
//!
//! # Role in PanelGrid
//! `panelgrid-core` holds the host-agnostic primitives the layout engine and
//! any rendering adapter share. It has no knowledge of rows, cells, or
//! templates.
//!
//! # Primary responsibilities
//! - **GridRect**: footprints in the 12-column unit grid, with overlap tests.
//! - **PointerPosition / ContainerExtent**: the inputs a divider drag needs,
//!   decoupled from any DOM or event-listener API.
//! - **Logging**: optional `tracing` re-exports and subscriber setup.

pub mod geometry;
pub mod input;
pub mod logging;

pub use geometry::GridRect;
pub use input::{Axis, ContainerExtent, ExtentSource, PointerPosition};

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, error, info, trace, warn};
