#![forbid(unsafe_code)]

//! Pointer and container-measurement inputs for divider drags.
//!
//! Hosts translate their native pointer events (DOM `PointerEvent`, terminal
//! mouse reports, synthetic test input) into [`PointerPosition`] values and
//! expose the measured size of the grid container through [`ExtentSource`].
//! Nothing in this module registers listeners or queries a document.

/// Axis along which a drag is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Left to right (column dividers, container width).
    Horizontal,
    /// Top to bottom (row dividers, container height).
    Vertical,
}

/// Pointer coordinate in host pixels (document space).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

impl PointerPosition {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Coordinate along one axis.
    #[must_use]
    pub const fn along(self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.x,
            Axis::Vertical => self.y,
        }
    }

    /// Signed distance from `origin` to `self` along one axis.
    #[must_use]
    pub fn delta_from(self, origin: PointerPosition, axis: Axis) -> f64 {
        self.along(axis) - origin.along(axis)
    }
}

/// Measured pixel size of the grid container.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContainerExtent {
    pub width: f64,
    pub height: f64,
}

impl ContainerExtent {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Size along one axis.
    #[must_use]
    pub const fn along(self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.width,
            Axis::Vertical => self.height,
        }
    }
}

/// Live measurement source for the container a drag happens in.
///
/// Queried on every pointer move, so hosts whose container resizes mid-drag
/// report the current size.
pub trait ExtentSource {
    fn extent(&self) -> ContainerExtent;
}

impl ExtentSource for ContainerExtent {
    fn extent(&self) -> ContainerExtent {
        *self
    }
}

impl<F> ExtentSource for F
where
    F: Fn() -> ContainerExtent,
{
    fn extent(&self) -> ContainerExtent {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn pointer_delta_uses_requested_axis() {
        let origin = PointerPosition::new(100.0, 40.0);
        let current = PointerPosition::new(130.0, 10.0);
        assert_eq!(current.delta_from(origin, Axis::Horizontal), 30.0);
        assert_eq!(current.delta_from(origin, Axis::Vertical), -30.0);
    }

    #[test]
    fn extent_along_axis() {
        let extent = ContainerExtent::new(1200.0, 800.0);
        assert_eq!(extent.along(Axis::Horizontal), 1200.0);
        assert_eq!(extent.along(Axis::Vertical), 800.0);
    }

    #[test]
    fn fixed_extent_is_a_source() {
        let extent = ContainerExtent::new(640.0, 480.0);
        assert_eq!(extent.extent(), extent);
    }

    #[test]
    fn closure_source_is_queried_each_time() {
        let width = Cell::new(500.0);
        let source = || ContainerExtent::new(width.get(), 300.0);
        assert_eq!(source.extent().width, 500.0);
        width.set(750.0);
        assert_eq!(source.extent().width, 750.0);
    }
}
