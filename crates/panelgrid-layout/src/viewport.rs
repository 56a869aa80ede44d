#![forbid(unsafe_code)]

//! Viewport classification and per-viewport storage.
//!
//! A measured window width maps to one of three [`Viewport`] classes via
//! [`Breakpoints`]. Each [`GridLayoutDefinition`](crate::GridLayoutDefinition)
//! stores one independent [`GridLayout`](crate::GridLayout) per class in a
//! [`PerViewport`]; switching class only changes which entry is read.
//!
//! # Invariants
//!
//! 1. `classify()` is total: every width (including negative) maps to a class.
//! 2. Classification is monotonic: a wider window never yields a smaller class.
//! 3. Re-classification is cheap and idempotent; no debounce is applied here.
//!
//! # Failure Modes
//!
//! None. A `NaN` width classifies as `Desktop` (no comparison succeeds).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Viewport class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Viewport {
    Mobile,
    Tablet,
    Desktop,
}

impl Viewport {
    /// All classes, smallest first.
    pub const ALL: [Viewport; 3] = [Viewport::Mobile, Viewport::Tablet, Viewport::Desktop];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
            Self::Desktop => "desktop",
        }
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Width thresholds (in host pixels) separating viewport classes.
///
/// `width < tablet_min` is mobile, `width < desktop_min` is tablet,
/// everything else is desktop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Breakpoints {
    pub tablet_min: f64,
    pub desktop_min: f64,
}

impl Breakpoints {
    /// 768 / 1200.
    pub const DEFAULT: Self = Self {
        tablet_min: 768.0,
        desktop_min: 1200.0,
    };

    #[must_use]
    pub const fn new(tablet_min: f64, desktop_min: f64) -> Self {
        Self {
            tablet_min,
            desktop_min,
        }
    }

    /// Classify a window width.
    #[must_use]
    pub fn classify(&self, width: f64) -> Viewport {
        if width < self.tablet_min {
            Viewport::Mobile
        } else if width < self.desktop_min {
            Viewport::Tablet
        } else {
            Viewport::Desktop
        }
    }

    /// Returns `Some((old, new))` if the width change crosses a breakpoint.
    #[must_use]
    pub fn detect_transition(&self, old_width: f64, new_width: f64) -> Option<(Viewport, Viewport)> {
        let old = self.classify(old_width);
        let new = self.classify(new_width);
        (old != new).then_some((old, new))
    }
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Classify with the default breakpoints.
#[must_use]
pub fn classify(width: f64) -> Viewport {
    Breakpoints::DEFAULT.classify(width)
}

/// A change of active viewport reported by [`ViewportSelector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportTransition {
    /// `None` on the first observation.
    pub from: Option<Viewport>,
    pub to: Viewport,
}

/// Tracks the active viewport across window resize observations.
#[derive(Debug, Clone, Default)]
pub struct ViewportSelector {
    breakpoints: Breakpoints,
    current: Option<Viewport>,
}

impl ViewportSelector {
    #[must_use]
    pub fn new(breakpoints: Breakpoints) -> Self {
        Self {
            breakpoints,
            current: None,
        }
    }

    /// Active viewport, if any width has been observed yet.
    #[must_use]
    pub const fn current(&self) -> Option<Viewport> {
        self.current
    }

    #[must_use]
    pub const fn breakpoints(&self) -> Breakpoints {
        self.breakpoints
    }

    /// Feed a measured window width.
    ///
    /// Returns a transition only when the class differs from the last one.
    pub fn observe(&mut self, width: f64) -> Option<ViewportTransition> {
        let next = self.breakpoints.classify(width);
        if self.current == Some(next) {
            return None;
        }
        let transition = ViewportTransition {
            from: self.current,
            to: next,
        };
        tracing::debug!(
            from = ?transition.from,
            to = %transition.to,
            width,
            "viewport changed"
        );
        self.current = Some(next);
        Some(transition)
    }
}

/// One value per viewport class.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerViewport<T> {
    pub desktop: T,
    pub tablet: T,
    pub mobile: T,
}

impl<T> PerViewport<T> {
    pub const fn new(desktop: T, tablet: T, mobile: T) -> Self {
        Self {
            desktop,
            tablet,
            mobile,
        }
    }

    pub const fn get(&self, viewport: Viewport) -> &T {
        match viewport {
            Viewport::Desktop => &self.desktop,
            Viewport::Tablet => &self.tablet,
            Viewport::Mobile => &self.mobile,
        }
    }

    pub fn get_mut(&mut self, viewport: Viewport) -> &mut T {
        match viewport {
            Viewport::Desktop => &mut self.desktop,
            Viewport::Tablet => &mut self.tablet,
            Viewport::Mobile => &mut self.mobile,
        }
    }

    /// Entries in [`Viewport::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Viewport, &T)> {
        Viewport::ALL.into_iter().map(move |vp| (vp, self.get(vp)))
    }

    #[must_use]
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerViewport<U> {
        PerViewport {
            desktop: f(&self.desktop),
            tablet: f(&self.tablet),
            mobile: f(&self.mobile),
        }
    }
}

impl<T: Clone> PerViewport<T> {
    /// Same value for every class.
    pub fn splat(value: T) -> Self {
        Self {
            desktop: value.clone(),
            tablet: value.clone(),
            mobile: value,
        }
    }
}
