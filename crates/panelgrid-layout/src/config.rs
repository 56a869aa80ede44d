#![forbid(unsafe_code)]

//! Engine tunables as data.
//!
//! [`EngineConfig`] gathers the breakpoints, both snap policies and any
//! site-specific templates so hosts can change them without rebuilding.
//! Every field defaults to the built-in constants, so
//! `EngineConfig::default()` behaves exactly like the hardcoded engine.
//!
//! ```toml
//! [breakpoints]
//! tablet_min = 700.0
//!
//! [column_resize]
//! snap_threshold = 3.0
//! ```
//!
//! ```rust,ignore
//! let config = EngineConfig::from_toml_file("panelgrid.toml")?.validated()?;
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::resize::SnapConfig;
use crate::template::{Template, TemplateCatalog};
use crate::viewport::Breakpoints;

/// All engine tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub breakpoints: Breakpoints,
    #[serde(deserialize_with = "column_policy")]
    pub column_resize: SnapConfig,
    #[serde(deserialize_with = "row_policy")]
    pub row_resize: SnapConfig,
    /// Added to the built-in catalog; an id already present replaces it.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<Template>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            breakpoints: Breakpoints::default(),
            column_resize: SnapConfig::columns(),
            row_resize: SnapConfig::rows(),
            templates: Vec::new(),
        }
    }
}

/// A snap policy section as written; unset fields keep the axis defaults.
#[derive(Debug, Deserialize)]
struct SnapConfigPatch {
    snap_points: Option<Vec<f64>>,
    snap_threshold: Option<f64>,
    min_percent: Option<f64>,
    max_percent: Option<f64>,
}

impl SnapConfigPatch {
    fn over(self, base: SnapConfig) -> SnapConfig {
        SnapConfig {
            snap_points: self.snap_points.unwrap_or(base.snap_points),
            snap_threshold: self.snap_threshold.unwrap_or(base.snap_threshold),
            min_percent: self.min_percent.unwrap_or(base.min_percent),
            max_percent: self.max_percent.unwrap_or(base.max_percent),
        }
    }
}

fn column_policy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SnapConfig, D::Error> {
    SnapConfigPatch::deserialize(deserializer).map(|patch| patch.over(SnapConfig::columns()))
}

fn row_policy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SnapConfig, D::Error> {
    SnapConfigPatch::deserialize(deserializer).map(|patch| patch.over(SnapConfig::rows()))
}

impl EngineConfig {
    /// Load from a TOML string.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Every out-of-range parameter. Empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let Breakpoints {
            tablet_min,
            desktop_min,
        } = self.breakpoints;
        if !(tablet_min > 0.0 && tablet_min < desktop_min) {
            errors.push(format!(
                "breakpoints must satisfy 0 < tablet_min < desktop_min, got {tablet_min} and {desktop_min}"
            ));
        }

        errors.extend(self.column_resize.problems("column_resize"));
        errors.extend(self.row_resize.problems("row_resize"));

        for template in &self.templates {
            if template.id.is_empty() {
                errors.push(format!("template '{}' has an empty id", template.name));
            }
            if template.cells.is_empty() {
                errors.push(format!("template '{}' has no cells", template.id));
            }
        }
        errors
    }

    /// `self` if [`validate`](Self::validate) finds nothing.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Built-in templates plus the configured ones.
    #[must_use]
    pub fn catalog(&self) -> TemplateCatalog {
        let mut catalog = TemplateCatalog::builtin();
        for template in &self.templates {
            catalog.insert(template.clone());
        }
        catalog
    }
}

/// Errors that can occur when loading an [`EngineConfig`].
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    #[cfg(feature = "policy-config")]
    Toml(toml::de::Error),
    Json(serde_json::Error),
    Validation(Vec<String>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "policy-config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => write!(f, "validation errors: {}", errors.join("; ")),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "policy-config")]
            Self::Toml(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resize::{COLUMN_SNAP_POINTS, ROW_SNAP_POINTS, ResizeAxis, ResizeMachine};
    use crate::viewport::Viewport;

    #[test]
    fn defaults_match_builtin_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.breakpoints, Breakpoints::DEFAULT);
        assert_eq!(config.column_resize.snap_points, COLUMN_SNAP_POINTS);
        assert_eq!(config.row_resize.snap_points, ROW_SNAP_POINTS);
        assert_eq!(config.row_resize.min_percent, 15.0);
        assert_eq!(config.column_resize.max_percent, 85.0);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn json_partial_fields_fall_back_to_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "breakpoints": { "tablet_min": 600.0 }, "row_resize": { "snap_threshold": 2.5 } }"#,
        )
        .expect("valid json");
        assert_eq!(config.breakpoints.tablet_min, 600.0);
        assert_eq!(config.breakpoints.desktop_min, 1200.0);
        assert_eq!(config.breakpoints.classify(650.0), Viewport::Tablet);
        assert_eq!(config.row_resize.snap_threshold, 2.5);
        assert_eq!(config.row_resize.snap_points, ROW_SNAP_POINTS);
        assert_eq!(config.column_resize, SnapConfig::columns());
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn toml_loading() {
        let config = EngineConfig::from_toml_str(
            r#"
            [column_resize]
            snap_points = [25.0, 50.0, 75.0]

            [[templates]]
            id = "guide"
            name = "Guiding"
            kind = { type = "grid" }
            cells = [
                { row = 0, col = 0, deviceType = "camera" },
                { row = 0, col = 1, deviceType = "telescope", width = 30.0 },
            ]
            "#,
        )
        .expect("valid toml");
        assert_eq!(config.column_resize.snap_points, [25.0, 50.0, 75.0]);
        assert_eq!(config.templates.len(), 1);

        let catalog = config.catalog();
        let definition = catalog.build("guide", false).expect("configured template");
        let widths: Vec<f64> = definition.layouts.desktop.rows()[0]
            .cells
            .iter()
            .map(|cell| cell.width())
            .collect();
        assert_eq!(widths, [70.0, 30.0]);
        assert!(catalog.get("dashboard").is_ok());
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn toml_partial_row_section_keeps_row_snap_points() {
        let config = EngineConfig::from_toml_str(
            r#"
            [row_resize]
            snap_threshold = 2.5
            min_percent = 10.0
            "#,
        )
        .expect("valid toml");
        assert_eq!(config.row_resize.snap_points, ROW_SNAP_POINTS);
        assert_eq!(config.row_resize.snap_threshold, 2.5);
        assert_eq!(config.row_resize.min_percent, 10.0);
        assert_eq!(config.row_resize.max_percent, 85.0);
        assert_eq!(config.column_resize, SnapConfig::columns());

        let machine = ResizeMachine::from_config(&config);
        assert_eq!(machine.snap(ResizeAxis::Row), &config.row_resize);
        assert_eq!(machine.snap(ResizeAxis::Column), &SnapConfig::columns());
    }

    #[test]
    fn partial_column_section_keeps_column_snap_points() {
        let config = EngineConfig::from_json_str(r#"{ "column_resize": { "max_percent": 80.0 } }"#)
            .expect("valid json");
        assert_eq!(config.column_resize.snap_points, COLUMN_SNAP_POINTS);
        assert_eq!(config.column_resize.max_percent, 80.0);
        assert_eq!(config.row_resize, SnapConfig::rows());
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn toml_syntax_error_is_reported() {
        let err = EngineConfig::from_toml_str("[breakpoints\n").expect_err("bad toml");
        assert!(matches!(err, ConfigError::Toml(_)));
        assert!(err.to_string().starts_with("TOML parse error"));
    }

    #[test]
    fn json_type_error_is_reported() {
        let err = EngineConfig::from_json_str(r#"{ "breakpoints": 3 }"#).expect_err("bad json");
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EngineConfig::from_json_file("/nonexistent/panelgrid.json").expect_err("no file");
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn validate_collects_every_problem() {
        let mut config = EngineConfig::default();
        config.breakpoints = Breakpoints::new(1300.0, 1200.0);
        config.column_resize.snap_threshold = -1.0;
        config.row_resize.snap_points = vec![120.0];
        config.templates.push(Template::grid("empty", "Empty", vec![]));
        let errors = config.validate();
        assert_eq!(errors.len(), 4, "{errors:?}");

        match config.validated() {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 4),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }
}
