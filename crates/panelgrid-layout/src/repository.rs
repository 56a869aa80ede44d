#![forbid(unsafe_code)]

//! Arena of layout definitions with one active entry.
//!
//! [`LayoutRepository`] owns every [`GridLayoutDefinition`] the host knows
//! about, in insertion order, plus the id of the active one. It is passed
//! around explicitly; nothing here is global.
//!
//! # Invariants
//!
//! 1. Ids are unique.
//! 2. `active`, when set, names a stored definition.
//! 3. At most one definition has `is_default` set through [`LayoutRepository::set_default`].
//!
//! # Failure Modes
//!
//! Removing the active definition is not an error: the first remaining
//! definition becomes active, or none does when the arena is empty. Unknown
//! ids and unknown templates are reported as [`RepositoryError`].
//!
//! # Persistence
//!
//! [`RepositorySnapshot`] is the versioned, serializable form. A host hands
//! it to a [`LayoutStore`]; [`MemoryLayoutStore`] keeps it as JSON in memory.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::convert::{PanelPosition, convert};
use crate::model::{GridLayoutDefinition, now_millis};
use crate::template::{TemplateCatalog, TemplateError, build_from_template, template_definition_id};
use crate::viewport::Viewport;

/// Current snapshot schema version.
pub const REPOSITORY_SCHEMA_VERSION: u16 = 1;

// =========================================================================
// Errors
// =========================================================================

/// Snapshot validation and decoding failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    UnsupportedVersion { found: u16, expected: u16 },
    DuplicateLayoutId { id: String },
    ActiveLayoutNotFound { id: String },
    EmptyLayoutName { id: String },
    Json { reason: String },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, expected } => write!(
                f,
                "unsupported layout snapshot version {found} (expected {expected})"
            ),
            Self::DuplicateLayoutId { id } => write!(f, "layout id '{id}' appears more than once"),
            Self::ActiveLayoutNotFound { id } => {
                write!(f, "active layout '{id}' is not in the snapshot")
            }
            Self::EmptyLayoutName { id } => write!(f, "layout '{id}' has an empty name"),
            Self::Json { reason } => write!(f, "layout snapshot JSON error: {reason}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    UnknownLayout { id: String },
    Template(TemplateError),
    Snapshot(SnapshotError),
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownLayout { id } => write!(f, "unknown layout '{id}'"),
            Self::Template(e) => write!(f, "template error: {e}"),
            Self::Snapshot(e) => write!(f, "snapshot error: {e}"),
        }
    }
}

impl std::error::Error for RepositoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnknownLayout { .. } => None,
            Self::Template(e) => Some(e),
            Self::Snapshot(e) => Some(e),
        }
    }
}

impl From<TemplateError> for RepositoryError {
    fn from(err: TemplateError) -> Self {
        Self::Template(err)
    }
}

impl From<SnapshotError> for RepositoryError {
    fn from(err: SnapshotError) -> Self {
        Self::Snapshot(err)
    }
}

// =========================================================================
// Repository
// =========================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutRepository {
    layouts: Vec<GridLayoutDefinition>,
    active: Option<String>,
}

impl LayoutRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.layouts.iter().map(|def| def.id.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GridLayoutDefinition> {
        self.layouts.iter()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.layouts.iter().position(|def| def.id == id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&GridLayoutDefinition> {
        self.layouts.iter().find(|def| def.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut GridLayoutDefinition> {
        self.layouts.iter_mut().find(|def| def.id == id)
    }

    /// Store a definition, replacing any with the same id. The first
    /// definition stored into a repository with no active layout becomes
    /// active.
    pub fn insert(&mut self, definition: GridLayoutDefinition) -> Option<GridLayoutDefinition> {
        let id = definition.id.clone();
        let replaced = match self.position(&id) {
            Some(index) => Some(std::mem::replace(&mut self.layouts[index], definition)),
            None => {
                self.layouts.push(definition);
                None
            }
        };
        if self.active.is_none() {
            self.active = Some(id.clone());
        }
        tracing::info!(layout_id = %id, replaced = replaced.is_some(), "layout stored");
        replaced
    }

    pub fn set_active(&mut self, id: &str) -> Result<(), RepositoryError> {
        if self.position(id).is_none() {
            return Err(RepositoryError::UnknownLayout { id: id.to_owned() });
        }
        self.active = Some(id.to_owned());
        tracing::info!(layout_id = %id, "active layout changed");
        Ok(())
    }

    #[must_use]
    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    #[must_use]
    pub fn active(&self) -> Option<&GridLayoutDefinition> {
        self.active.as_deref().and_then(|id| self.get(id))
    }

    pub fn active_mut(&mut self) -> Option<&mut GridLayoutDefinition> {
        let id = self.active.clone()?;
        self.get_mut(&id)
    }

    /// Placements for the active layout in `viewport`; empty when no
    /// layout is active.
    #[must_use]
    pub fn active_positions(&self, viewport: Viewport) -> Vec<PanelPosition> {
        self.active()
            .map(|def| convert(def.layout(viewport)))
            .unwrap_or_default()
    }

    /// Delete a definition. If it was active, the first remaining one takes
    /// over, or nothing is active when none remain.
    pub fn remove(&mut self, id: &str) -> Result<GridLayoutDefinition, RepositoryError> {
        let index = self
            .position(id)
            .ok_or_else(|| RepositoryError::UnknownLayout { id: id.to_owned() })?;
        let removed = self.layouts.remove(index);
        tracing::info!(layout_id = %id, "layout removed");

        if self.active.as_deref() == Some(id) {
            self.active = self.layouts.first().map(|def| def.id.clone());
            match &self.active {
                Some(next) => tracing::info!(layout_id = %next, "active layout fell back"),
                None => tracing::info!("no layouts left; nothing is active"),
            }
        }
        Ok(removed)
    }

    /// Mark `id` as the only default definition.
    pub fn set_default(&mut self, id: &str) -> Result<(), RepositoryError> {
        if self.position(id).is_none() {
            return Err(RepositoryError::UnknownLayout { id: id.to_owned() });
        }
        for def in &mut self.layouts {
            let is_default = def.id == id;
            if def.is_default != is_default {
                def.is_default = is_default;
                def.touch();
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn default_layout(&self) -> Option<&GridLayoutDefinition> {
        self.layouts.iter().find(|def| def.is_default)
    }

    /// Copy a definition under a fresh id (`"{id}-copy"`, `"{id}-copy-2"`,
    /// ...). The copy is never the default. Returns the new id.
    pub fn duplicate(&mut self, id: &str, new_name: impl Into<String>) -> Result<String, RepositoryError> {
        let source = self
            .get(id)
            .ok_or_else(|| RepositoryError::UnknownLayout { id: id.to_owned() })?;
        let new_id = (1usize..)
            .map(|n| match n {
                1 => format!("{id}-copy"),
                n => format!("{id}-copy-{n}"),
            })
            .find(|candidate| self.position(candidate).is_none())
            .unwrap_or_else(|| format!("{id}-copy-0"));

        let now = now_millis();
        let copy = GridLayoutDefinition {
            id: new_id.clone(),
            name: new_name.into(),
            is_default: false,
            created_at: now,
            updated_at: now,
            ..source.clone()
        };
        self.insert(copy);
        Ok(new_id)
    }

    /// The definition built from `template_id`, creating and storing it on
    /// first use.
    pub fn get_or_create_template_layout(
        &mut self,
        catalog: &TemplateCatalog,
        template_id: &str,
    ) -> Result<&GridLayoutDefinition, RepositoryError> {
        let id = template_definition_id(template_id);
        let index = match self.position(&id) {
            Some(index) => index,
            None => {
                let template = catalog.get(template_id)?;
                let definition = build_from_template(template, false);
                tracing::info!(layout_id = %id, template = %template_id, "layout created from template");
                self.insert(definition);
                self.layouts.len() - 1
            }
        };
        Ok(&self.layouts[index])
    }

    // ---------------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn snapshot(&self) -> RepositorySnapshot {
        RepositorySnapshot {
            schema_version: REPOSITORY_SCHEMA_VERSION,
            layouts: self.layouts.clone(),
            active_layout_id: self.active.clone(),
        }
    }

    /// Rebuild from a validated snapshot. A snapshot without an active id
    /// activates its first layout.
    pub fn from_snapshot(snapshot: RepositorySnapshot) -> Result<Self, RepositoryError> {
        snapshot.validate()?;
        Ok(Self::from_valid_snapshot(snapshot))
    }

    fn from_valid_snapshot(snapshot: RepositorySnapshot) -> Self {
        let active = snapshot
            .active_layout_id
            .or_else(|| snapshot.layouts.first().map(|def| def.id.clone()));
        Self {
            layouts: snapshot.layouts,
            active,
        }
    }

    /// Restore from `store`; an empty store yields an empty repository.
    pub fn load_from<S: LayoutStore>(store: &S) -> Result<Self, S::Error> {
        match store.load()? {
            Some(snapshot) => {
                snapshot.validate()?;
                Ok(Self::from_valid_snapshot(snapshot))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn save_to<S: LayoutStore>(&self, store: &mut S) -> Result<(), S::Error> {
        store.save(&self.snapshot())
    }
}

/// Persisted form of a [`LayoutRepository`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySnapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    #[serde(default)]
    pub layouts: Vec<GridLayoutDefinition>,
    #[serde(default)]
    pub active_layout_id: Option<String>,
}

fn default_schema_version() -> u16 {
    REPOSITORY_SCHEMA_VERSION
}

impl RepositorySnapshot {
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.schema_version != REPOSITORY_SCHEMA_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.schema_version,
                expected: REPOSITORY_SCHEMA_VERSION,
            });
        }
        for (index, def) in self.layouts.iter().enumerate() {
            if self.layouts[..index].iter().any(|other| other.id == def.id) {
                return Err(SnapshotError::DuplicateLayoutId { id: def.id.clone() });
            }
            if def.name.trim().is_empty() {
                return Err(SnapshotError::EmptyLayoutName { id: def.id.clone() });
            }
        }
        if let Some(active) = &self.active_layout_id
            && !self.layouts.iter().any(|def| &def.id == active)
        {
            return Err(SnapshotError::ActiveLayoutNotFound { id: active.clone() });
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(|e| SnapshotError::Json {
            reason: e.to_string(),
        })
    }

    /// Decode and validate.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json).map_err(|e| SnapshotError::Json {
            reason: e.to_string(),
        })?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

// =========================================================================
// Storage boundary
// =========================================================================

/// Where snapshots are kept between sessions.
pub trait LayoutStore {
    type Error: std::error::Error + From<SnapshotError>;

    /// The last saved snapshot, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<RepositorySnapshot>, Self::Error>;

    fn save(&mut self, snapshot: &RepositorySnapshot) -> Result<(), Self::Error>;
}

/// Keeps the latest snapshot as a JSON document in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLayoutStore {
    document: Option<String>,
    saves: u64,
}

impl MemoryLayoutStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with an existing JSON document.
    #[must_use]
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Some(document.into()),
            saves: 0,
        }
    }

    #[must_use]
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    #[must_use]
    pub const fn saves(&self) -> u64 {
        self.saves
    }
}

impl LayoutStore for MemoryLayoutStore {
    type Error = SnapshotError;

    fn load(&self) -> Result<Option<RepositorySnapshot>, SnapshotError> {
        self.document
            .as_deref()
            .map(RepositorySnapshot::from_json)
            .transpose()
    }

    fn save(&mut self, snapshot: &RepositorySnapshot) -> Result<(), SnapshotError> {
        self.document = Some(snapshot.to_json()?);
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::add_cell;
    use crate::model::{Cell, GridLayout, Row};
    use crate::viewport::PerViewport;

    fn definition(id: &str) -> GridLayoutDefinition {
        let layout = GridLayout::new(vec![Row::new(
            format!("{id}-row"),
            100.0,
            vec![Cell::new(format!("{id}-cell"), "camera", 100.0)],
        )]);
        GridLayoutDefinition::new(id, format!("Layout {id}"), PerViewport::splat(layout))
    }

    #[test]
    fn removing_only_active_layout_leaves_none_active() {
        let mut repo = LayoutRepository::new();
        repo.insert(definition("only"));
        assert_eq!(repo.active_id(), Some("only"));

        let removed = repo.remove("only").expect("stored");
        assert_eq!(removed.id, "only");
        assert!(repo.is_empty());
        assert_eq!(repo.active_id(), None);
        assert!(repo.active().is_none());
        assert!(repo.active_positions(Viewport::Desktop).is_empty());
    }

    #[test]
    fn removing_active_falls_back_to_first_remaining() {
        let mut repo = LayoutRepository::new();
        for id in ["a", "b", "c"] {
            repo.insert(definition(id));
        }
        repo.set_active("b").expect("stored");
        repo.remove("b").expect("stored");
        assert_eq!(repo.active_id(), Some("a"));

        repo.remove("c").expect("stored");
        assert_eq!(repo.active_id(), Some("a"));
        assert_eq!(repo.ids(), ["a"]);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let mut repo = LayoutRepository::new();
        let unknown = RepositoryError::UnknownLayout { id: "x".into() };
        assert_eq!(repo.set_active("x"), Err(unknown.clone()));
        assert_eq!(repo.remove("x").map(|_| ()), Err(unknown.clone()));
        assert_eq!(repo.set_default("x"), Err(unknown.clone()));
        assert_eq!(repo.duplicate("x", "copy"), Err(unknown));
    }

    #[test]
    fn insert_replaces_same_id() {
        let mut repo = LayoutRepository::new();
        repo.insert(definition("a"));
        let mut renamed = definition("a");
        renamed.name = "Renamed".into();
        let previous = repo.insert(renamed).expect("replaced");
        assert_eq!(previous.name, "Layout a");
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get("a").map(|d| d.name.as_str()), Some("Renamed"));
    }

    #[test]
    fn exactly_one_default() {
        let mut repo = LayoutRepository::new();
        repo.insert(definition("a"));
        repo.insert(definition("b"));
        repo.set_default("a").expect("stored");
        repo.set_default("b").expect("stored");
        assert_eq!(repo.iter().filter(|d| d.is_default).count(), 1);
        assert_eq!(repo.default_layout().map(|d| d.id.as_str()), Some("b"));
    }

    #[test]
    fn duplicate_picks_fresh_ids() {
        let mut repo = LayoutRepository::new();
        repo.insert(definition("a"));
        repo.set_default("a").expect("stored");
        assert_eq!(repo.duplicate("a", "Copy").expect("stored"), "a-copy");
        assert_eq!(repo.duplicate("a", "Copy 2").expect("stored"), "a-copy-2");
        let copy = repo.get("a-copy").expect("copied");
        assert!(!copy.is_default);
        assert_eq!(copy.name, "Copy");
        assert_eq!(copy.layouts, repo.get("a").expect("stored").layouts);
        assert_eq!(repo.active_id(), Some("a"));
    }

    #[test]
    fn template_layouts_are_created_once() {
        let catalog = TemplateCatalog::builtin();
        let mut repo = LayoutRepository::new();
        let created_at = repo
            .get_or_create_template_layout(&catalog, "hybrid-50")
            .expect("builtin")
            .created_at;
        let again = repo
            .get_or_create_template_layout(&catalog, "hybrid-50")
            .expect("builtin");
        assert_eq!(again.id, "template-hybrid-50");
        assert_eq!(again.created_at, created_at);
        assert_eq!(repo.len(), 1);

        let positions = repo.active_positions(Viewport::Mobile);
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0].height, 2);
    }

    #[test]
    fn unknown_template_is_surfaced() {
        let catalog = TemplateCatalog::builtin();
        let mut repo = LayoutRepository::new();
        let err = repo
            .get_or_create_template_layout(&catalog, "missing")
            .expect_err("not in catalog");
        assert_eq!(
            err,
            RepositoryError::Template(TemplateError::UnknownTemplate { id: "missing".into() })
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(repo.is_empty());
    }

    #[test]
    fn edits_through_active_mut_touch_the_definition() {
        let mut repo = LayoutRepository::new();
        let mut def = definition("a");
        def.updated_at = 0;
        repo.insert(def);
        let active = repo.active_mut().expect("active");
        add_cell(active.layout_mut(Viewport::Tablet), 0).expect("row exists");
        let active = repo.active().expect("active");
        assert!(active.updated_at > 0);
        assert_eq!(active.layout(Viewport::Tablet).panel_ids().len(), 2);
        assert_eq!(active.layout(Viewport::Desktop).panel_ids().len(), 1);
    }

    #[test]
    fn snapshot_validation() {
        let mut snapshot = RepositorySnapshot {
            schema_version: 2,
            layouts: vec![definition("a")],
            active_layout_id: None,
        };
        assert_eq!(
            snapshot.validate(),
            Err(SnapshotError::UnsupportedVersion {
                found: 2,
                expected: REPOSITORY_SCHEMA_VERSION
            })
        );

        snapshot.schema_version = REPOSITORY_SCHEMA_VERSION;
        snapshot.active_layout_id = Some("zzz".into());
        assert_eq!(
            snapshot.validate(),
            Err(SnapshotError::ActiveLayoutNotFound { id: "zzz".into() })
        );

        snapshot.active_layout_id = None;
        snapshot.layouts.push(definition("a"));
        assert_eq!(
            snapshot.validate(),
            Err(SnapshotError::DuplicateLayoutId { id: "a".into() })
        );

        snapshot.layouts.pop();
        snapshot.layouts[0].name = "  ".into();
        assert_eq!(
            snapshot.validate(),
            Err(SnapshotError::EmptyLayoutName { id: "a".into() })
        );
    }

    #[test]
    fn store_round_trip() {
        let catalog = TemplateCatalog::builtin();
        let mut repo = LayoutRepository::new();
        repo.get_or_create_template_layout(&catalog, "dashboard")
            .expect("builtin");
        repo.get_or_create_template_layout(&catalog, "grid-2x2")
            .expect("builtin");
        repo.set_active("template-grid-2x2").expect("stored");

        let mut store = MemoryLayoutStore::new();
        repo.save_to(&mut store).expect("save");
        assert_eq!(store.saves(), 1);
        let document = store.document().expect("saved");
        assert!(document.contains("\"activeLayoutId\": \"template-grid-2x2\""));
        assert!(document.contains("\"deviceType\""));

        let loaded = LayoutRepository::load_from(&store).expect("load");
        assert_eq!(loaded.ids(), repo.ids());
        assert_eq!(loaded.active_id(), repo.active_id());
        for (restored, original) in loaded.iter().zip(repo.iter()) {
            assert_eq!(restored.name, original.name);
            assert_eq!(restored.created_at, original.created_at);
            for viewport in Viewport::ALL {
                let layout = restored.layout(viewport);
                assert_eq!(layout.panel_ids(), original.layout(viewport).panel_ids());
                assert_eq!(convert(layout), convert(original.layout(viewport)));
                assert!(layout.invariant_report().is_clean());
            }
        }
    }

    #[test]
    fn empty_store_loads_empty_repository() {
        let loaded = LayoutRepository::load_from(&MemoryLayoutStore::new()).expect("load");
        assert!(loaded.is_empty());
        assert_eq!(loaded.active_id(), None);
    }

    #[test]
    fn malformed_document_is_rejected() {
        let store = MemoryLayoutStore::with_document("{ not json");
        assert!(matches!(
            LayoutRepository::load_from(&store),
            Err(SnapshotError::Json { .. })
        ));

        let store = MemoryLayoutStore::with_document(r#"{"schemaVersion": 9, "layouts": []}"#);
        assert!(matches!(
            LayoutRepository::load_from(&store),
            Err(SnapshotError::UnsupportedVersion { found: 9, .. })
        ));
    }

    #[test]
    fn snapshot_without_active_id_activates_first() {
        let snapshot = RepositorySnapshot {
            schema_version: REPOSITORY_SCHEMA_VERSION,
            layouts: vec![definition("a"), definition("b")],
            active_layout_id: None,
        };
        let repo = LayoutRepository::from_snapshot(snapshot).expect("valid");
        assert_eq!(repo.active_id(), Some("a"));
    }
}
