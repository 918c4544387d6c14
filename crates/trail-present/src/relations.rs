//! The relation registry: which related records to expand for display,
//! per entity type.
//!
//! Replaces the original's "look up a property by a runtime string name"
//! configuration with an explicit capability interface populated at
//! startup: each entity type registers the relations to show, the fields
//! to take from each related record (with optional renames), and a fetch
//! function that resolves the live record. The presentation layer
//! depends only on this interface.

use std::{collections::HashMap, sync::Arc};

use trail_core::event::EntityRef;

/// Resolves the live related record for a changed entity, or `None` when
/// it no longer exists.
pub type FetchFn = Arc<dyn Fn(&EntityRef) -> Option<serde_json::Value> + Send + Sync>;

/// One field to surface from a related record.
#[derive(Debug, Clone)]
pub struct FieldSpec {
  /// The column/key on the related record.
  pub column: String,
  /// External name to expose the value under, when it differs from the
  /// column (e.g. a `description` column shown as `name`).
  pub rename: Option<String>,
}

impl FieldSpec {
  pub fn named(column: impl Into<String>) -> Self {
    Self { column: column.into(), rename: None }
  }

  pub fn renamed(column: impl Into<String>, rename: impl Into<String>) -> Self {
    Self { column: column.into(), rename: Some(rename.into()) }
  }

  pub fn display_name(&self) -> &str {
    self.rename.as_deref().unwrap_or(&self.column)
  }
}

/// One named relation of an entity type.
#[derive(Clone)]
pub struct RelationSpec {
  pub name:   String,
  pub fields: Vec<FieldSpec>,
  fetch:      FetchFn,
}

impl RelationSpec {
  pub fn new(
    name: impl Into<String>,
    fields: Vec<FieldSpec>,
    fetch: impl Fn(&EntityRef) -> Option<serde_json::Value> + Send + Sync + 'static,
  ) -> Self {
    Self {
      name:   name.into(),
      fields,
      fetch: Arc::new(fetch),
    }
  }

  /// Resolve the related record for `entity`, if it still exists.
  pub fn fetch(&self, entity: &EntityRef) -> Option<serde_json::Value> {
    (self.fetch)(entity)
  }
}

impl std::fmt::Debug for RelationSpec {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RelationSpec")
      .field("name", &self.name)
      .field("fields", &self.fields)
      .finish_non_exhaustive()
  }
}

/// Static relation configuration keyed by entity type, built once at
/// startup.
#[derive(Debug, Clone, Default)]
pub struct RelationRegistry {
  by_type: HashMap<String, Vec<RelationSpec>>,
}

impl RelationRegistry {
  pub fn new() -> Self { Self::default() }

  pub fn register(&mut self, entity_type: impl Into<String>, spec: RelationSpec) {
    self.by_type.entry(entity_type.into()).or_default().push(spec);
  }

  /// The relations configured for `entity_type`; empty when the type has
  /// none (its groups carry no related snapshot).
  pub fn relations_for(&self, entity_type: &str) -> &[RelationSpec] {
    self.by_type.get(entity_type).map(Vec::as_slice).unwrap_or(&[])
  }
}
