//! Change events — the inbound contract of the activity log.
//!
//! An event is produced by the model-lifecycle collaborator whenever a
//! tracked entity is created, updated, or deleted. It arrives already
//! diffed (old vs new field values) and already resolved to the
//! aggregate root it should be filed under.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Event kind ──────────────────────────────────────────────────────────────

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
  Created,
  Updated,
  Deleted,
}

impl EventKind {
  /// The discriminant string stored in the `event` / `last_event` columns.
  /// Must match the `rename_all = "lowercase"` serde tags above.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Created => "created",
      Self::Updated => "updated",
      Self::Deleted => "deleted",
    }
  }

  /// Deserialise from the discriminant string stored in the database.
  pub fn from_discriminant(s: &str) -> Result<Self> {
    match s {
      "created" => Ok(Self::Created),
      "updated" => Ok(Self::Updated),
      "deleted" => Ok(Self::Deleted),
      other => Err(Error::UnknownEventKind(other.to_owned())),
    }
  }
}

// ─── Entity references ───────────────────────────────────────────────────────

/// A tracked entity, identified by a stable type tag plus its natural id.
///
/// Type tags are plain strings resolved through explicit lookup tables
/// (the presentation layer's relation registry), never through runtime
/// reflection. String ids cover integer and UUID natural keys alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
  pub entity_type: String,
  pub entity_id:   String,
}

impl EntityRef {
  pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
    Self {
      entity_type: entity_type.into(),
      entity_id:   entity_id.into(),
    }
  }
}

impl std::fmt::Display for EntityRef {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}#{}", self.entity_type, self.entity_id)
  }
}

/// The aggregate root a child change is filed under, with the display
/// label snapshot used when its [`RootLog`](crate::log::RootLog) is
/// created lazily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootRef {
  pub entity:        EntityRef,
  pub display_label: String,
}

// ─── Diff ────────────────────────────────────────────────────────────────────

/// Field-level before/after values for one change.
///
/// `created` events have an empty `old` half; `deleted` events have an
/// empty `new` half.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
  pub old: BTreeMap<String, serde_json::Value>,
  pub new: BTreeMap<String, serde_json::Value>,
}

impl ChangeSet {
  /// Build the diff for a `created` event (new values only).
  pub fn added(new: BTreeMap<String, serde_json::Value>) -> Self {
    Self { old: BTreeMap::new(), new }
  }

  /// Build the diff for a `deleted` event (old values only).
  pub fn removed(old: BTreeMap<String, serde_json::Value>) -> Self {
    Self { old, new: BTreeMap::new() }
  }

  pub fn is_empty(&self) -> bool { self.old.is_empty() && self.new.is_empty() }
}

// ─── ChangeEvent ─────────────────────────────────────────────────────────────

/// One observed create/update/delete of a tracked entity.
///
/// `root` is `None` when the changed entity is itself the aggregate root
/// (a "parent change"); a child change must carry an explicit root
/// reference so the write path can find the owning log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
  pub kind:        EventKind,
  pub entity:      EntityRef,
  pub root:        Option<RootRef>,
  pub changes:     ChangeSet,
  /// `None` means system-initiated (no acting user).
  pub actor_id:    Option<Uuid>,
  pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
  /// Convenience constructor for a parent change (the entity is the root).
  pub fn for_root(
    kind: EventKind,
    entity: EntityRef,
    changes: ChangeSet,
    actor_id: Option<Uuid>,
    occurred_at: DateTime<Utc>,
  ) -> Self {
    Self { kind, entity, root: None, changes, actor_id, occurred_at }
  }

  /// Convenience constructor for a child change filed under `root`.
  pub fn for_child(
    kind: EventKind,
    entity: EntityRef,
    root: RootRef,
    changes: ChangeSet,
    actor_id: Option<Uuid>,
    occurred_at: DateTime<Utc>,
  ) -> Self {
    Self { kind, entity, root: Some(root), changes, actor_id, occurred_at }
  }

  /// The root entity this event is filed under. For parent changes this
  /// is the changed entity itself.
  pub fn root_entity(&self) -> &EntityRef {
    self.root.as_ref().map(|r| &r.entity).unwrap_or(&self.entity)
  }

  /// The display label to snapshot if a new log row has to be created.
  pub fn root_label(&self) -> &str {
    self
      .root
      .as_ref()
      .map(|r| r.display_label.as_str())
      .unwrap_or(&self.entity.entity_id)
  }

  /// Whether the changed entity *is* the root — derived from identifier
  /// equality, never stored.
  pub fn is_parent_change(&self) -> bool { self.root_entity() == &self.entity }

  /// Reject events that cannot identify their root entity. Runs before
  /// any write is attempted.
  pub fn validate(&self) -> Result<()> {
    if self.entity.entity_type.is_empty() {
      return Err(Error::EmptyEntityType);
    }
    if self.entity.entity_id.is_empty() {
      return Err(Error::EmptyEntityId);
    }
    if let Some(root) = &self.root
      && (root.entity.entity_type.is_empty() || root.entity.entity_id.is_empty())
    {
      return Err(Error::EmptyRootReference);
    }
    Ok(())
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn diff_one(field: &str, old: &str, new: &str) -> ChangeSet {
    let mut set = ChangeSet::default();
    set.old.insert(field.into(), old.into());
    set.new.insert(field.into(), new.into());
    set
  }

  #[test]
  fn parent_change_resolves_root_to_itself() {
    let event = ChangeEvent::for_root(
      EventKind::Updated,
      EntityRef::new("invoice", "42"),
      diff_one("status", "draft", "sent"),
      None,
      Utc::now(),
    );
    assert!(event.is_parent_change());
    assert_eq!(event.root_entity(), &EntityRef::new("invoice", "42"));
  }

  #[test]
  fn child_change_resolves_root_from_reference() {
    let event = ChangeEvent::for_child(
      EventKind::Created,
      EntityRef::new("line_item", "7"),
      RootRef {
        entity:        EntityRef::new("invoice", "42"),
        display_label: "INV-0042".into(),
      },
      ChangeSet::default(),
      None,
      Utc::now(),
    );
    assert!(!event.is_parent_change());
    assert_eq!(event.root_entity(), &EntityRef::new("invoice", "42"));
    assert_eq!(event.root_label(), "INV-0042");
  }

  #[test]
  fn validate_rejects_empty_identity_fields() {
    let mut event = ChangeEvent::for_root(
      EventKind::Created,
      EntityRef::new("", "42"),
      ChangeSet::default(),
      None,
      Utc::now(),
    );
    assert!(matches!(event.validate(), Err(Error::EmptyEntityType)));

    event.entity = EntityRef::new("invoice", "");
    assert!(matches!(event.validate(), Err(Error::EmptyEntityId)));

    event.entity = EntityRef::new("line_item", "7");
    event.root = Some(RootRef {
      entity:        EntityRef::new("invoice", ""),
      display_label: "INV-0042".into(),
    });
    assert!(matches!(event.validate(), Err(Error::EmptyRootReference)));
  }

  #[test]
  fn event_kind_discriminants_round_trip() {
    for kind in [EventKind::Created, EventKind::Updated, EventKind::Deleted] {
      assert_eq!(EventKind::from_discriminant(kind.discriminant()).unwrap(), kind);
    }
    assert!(EventKind::from_discriminant("upserted").is_err());
  }
}
