//! Stored log records: the per-root rollup row and its change details.
//!
//! A [`RootLog`] is created lazily on the first event for a root entity
//! and then only ever updated in place (rollup pointer). [`Detail`] rows
//! are strictly append-only: written once, never mutated, deleted only
//! when their log is pruned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::{ChangeSet, EntityRef, EventKind};

// ─── RootLog ─────────────────────────────────────────────────────────────────

/// One row per tracked root entity: the rollup pointer summarising its
/// most recent change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootLog {
  pub log_id: Uuid,
  /// The tracked root; unique per `(entity_type, entity_id)`.
  pub entity: EntityRef,
  /// Human-readable snapshot taken when the log was created; not kept
  /// live-updated afterwards.
  pub display_label:   String,
  pub last_event:      EventKind,
  /// Starts at 1; bumped by exactly 1 whenever a new batch opens; never
  /// decreases.
  pub last_batch:      i64,
  /// `None` means the last change was system-initiated.
  pub last_actor:      Option<Uuid>,
  pub last_changed_at: DateTime<Utc>,
  /// `false` whenever unseen changes exist; reset on every write, set to
  /// `true` only by the external mark-as-read action.
  pub seen_all:        bool,
}

// ─── Detail ──────────────────────────────────────────────────────────────────

/// One stored change record — many per [`RootLog`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detail {
  pub detail_id: Uuid,
  pub log_id:    Uuid,
  /// The batch this change belongs to; always equals the owning log's
  /// `last_batch` at the moment of insert.
  pub batch:  i64,
  /// The entity that actually changed — the root itself, or one of its
  /// children.
  pub entity: EntityRef,
  pub event:  EventKind,
  pub changes:     ChangeSet,
  pub actor_id:    Option<Uuid>,
  pub occurred_at: DateTime<Utc>,
}

impl Detail {
  /// Whether this detail describes a change to the root entity itself.
  /// Derived from identifier equality against the owning log — never a
  /// stored flag, so it cannot drift from the identifiers.
  pub fn is_parent_change(&self, log: &RootLog) -> bool { self.entity == log.entity }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// What the write path did with an event — returned so callers and tests
/// can observe batch assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
  pub log_id: Uuid,
  /// The batch number the detail row was filed under.
  pub batch: i64,
  /// `true` when this event opened a new batch (or created the log).
  pub started_new_batch: bool,
}
