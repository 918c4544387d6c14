//! Grouped history views for the Trail activity log.
//!
//! Converts a root log and its stored details into the batch-grouped,
//! human-labeled structure a history screen renders. Pure synchronous;
//! no HTTP or database dependencies, no side effects — calling
//! [`present`] twice with the same inputs yields identical output.
//!
//! # Quick start
//!
//! ```rust,ignore
//! let view = trail_present::present(
//!   &log,
//!   &details,
//!   &RelationRegistry::default(),
//!   &Labels::default(),
//!   Utc::now(),
//! );
//! for batch in &view.batches {
//!   println!("batch {}: {} parent changes", batch.batch, batch.parent_changes.len());
//! }
//! ```

pub mod format;
pub mod labels;
pub mod relations;

mod group;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use trail_core::{
  event::{EntityRef, EventKind},
  log::{Detail, RootLog},
};
use uuid::Uuid;

pub use labels::Labels;
pub use relations::{FieldSpec, RelationRegistry, RelationSpec};

// ─── View types ──────────────────────────────────────────────────────────────

/// One rendered field-level change, tagged by what happened to the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "lowercase")]
pub enum FieldChange {
  /// The field appeared (`created` events expose only new values).
  Added { field: String, label: String, value: String },
  /// The field went away (`deleted` events expose only old values).
  Removed { field: String, label: String, value: String },
  /// The field moved from one value to another.
  Modified {
    field: String,
    label: String,
    old:   String,
    new:   String,
  },
}

/// All changes to one child entity within a batch, merged across its
/// details in per-change order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildGroup {
  pub entity:  EntityRef,
  pub changes: Vec<FieldChange>,
  /// Related-entity snapshot keyed by relation name, attached from the
  /// registry. Omitted when the record no longer resolves or no
  /// relations are configured for the entity type.
  pub related: Option<BTreeMap<String, BTreeMap<String, serde_json::Value>>>,
}

/// One batch of temporally-related changes: the root's own changes plus
/// its children's, clustered per child.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchGroup {
  pub batch: i64,
  pub parent_changes: Vec<FieldChange>,
  pub children:       Vec<ChildGroup>,
}

/// The assembled history view for one root entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedView {
  pub entity:        EntityRef,
  pub display_label: String,
  pub last_event:    EventKind,
  pub last_batch:    i64,
  pub last_actor:    Option<Uuid>,
  /// Inverse of the log's mark-as-read flag.
  pub has_unseen: bool,
  pub last_changed_at:  DateTime<Utc>,
  /// Human-relative rendering of `last_changed_at` against the caller's
  /// `now` (e.g. "4 minutes ago").
  pub last_changed_rel: String,
  /// Most recent batch first.
  pub batches: Vec<BatchGroup>,
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Reconstruct the grouped history view for `log` from its `details`.
///
/// `now` is passed in rather than read from the clock so the output is a
/// pure function of its inputs.
pub fn present(
  log: &RootLog,
  details: &[Detail],
  registry: &RelationRegistry,
  labels: &Labels,
  now: DateTime<Utc>,
) -> GroupedView {
  group::build(log, details, registry, labels, now)
}
