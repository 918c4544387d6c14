//! Batch grouping: the reconstruction algorithm behind [`present`](crate::present).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use trail_core::{
  event::{EntityRef, EventKind},
  log::{Detail, RootLog},
};

use crate::{
  BatchGroup, ChildGroup, FieldChange, GroupedView,
  format::{format_value, relative_time},
  labels::Labels,
  relations::RelationRegistry,
};

pub fn build(
  log: &RootLog,
  details: &[Detail],
  registry: &RelationRegistry,
  labels: &Labels,
  now: DateTime<Utc>,
) -> GroupedView {
  let mut by_batch: BTreeMap<i64, Vec<&Detail>> = BTreeMap::new();
  for detail in details {
    by_batch.entry(detail.batch).or_default().push(detail);
  }

  // Most recent batch first; details keep insertion order inside.
  let batches = by_batch
    .iter()
    .rev()
    .map(|(&batch, members)| {
      let mut parent_changes: Vec<FieldChange> = Vec::new();
      let mut children: Vec<(EntityRef, Vec<FieldChange>)> = Vec::new();

      for detail in members {
        let changes = render_detail(detail, labels);
        if detail.is_parent_change(log) {
          parent_changes.extend(changes);
        } else {
          // Cluster by (entity_type, entity_id), first-seen order.
          match children.iter_mut().find(|(entity, _)| entity == &detail.entity) {
            Some((_, existing)) => existing.extend(changes),
            None => children.push((detail.entity.clone(), changes)),
          }
        }
      }

      let children = children
        .into_iter()
        .map(|(entity, changes)| {
          let related = related_snapshot(registry, &entity);
          ChildGroup { entity, changes, related }
        })
        .collect();

      BatchGroup { batch, parent_changes, children }
    })
    .collect();

  GroupedView {
    entity:           log.entity.clone(),
    display_label:    log.display_label.clone(),
    last_event:       log.last_event,
    last_batch:       log.last_batch,
    last_actor:       log.last_actor,
    has_unseen:       !log.seen_all,
    last_changed_at:  log.last_changed_at,
    last_changed_rel: relative_time(log.last_changed_at, now),
    batches,
  }
}

/// Render one detail's diff into tagged field changes.
///
/// `created` exposes only new values, `deleted` only old values;
/// `updated` pairs old and new per field (a side a producer left out
/// renders as empty).
fn render_detail(detail: &Detail, labels: &Labels) -> Vec<FieldChange> {
  match detail.event {
    EventKind::Created => detail
      .changes
      .new
      .iter()
      .map(|(field, value)| FieldChange::Added {
        field: field.clone(),
        label: labels.resolve(field),
        value: format_value(field, value),
      })
      .collect(),

    EventKind::Deleted => detail
      .changes
      .old
      .iter()
      .map(|(field, value)| FieldChange::Removed {
        field: field.clone(),
        label: labels.resolve(field),
        value: format_value(field, value),
      })
      .collect(),

    EventKind::Updated => {
      let fields: BTreeSet<&String> =
        detail.changes.old.keys().chain(detail.changes.new.keys()).collect();

      fields
        .into_iter()
        .map(|field| FieldChange::Modified {
          field: field.clone(),
          label: labels.resolve(field),
          old:   detail
            .changes
            .old
            .get(field)
            .map(|v| format_value(field, v))
            .unwrap_or_default(),
          new:   detail
            .changes
            .new
            .get(field)
            .map(|v| format_value(field, v))
            .unwrap_or_default(),
        })
        .collect()
    }
  }
}

/// Build the related-entity snapshot for one child cluster.
///
/// A relation that no longer resolves is logged and omitted; it never
/// aborts presentation of the rest of the view.
fn related_snapshot(
  registry: &RelationRegistry,
  entity: &EntityRef,
) -> Option<BTreeMap<String, BTreeMap<String, serde_json::Value>>> {
  let specs = registry.relations_for(&entity.entity_type);
  if specs.is_empty() {
    return None;
  }

  let mut snapshot = BTreeMap::new();
  for spec in specs {
    let Some(record) = spec.fetch(entity) else {
      tracing::warn!(
        relation = %spec.name,
        entity = %entity,
        "related record no longer resolves; omitting snapshot"
      );
      continue;
    };

    let Some(object) = record.as_object() else {
      tracing::warn!(
        relation = %spec.name,
        entity = %entity,
        "related record is not an object; omitting snapshot"
      );
      continue;
    };

    let mut fields = BTreeMap::new();
    for field in &spec.fields {
      match object.get(&field.column) {
        Some(value) => {
          fields.insert(field.display_name().to_owned(), value.clone());
        }
        None => tracing::warn!(
          relation = %spec.name,
          entity = %entity,
          column = %field.column,
          "related record is missing a configured column"
        ),
      }
    }
    // A record that carries none of the configured columns has nothing
    // to show; leave it out rather than attach an empty map.
    if fields.is_empty() {
      continue;
    }
    snapshot.insert(spec.name.clone(), fields);
  }

  if snapshot.is_empty() { None } else { Some(snapshot) }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};
  use trail_core::event::ChangeSet;
  use uuid::Uuid;

  use super::*;
  use crate::{FieldSpec, RelationSpec, present};

  fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap() + Duration::seconds(secs)
  }

  fn invoice_log() -> RootLog {
    RootLog {
      log_id:          Uuid::new_v4(),
      entity:          EntityRef::new("invoice", "42"),
      display_label:   "INV-0042".into(),
      last_event:      EventKind::Updated,
      last_batch:      2,
      last_actor:      None,
      last_changed_at: at(0),
      seen_all:        false,
    }
  }

  fn detail(
    log: &RootLog,
    batch: i64,
    entity: EntityRef,
    event: EventKind,
    changes: ChangeSet,
  ) -> Detail {
    Detail {
      detail_id: Uuid::new_v4(),
      log_id: log.log_id,
      batch,
      entity,
      event,
      changes,
      actor_id: None,
      occurred_at: at(0),
    }
  }

  fn updated(field: &str, old: &str, new: &str) -> ChangeSet {
    let mut set = ChangeSet::default();
    set.old.insert(field.into(), old.into());
    set.new.insert(field.into(), new.into());
    set
  }

  fn created(field: &str, value: serde_json::Value) -> ChangeSet {
    ChangeSet::added([(field.to_string(), value)].into())
  }

  fn empty_registry() -> RelationRegistry { RelationRegistry::new() }

  #[test]
  fn one_group_per_distinct_batch_most_recent_first() {
    let log = invoice_log();
    let details = vec![
      detail(&log, 1, log.entity.clone(), EventKind::Created, created("status", "draft".into())),
      detail(&log, 1, EntityRef::new("line_item", "7"), EventKind::Created, created("qty", 3.into())),
      detail(&log, 2, log.entity.clone(), EventKind::Updated, updated("status", "draft", "sent")),
    ];

    let view = present(&log, &details, &empty_registry(), &Labels::new(), at(60));

    assert_eq!(view.batches.len(), 2);
    assert_eq!(view.batches[0].batch, 2);
    assert_eq!(view.batches[1].batch, 1);

    // Each group only holds details with its own batch number.
    assert_eq!(view.batches[0].parent_changes.len(), 1);
    assert!(view.batches[0].children.is_empty());
    assert_eq!(view.batches[1].children.len(), 1);
  }

  #[test]
  fn child_changes_cluster_by_entity() {
    let log = invoice_log();
    let details = vec![
      detail(&log, 1, EntityRef::new("line_item", "7"), EventKind::Created, created("qty", 3.into())),
      detail(&log, 1, EntityRef::new("line_item", "8"), EventKind::Created, created("qty", 1.into())),
      detail(&log, 1, EntityRef::new("line_item", "7"), EventKind::Updated, updated("qty", "3", "5")),
    ];

    let view = present(&log, &details, &empty_registry(), &Labels::new(), at(60));

    let children = &view.batches[0].children;
    assert_eq!(children.len(), 2, "two distinct child entities");
    assert_eq!(children[0].entity, EntityRef::new("line_item", "7"));
    assert_eq!(children[0].changes.len(), 2, "merged across details in order");
    assert_eq!(children[1].entity, EntityRef::new("line_item", "8"));
    assert_eq!(children[1].changes.len(), 1);
  }

  #[test]
  fn event_kinds_tag_field_changes() {
    let log = invoice_log();
    let details = vec![
      detail(&log, 1, log.entity.clone(), EventKind::Created, created("total", 25.into())),
      detail(&log, 1, log.entity.clone(), EventKind::Updated, updated("status", "draft", "sent")),
      detail(&log, 1, log.entity.clone(), EventKind::Deleted, ChangeSet::removed(
        [("status".to_string(), "sent".into())].into(),
      )),
    ];

    let view = present(&log, &details, &empty_registry(), &Labels::new(), at(60));
    let changes = &view.batches[0].parent_changes;

    assert_eq!(changes[0], FieldChange::Added {
      field: "total".into(),
      label: "Total".into(),
      value: "25.00".into(),
    });
    assert_eq!(changes[1], FieldChange::Modified {
      field: "status".into(),
      label: "Status".into(),
      old:   "draft".into(),
      new:   "sent".into(),
    });
    assert_eq!(changes[2], FieldChange::Removed {
      field: "status".into(),
      label: "Status".into(),
      value: "sent".into(),
    });
  }

  #[test]
  fn related_snapshot_attached_with_field_renames() {
    let mut registry = RelationRegistry::new();
    registry.register(
      "line_item",
      RelationSpec::new(
        "product",
        vec![FieldSpec::renamed("description", "name"), FieldSpec::named("sku")],
        |_| Some(serde_json::json!({ "description": "Blue widget", "sku": "BW-1" })),
      ),
    );

    let log = invoice_log();
    let details = vec![detail(
      &log,
      1,
      EntityRef::new("line_item", "7"),
      EventKind::Created,
      created("qty", 3.into()),
    )];

    let view = present(&log, &details, &registry, &Labels::new(), at(60));
    let related = view.batches[0].children[0].related.as_ref().unwrap();

    assert_eq!(related["product"]["name"], "Blue widget");
    assert_eq!(related["product"]["sku"], "BW-1");
  }

  #[test]
  fn unresolvable_relation_is_omitted_not_fatal() {
    let mut registry = RelationRegistry::new();
    registry.register(
      "line_item",
      // The related record has since been deleted.
      RelationSpec::new("product", vec![FieldSpec::named("sku")], |_| None),
    );

    let log = invoice_log();
    let details = vec![
      detail(&log, 1, EntityRef::new("line_item", "7"), EventKind::Created, created("qty", 3.into())),
      detail(&log, 1, log.entity.clone(), EventKind::Updated, updated("status", "draft", "sent")),
    ];

    let view = present(&log, &details, &registry, &Labels::new(), at(60));

    // The snapshot is gone, the rest of the view is intact.
    assert!(view.batches[0].children[0].related.is_none());
    assert_eq!(view.batches[0].parent_changes.len(), 1);
  }

  #[test]
  fn relation_with_no_resolvable_columns_is_omitted() {
    let mut registry = RelationRegistry::new();
    registry.register(
      "line_item",
      // The record still resolves, but a schema change dropped every
      // configured column.
      RelationSpec::new(
        "product",
        vec![FieldSpec::named("sku"), FieldSpec::named("description")],
        |_| Some(serde_json::json!({ "ean": "4006381333931" })),
      ),
    );

    let log = invoice_log();
    let details = vec![detail(
      &log,
      1,
      EntityRef::new("line_item", "7"),
      EventKind::Created,
      created("qty", 3.into()),
    )];

    let view = present(&log, &details, &registry, &Labels::new(), at(60));
    assert!(view.batches[0].children[0].related.is_none());
  }

  #[test]
  fn unconfigured_types_carry_no_snapshot() {
    let log = invoice_log();
    let details = vec![detail(
      &log,
      1,
      EntityRef::new("line_item", "7"),
      EventKind::Created,
      created("qty", 3.into()),
    )];

    let view = present(&log, &details, &empty_registry(), &Labels::new(), at(60));
    assert!(view.batches[0].children[0].related.is_none());
  }

  #[test]
  fn root_metadata_is_carried_over() {
    let actor = Uuid::new_v4();
    let mut log = invoice_log();
    log.last_actor = Some(actor);

    let view = present(&log, &[], &empty_registry(), &Labels::new(), at(240));

    assert_eq!(view.entity, EntityRef::new("invoice", "42"));
    assert_eq!(view.display_label, "INV-0042");
    assert_eq!(view.last_batch, 2);
    assert_eq!(view.last_actor, Some(actor));
    assert!(view.has_unseen);
    assert_eq!(view.last_changed_rel, "4 minutes ago");
    assert!(view.batches.is_empty());
  }

  #[test]
  fn presentation_is_idempotent() {
    let mut registry = RelationRegistry::new();
    registry.register(
      "line_item",
      RelationSpec::new("product", vec![FieldSpec::named("sku")], |_| {
        Some(serde_json::json!({ "sku": "BW-1" }))
      }),
    );

    let log = invoice_log();
    let details = vec![
      detail(&log, 1, log.entity.clone(), EventKind::Created, created("status", "draft".into())),
      detail(&log, 1, EntityRef::new("line_item", "7"), EventKind::Created, created("qty", 3.into())),
      detail(&log, 2, log.entity.clone(), EventKind::Updated, updated("status", "draft", "sent")),
    ];

    let first = present(&log, &details, &registry, &Labels::new(), at(60));
    let second = present(&log, &details, &registry, &Labels::new(), at(60));
    assert_eq!(first, second);
  }
}
