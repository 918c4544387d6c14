//! The batch-boundary decision: does an incoming change belong to the
//! root's current batch, or does it open a new one?
//!
//! Pure and deterministic so it can be replayed and tested with varied
//! windows. The write path executes it inside the same transaction that
//! performs the read-decide-write sequence.

use chrono::{DateTime, Duration, Utc};

use crate::{event::ChangeEvent, log::RootLog};

/// Decide whether `event` opens a new batch on `log`.
///
/// - Parent change: compare the gap since the log's own last change
///   against `window`.
/// - Child change: compare against `latest_in_batch` — the timestamp of
///   the most recent detail already stored under the log's *current*
///   batch number, regardless of which entity it belongs to. If the
///   current batch holds no detail yet, it is still open: reuse it.
///
/// A gap exactly equal to the window does not split (strictly greater
/// only), and out-of-order events (negative gap) never split. Gaps are
/// compared at full sub-second precision.
pub fn should_start_new_batch(
  log: &RootLog,
  event: &ChangeEvent,
  latest_in_batch: Option<DateTime<Utc>>,
  window: Duration,
) -> bool {
  if event.is_parent_change() {
    return exceeds_window(log.last_changed_at, event.occurred_at, window);
  }

  match latest_in_batch {
    None => false,
    Some(latest) => exceeds_window(latest, event.occurred_at, window),
  }
}

fn exceeds_window(earlier: DateTime<Utc>, later: DateTime<Utc>, window: Duration) -> bool {
  later - earlier > window
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use uuid::Uuid;

  use super::*;
  use crate::event::{ChangeSet, EntityRef, EventKind, RootRef};
  use crate::log::RootLog;

  fn at(secs_past_ten: f64) -> DateTime<Utc> {
    let base = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();
    base + Duration::milliseconds((secs_past_ten * 1000.0) as i64)
  }

  fn invoice_log(last_batch: i64, last_changed_at: DateTime<Utc>) -> RootLog {
    RootLog {
      log_id:          Uuid::new_v4(),
      entity:          EntityRef::new("invoice", "42"),
      display_label:   "INV-0042".into(),
      last_event:      EventKind::Updated,
      last_batch,
      last_actor:      None,
      last_changed_at,
      seen_all:        false,
    }
  }

  fn parent_update(occurred_at: DateTime<Utc>) -> ChangeEvent {
    ChangeEvent::for_root(
      EventKind::Updated,
      EntityRef::new("invoice", "42"),
      ChangeSet::default(),
      None,
      occurred_at,
    )
  }

  fn child_event(kind: EventKind, occurred_at: DateTime<Utc>) -> ChangeEvent {
    ChangeEvent::for_child(
      kind,
      EntityRef::new("line_item", "7"),
      RootRef {
        entity:        EntityRef::new("invoice", "42"),
        display_label: "INV-0042".into(),
      },
      ChangeSet::default(),
      None,
      occurred_at,
    )
  }

  #[test]
  fn parent_gap_within_window_reuses_batch() {
    let log = invoice_log(3, at(0.0));
    let event = parent_update(at(1.0));
    assert!(!should_start_new_batch(&log, &event, None, Duration::seconds(2)));
  }

  #[test]
  fn parent_gap_over_window_starts_new_batch() {
    let log = invoice_log(3, at(0.0));
    let event = parent_update(at(10.0));
    assert!(should_start_new_batch(&log, &event, None, Duration::seconds(2)));
  }

  #[test]
  fn gap_exactly_equal_to_window_reuses_batch() {
    let log = invoice_log(1, at(0.0));
    let event = parent_update(at(2.0));
    assert!(!should_start_new_batch(&log, &event, None, Duration::seconds(2)));
  }

  #[test]
  fn sub_second_gap_over_window_still_splits() {
    // Full-precision comparison: 2.001s > 2s.
    let log = invoice_log(1, at(0.0));
    let event = parent_update(at(2.001));
    assert!(should_start_new_batch(&log, &event, None, Duration::seconds(2)));
  }

  #[test]
  fn out_of_order_parent_event_never_splits() {
    let log = invoice_log(2, at(10.0));
    let event = parent_update(at(3.0));
    assert!(!should_start_new_batch(&log, &event, None, Duration::seconds(2)));
  }

  #[test]
  fn child_with_empty_current_batch_always_joins() {
    // No detail under the current batch yet: the batch is still open for
    // this entity no matter how stale the rollup timestamp is.
    let log = invoice_log(5, at(-3600.0));
    let event = child_event(EventKind::Created, at(0.0));
    assert!(!should_start_new_batch(&log, &event, None, Duration::seconds(2)));
  }

  #[test]
  fn child_compares_against_latest_detail_not_rollup() {
    let log = invoice_log(5, at(0.0));
    let event = child_event(EventKind::Updated, at(8.0));

    // Latest detail in the current batch is recent: reuse.
    assert!(!should_start_new_batch(&log, &event, Some(at(7.0)), Duration::seconds(2)));
    // Latest detail is stale: split.
    assert!(should_start_new_batch(&log, &event, Some(at(1.0)), Duration::seconds(2)));
  }

  #[test]
  fn invoice_scenario_from_the_field() {
    // Rollup at 10:00:00, window 2s. A parent update at :01 stays in
    // batch 3; a line-item create at :01.5 joins it (first detail of the
    // batch); a parent update at :10 opens batch 4.
    let window = Duration::seconds(2);
    let log = invoice_log(3, at(0.0));

    assert!(!should_start_new_batch(&log, &parent_update(at(1.0)), None, window));
    assert!(!should_start_new_batch(
      &log,
      &child_event(EventKind::Created, at(1.5)),
      None,
      window
    ));
    assert!(should_start_new_batch(&log, &parent_update(at(10.0)), None, window));
  }
}
