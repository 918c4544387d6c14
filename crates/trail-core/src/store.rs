//! The `ActivityStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `trail-store-sqlite`). Higher layers (`trail-engine`, `trail-admin`)
//! depend on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  event::{ChangeEvent, EntityRef},
  log::{Detail, RecordOutcome, RootLog},
};

/// Abstraction over an activity-log storage backend.
///
/// Detail rows are append-only; the only in-place mutations are the
/// rollup pointer on the log row and the mark-as-read flag. Backends
/// must make [`record`](Self::record) atomic: the rollup update and the
/// detail insert either both land or neither does, and the whole
/// read-decide-write sequence must be safe against concurrent writers
/// on the same root (row lock or equivalent).
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait ActivityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Write path ────────────────────────────────────────────────────────

  /// Fold one change event into the log: find-or-create the root's log
  /// row, decide the batch number, refresh the rollup (`seen_all` is
  /// forced false on every write), and append the detail — all in one
  /// atomic transaction.
  fn record(
    &self,
    event: ChangeEvent,
  ) -> impl Future<Output = Result<RecordOutcome, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Look up the log row for a root entity. Returns `None` if nothing
  /// has been recorded for it yet.
  fn find_log<'a>(
    &'a self,
    entity: &'a EntityRef,
  ) -> impl Future<Output = Result<Option<RootLog>, Self::Error>> + Send + 'a;

  /// Look up a log row by its surrogate key.
  fn get_log(
    &self,
    log_id: Uuid,
  ) -> impl Future<Output = Result<Option<RootLog>, Self::Error>> + Send + '_;

  /// All detail rows for a log, in insertion order.
  fn get_details(
    &self,
    log_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Detail>, Self::Error>> + Send + '_;

  /// List log rows, most recently changed first. With `unseen_only`,
  /// restrict to logs carrying unseen changes.
  fn list_logs(
    &self,
    unseen_only: bool,
  ) -> impl Future<Output = Result<Vec<RootLog>, Self::Error>> + Send + '_;

  // ── External actions ──────────────────────────────────────────────────

  /// The mark-as-read action: set `seen_all = true`. Returns `false` if
  /// the log does not exist.
  fn mark_seen(
    &self,
    log_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Retention: delete every log whose last change predates `cutoff`,
  /// cascading its details. Returns the number of logs deleted. Leaves
  /// no dangling detail rows behind.
  fn prune(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
