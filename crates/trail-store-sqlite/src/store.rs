//! [`SqliteStore`] — the SQLite implementation of [`ActivityStore`].
//!
//! The write path runs the full read-decide-write sequence of the
//! batching algorithm inside one `BEGIN IMMEDIATE` transaction, executed
//! in a single [`tokio_rusqlite`] call. The immediate transaction takes
//! the write lock before the log row is read, so two concurrent writers
//! on the same root entity cannot interleave their batch decisions.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use trail_core::{
  batch::should_start_new_batch,
  config::AuditConfig,
  event::{ChangeEvent, EntityRef},
  log::{Detail, RecordOutcome, RootLog},
  store::ActivityStore,
};

use crate::{
  encode::{
    RawDetail, RawRootLog, decode_dt, encode_dt, encode_fields, encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Trail activity store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  config: AuditConfig,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>, config: AuditConfig) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, config };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory(config: AuditConfig) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, config };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Raw access for tests that need to break the store mid-flight.
  #[cfg(test)]
  pub(crate) fn raw(&self) -> &tokio_rusqlite::Connection { &self.conn }
}

// ─── Write path ──────────────────────────────────────────────────────────────

/// Fold `event` into the log inside an already-open transaction.
///
/// Steps (all or nothing):
/// 1. look up the root's log row;
/// 2. no row: create it at batch 1;
/// 3. row exists: decide whether to bump the batch, then refresh the
///    rollup pointer either way (`seen_all` forced to 0 on every write);
/// 4. append the detail row under the resolved batch number.
fn write_event(
  tx: &rusqlite::Transaction<'_>,
  event: &ChangeEvent,
  window: Duration,
) -> Result<RecordOutcome> {
  let root = event.root_entity();

  let existing: Option<RawRootLog> = tx
    .query_row(
      "SELECT log_id, entity_type, entity_id, display_label,
              last_event, last_batch, last_actor, last_changed_at, seen_all
       FROM root_logs WHERE entity_type = ?1 AND entity_id = ?2",
      rusqlite::params![root.entity_type, root.entity_id],
      |row| {
        Ok(RawRootLog {
          log_id:          row.get(0)?,
          entity_type:     row.get(1)?,
          entity_id:       row.get(2)?,
          display_label:   row.get(3)?,
          last_event:      row.get(4)?,
          last_batch:      row.get(5)?,
          last_actor:      row.get(6)?,
          last_changed_at: row.get(7)?,
          seen_all:        row.get(8)?,
        })
      },
    )
    .optional()?;

  let (log_id, batch, started_new_batch) = match existing {
    None => {
      let log_id = Uuid::new_v4();
      tx.execute(
        "INSERT INTO root_logs (
           log_id, entity_type, entity_id, display_label,
           last_event, last_batch, last_actor, last_changed_at, seen_all
         ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, 0)",
        rusqlite::params![
          encode_uuid(log_id),
          root.entity_type,
          root.entity_id,
          event.root_label(),
          event.kind.discriminant(),
          event.actor_id.map(encode_uuid),
          encode_dt(event.occurred_at),
        ],
      )?;
      (log_id, 1, true)
    }

    Some(raw) => {
      let log: RootLog = raw.into_log()?;

      // For a child change the gap is measured against the most recent
      // detail already stored under the current batch, not the rollup.
      let latest_in_batch = if event.is_parent_change() {
        None
      } else {
        latest_detail_at(tx, log.log_id, log.last_batch)?
      };

      let bump = should_start_new_batch(&log, event, latest_in_batch, window);
      let batch = if bump { log.last_batch + 1 } else { log.last_batch };

      tx.execute(
        "UPDATE root_logs
         SET last_event = ?2, last_batch = ?3, last_actor = ?4,
             last_changed_at = ?5, seen_all = 0
         WHERE log_id = ?1",
        rusqlite::params![
          encode_uuid(log.log_id),
          event.kind.discriminant(),
          batch,
          event.actor_id.map(encode_uuid),
          encode_dt(event.occurred_at),
        ],
      )?;

      (log.log_id, batch, bump)
    }
  };

  tx.execute(
    "INSERT INTO details (
       detail_id, log_id, batch, entity_type, entity_id,
       event, old_json, new_json, actor_id, occurred_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      encode_uuid(log_id),
      batch,
      event.entity.entity_type,
      event.entity.entity_id,
      event.kind.discriminant(),
      encode_fields(&event.changes.old)?,
      encode_fields(&event.changes.new)?,
      event.actor_id.map(encode_uuid),
      encode_dt(event.occurred_at),
    ],
  )?;

  Ok(RecordOutcome { log_id, batch, started_new_batch })
}

/// Timestamp of the most recently inserted detail under `batch`, if any.
fn latest_detail_at(
  tx: &rusqlite::Transaction<'_>,
  log_id: Uuid,
  batch: i64,
) -> Result<Option<DateTime<Utc>>> {
  let raw: Option<String> = tx
    .query_row(
      "SELECT occurred_at FROM details
       WHERE log_id = ?1 AND batch = ?2
       ORDER BY rowid DESC LIMIT 1",
      rusqlite::params![encode_uuid(log_id), batch],
      |row| row.get(0),
    )
    .optional()?;

  raw.as_deref().map(decode_dt).transpose()
}

// ─── ActivityStore impl ──────────────────────────────────────────────────────

impl ActivityStore for SqliteStore {
  type Error = Error;

  async fn record(&self, event: ChangeEvent) -> Result<RecordOutcome> {
    let window = self.config.batch_window();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome =
          write_event(&tx, &event, window).map_err(Error::into_call_error)?;
        tx.commit()?;
        Ok(outcome)
      })
      .await
      .map_err(Error::from_call_error)
  }

  async fn find_log(&self, entity: &EntityRef) -> Result<Option<RootLog>> {
    let entity_type = entity.entity_type.clone();
    let entity_id = entity.entity_id.clone();

    let raw: Option<RawRootLog> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT log_id, entity_type, entity_id, display_label,
                      last_event, last_batch, last_actor, last_changed_at, seen_all
               FROM root_logs WHERE entity_type = ?1 AND entity_id = ?2",
              rusqlite::params![entity_type, entity_id],
              map_log_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRootLog::into_log).transpose()
  }

  async fn get_log(&self, log_id: Uuid) -> Result<Option<RootLog>> {
    let id_str = encode_uuid(log_id);

    let raw: Option<RawRootLog> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT log_id, entity_type, entity_id, display_label,
                      last_event, last_batch, last_actor, last_changed_at, seen_all
               FROM root_logs WHERE log_id = ?1",
              rusqlite::params![id_str],
              map_log_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRootLog::into_log).transpose()
  }

  async fn get_details(&self, log_id: Uuid) -> Result<Vec<Detail>> {
    let id_str = encode_uuid(log_id);

    let raws: Vec<RawDetail> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT detail_id, log_id, batch, entity_type, entity_id,
                  event, old_json, new_json, actor_id, occurred_at
           FROM details WHERE log_id = ?1
           ORDER BY rowid",
        )?;

        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawDetail {
              detail_id:   row.get(0)?,
              log_id:      row.get(1)?,
              batch:       row.get(2)?,
              entity_type: row.get(3)?,
              entity_id:   row.get(4)?,
              event:       row.get(5)?,
              old_json:    row.get(6)?,
              new_json:    row.get(7)?,
              actor_id:    row.get(8)?,
              occurred_at: row.get(9)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDetail::into_detail).collect()
  }

  async fn list_logs(&self, unseen_only: bool) -> Result<Vec<RootLog>> {
    let raws: Vec<RawRootLog> = self
      .conn
      .call(move |conn| {
        let sql = if unseen_only {
          "SELECT log_id, entity_type, entity_id, display_label,
                  last_event, last_batch, last_actor, last_changed_at, seen_all
           FROM root_logs WHERE seen_all = 0
           ORDER BY last_changed_at DESC"
        } else {
          "SELECT log_id, entity_type, entity_id, display_label,
                  last_event, last_batch, last_actor, last_changed_at, seen_all
           FROM root_logs
           ORDER BY last_changed_at DESC"
        };

        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map([], map_log_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRootLog::into_log).collect()
  }

  async fn mark_seen(&self, log_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(log_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE root_logs SET seen_all = 1 WHERE log_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    let cutoff_str = encode_dt(cutoff);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM root_logs WHERE last_changed_at < ?1",
          rusqlite::params![cutoff_str],
        )?)
      })
      .await?;

    Ok(deleted as u64)
  }
}

fn map_log_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRootLog> {
  Ok(RawRootLog {
    log_id:          row.get(0)?,
    entity_type:     row.get(1)?,
    entity_id:       row.get(2)?,
    display_label:   row.get(3)?,
    last_event:      row.get(4)?,
    last_batch:      row.get(5)?,
    last_actor:      row.get(6)?,
    last_changed_at: row.get(7)?,
    seen_all:        row.get(8)?,
  })
}
