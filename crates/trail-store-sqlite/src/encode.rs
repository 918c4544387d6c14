//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with fixed microsecond
//! precision so lexicographic string comparison matches chronological
//! order. ChangeSet halves are stored as compact JSON objects. UUIDs are
//! stored as hyphenated lowercase strings.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use trail_core::{
  event::{ChangeSet, EntityRef, EventKind},
  log::{Detail, RootLog},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Diff halves ─────────────────────────────────────────────────────────────

pub fn encode_fields(fields: &BTreeMap<String, serde_json::Value>) -> Result<String> {
  Ok(serde_json::to_string(fields)?)
}

pub fn decode_fields(s: &str) -> Result<BTreeMap<String, serde_json::Value>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `root_logs` row.
pub struct RawRootLog {
  pub log_id:          String,
  pub entity_type:     String,
  pub entity_id:       String,
  pub display_label:   String,
  pub last_event:      String,
  pub last_batch:      i64,
  pub last_actor:      Option<String>,
  pub last_changed_at: String,
  pub seen_all:        bool,
}

impl RawRootLog {
  pub fn into_log(self) -> Result<RootLog> {
    Ok(RootLog {
      log_id: decode_uuid(&self.log_id)?,
      entity: EntityRef {
        entity_type: self.entity_type,
        entity_id:   self.entity_id,
      },
      display_label:   self.display_label,
      last_event:      EventKind::from_discriminant(&self.last_event)
        .map_err(Error::Core)?,
      last_batch:      self.last_batch,
      last_actor:      self.last_actor.as_deref().map(decode_uuid).transpose()?,
      last_changed_at: decode_dt(&self.last_changed_at)?,
      seen_all:        self.seen_all,
    })
  }
}

/// Raw strings read directly from a `details` row.
pub struct RawDetail {
  pub detail_id:   String,
  pub log_id:      String,
  pub batch:       i64,
  pub entity_type: String,
  pub entity_id:   String,
  pub event:       String,
  pub old_json:    String,
  pub new_json:    String,
  pub actor_id:    Option<String>,
  pub occurred_at: String,
}

impl RawDetail {
  pub fn into_detail(self) -> Result<Detail> {
    Ok(Detail {
      detail_id: decode_uuid(&self.detail_id)?,
      log_id:    decode_uuid(&self.log_id)?,
      batch:     self.batch,
      entity: EntityRef {
        entity_type: self.entity_type,
        entity_id:   self.entity_id,
      },
      event: EventKind::from_discriminant(&self.event).map_err(Error::Core)?,
      changes: ChangeSet {
        old: decode_fields(&self.old_json)?,
        new: decode_fields(&self.new_json)?,
      },
      actor_id:    self.actor_id.as_deref().map(decode_uuid).transpose()?,
      occurred_at: decode_dt(&self.occurred_at)?,
    })
  }
}
