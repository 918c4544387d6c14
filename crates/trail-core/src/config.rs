//! Audit configuration, passed by value into the engine and the store at
//! construction time. No component reads ambient/global state.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Tunables for the batching engine and the retention collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
  /// Maximum gap between two changes for them to fold into one batch.
  #[serde(default = "default_batch_window_secs")]
  pub batch_window_secs: u64,

  /// Logs whose last change is older than this are eligible for pruning.
  #[serde(default = "default_retention_days")]
  pub retention_days: u32,
}

fn default_batch_window_secs() -> u64 { 3 }

fn default_retention_days() -> u32 { 90 }

impl Default for AuditConfig {
  fn default() -> Self {
    Self {
      batch_window_secs: default_batch_window_secs(),
      retention_days:    default_retention_days(),
    }
  }
}

impl AuditConfig {
  pub fn batch_window(&self) -> Duration {
    Duration::seconds(self.batch_window_secs as i64)
  }

  /// The prune cutoff as of `now`: anything last changed before it is
  /// out of retention.
  pub fn retention_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(i64::from(self.retention_days))
  }
}
