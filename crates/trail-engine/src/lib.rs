//! The write entrypoint of the Trail activity log.
//!
//! [`Engine`] sits between event producers (the model-lifecycle
//! collaborator, or a task queue in async deployments) and any
//! [`ActivityStore`] backend. It validates events before any write is
//! attempted, serializes writers per root entity, and guarantees that a
//! failure to record a change is loud: the full event payload is logged
//! and the error is re-raised, never swallowed.

use std::{
  collections::HashMap,
  sync::{Arc, Weak},
};

use thiserror::Error;
use trail_core::{
  event::{ChangeEvent, EntityRef},
  log::RecordOutcome,
  store::ActivityStore,
};

// ─── Error ───────────────────────────────────────────────────────────────────

/// An error returned by [`Engine::record`].
#[derive(Debug, Error)]
pub enum Error<E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  /// The event could not identify its root entity; nothing was written.
  #[error("invalid change event: {0}")]
  Invalid(#[from] trail_core::Error),

  /// The atomic write failed; the store rolled everything back.
  #[error("failed to persist change event: {0}")]
  Store(#[source] E),
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The batching engine's service half: validation, per-root ordering,
/// and delegation to the storage backend.
pub struct Engine<S: ActivityStore> {
  store:      Arc<S>,
  /// One async mutex per root entity with in-flight writes. Writers for
  /// the same root queue up here in submission order, so a concurrent
  /// task pool cannot reorder events within a root even though roots
  /// proceed independently. Entries are weak so the map tracks live
  /// writers only, not every root ever seen.
  root_locks: std::sync::Mutex<HashMap<EntityRef, Weak<tokio::sync::Mutex<()>>>>,
}

impl<S: ActivityStore> Engine<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      root_locks: std::sync::Mutex::new(HashMap::new()),
    }
  }

  /// Fold one change event into the log.
  ///
  /// Rejects events with missing identity fields before any write.
  /// Holds the root's lock across the store call so events for one root
  /// are recorded in the order they arrive here.
  pub async fn record(&self, event: ChangeEvent) -> Result<RecordOutcome, Error<S::Error>> {
    event.validate()?;

    let lock = self.lock_for(event.root_entity());
    let _guard = lock.lock().await;

    match self.store.record(event.clone()).await {
      Ok(outcome) => Ok(outcome),
      Err(e) => {
        // An audit trail must not fail silently: log the full payload so
        // the lost change is recoverable from the logs, then re-raise.
        let payload = serde_json::to_string(&event)
          .unwrap_or_else(|_| format!("{event:?}"));
        tracing::error!(error = %e, event = %payload, "failed to record change event");
        Err(Error::Store(e))
      }
    }
  }

  fn lock_for(&self, root: &EntityRef) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = self.root_locks.lock().expect("root lock map poisoned");
    if let Some(existing) = locks.get(root).and_then(Weak::upgrade) {
      return existing;
    }
    // Dead entries are swept on the miss path, so the map stays bounded
    // by the number of roots with writers in flight.
    locks.retain(|_, weak| weak.strong_count() > 0);
    let fresh = Arc::new(tokio::sync::Mutex::new(()));
    locks.insert(root.clone(), Arc::downgrade(&fresh));
    fresh
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
