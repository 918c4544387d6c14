//! Error types for `trail-core`.
//!
//! These are the configuration-level rejections: a [`ChangeEvent`](crate::event::ChangeEvent)
//! that cannot identify its root entity is refused before any write is
//! attempted. Storage-level failures live in the backend crates.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("change event has an empty entity type")]
  EmptyEntityType,

  #[error("change event has an empty entity id")]
  EmptyEntityId,

  #[error("child change event carries an incomplete root reference")]
  EmptyRootReference,

  #[error("unknown event kind discriminant: {0:?}")]
  UnknownEventKind(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
