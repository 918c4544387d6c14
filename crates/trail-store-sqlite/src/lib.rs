//! SQLite backend for the Trail activity log.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. The batching write path
//! executes its whole read-decide-write sequence inside one immediate
//! transaction on that thread, which is what makes concurrent writers on
//! the same root entity safe.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
