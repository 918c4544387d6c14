//! Core types and trait definitions for the Trail activity log.
//!
//! Everything here is storage- and transport-agnostic: the change-event
//! contract, the stored record shapes, the pure batch-boundary decision,
//! and the `ActivityStore` abstraction the backends implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod batch;
pub mod config;
pub mod error;
pub mod event;
pub mod log;
pub mod store;

pub use error::{Error, Result};
