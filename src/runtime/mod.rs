//! Runtime support for store notifications.
//!
//! This module provides the per-thread delivery queue that orders
//! subscriber notifications across every store.

mod context;

pub use context::NotifyRuntime;
pub(crate) use context::Job;
