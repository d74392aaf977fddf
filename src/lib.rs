//! A generic reconciliation engine.
//!
//! Watches resource collections through list/watch sources, coalesces change
//! notifications into [`ResourceKey`]s on a deduplicating, rate-limited work
//! queue, and drives a pluggable [`Reconciler`] from a pool of workers once
//! every watch has completed its initial list.
mod config;
mod engine;
mod errors;
mod key;
mod queue;
mod reconciler;
mod watch;
pub mod metrics;

pub use config::*;
pub use engine::*;
pub use errors::*;
pub use key::*;
pub use queue::*;
pub use reconciler::*;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
