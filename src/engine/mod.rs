//! Engine assembly and lifecycle.
//!
//! An [`EngineBuilder`] collects the reconciler and every watch; `build`
//! turns it into an [`Engine`] whose watch set can no longer change.
//! [`Engine::run`] then drives `NotStarted -> Syncing -> Running ->
//! ShuttingDown -> Stopped` until the stop signal fires.
mod builder;
mod engine;
mod state;
mod worker;

pub use builder::*;
pub use engine::*;
pub use state::*;
pub(crate) use worker::*;

#[cfg(test)]
mod builder_test;
