//! Watch registrations: sources, informers and the glue that turns change
//! notifications into queue keys.
mod event;
mod handler;
mod informer;
mod memory;
mod source;
mod store;
mod sync;

pub use event::*;
pub use handler::*;
pub use informer::*;
pub use memory::*;
pub use source::*;
pub use store::*;
pub use sync::*;

#[cfg(test)]
mod memory_test;
