//! the test_utils folder here will share utils or test components between
//! unit tests
mod common;
mod fixtures;
mod reconcilers;
mod sources;

pub use common::*;
pub use fixtures::*;
pub use reconcilers::*;
pub use sources::*;
