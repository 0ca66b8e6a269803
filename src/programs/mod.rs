//! # Program descriptors and status types.
//!
//! - [`ProgramSpec`] / [`LaunchSpec`] - what to supervise and how to launch it
//! - [`Status`] - lifecycle state of one program
//! - [`StatusReport`] - observability snapshot returned by the supervisor

mod spec;
mod status;

pub use spec::{LaunchSpec, ProgramSpec};
pub use status::{Status, StatusReport};
