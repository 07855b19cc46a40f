//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces that the tree and the reconciliation
//! engine use to reach external systems. Implementations live in `adapters`
//! and `odo`.

mod runner;
mod source;

pub use runner::{
    CommandLine, CommandOutput, CommandRunner, OutputLine, OutputSource, OutputStream,
    RunOptions, DEFAULT_INVOCATION_TIMEOUT,
};
pub use source::ChildSource;
