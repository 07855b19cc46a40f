//! Adapters layer - External system implementations.
//!
//! This module contains implementations of the port traits defined in `ports`.

pub mod process;

// Re-export main types for convenience
pub use process::{find_executable, ProcessRunner};
