//! odo command-line client.
//!
//! This module provides functionality to:
//! - Build every odo invocation (`commands`)
//! - Parse odo's banner and tabular listings (`parser`)
//! - Run queries and mutations through a [`CommandRunner`](crate::ports::CommandRunner) (`client`)

mod client;
pub mod commands;
pub mod errors;
pub mod parser;

pub(crate) use client::path_segment;
pub use client::Odo;
pub use errors::{OdoError, Result};
