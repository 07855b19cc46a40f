//! odo Explorer Core Library
//!
//! Live, hierarchical view of cluster resources backed by the `odo` CLI.
//! Provides functionality to:
//! - Run odo and parse its banner and tabular listings
//! - Cache the cluster → project → application → component hierarchy
//! - Create, delete and link resources, waiting until a refresh confirms the change
//! - Manage user configuration
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Resource models, catalog metadata and the naming rule
//! - `ports`: Trait definitions (command runner, child source)
//! - `adapters`: `tokio::process` runner
//! - `odo`: Command builders, output parsers and the typed client
//! - `tree`: The in-memory resource tree
//! - `reconcile`: Mutate-then-poll state machine
//! - `engine`: Facade used by front ends

pub mod domain;
pub mod ports;
pub mod adapters;

pub mod config;
pub mod engine;
pub mod error;
pub mod odo;
pub mod reconcile;
pub mod tree;

#[cfg(test)]
mod test_support;

// Re-export domain types (primary API)
pub use domain::{
    validate_name, ComponentSource, ComponentType, NameValidity, NodeKind, Resource, ResourceKey,
    ResourcePath, ServiceTemplate, SourceKind,
};

// Re-export other commonly used types
pub use adapters::ProcessRunner;
pub use config::{Config, ConfigStore};
pub use engine::{ExplorerEngine, Notification};
pub use error::{Error, Result, ValidationError};
pub use odo::{Odo, OdoError};
pub use reconcile::{Operation, OperationOptions, OperationState, Reconciler, Settled};
pub use tree::{diff, Diff, Node, NodeId, NodeSnapshot, ResourceTree};
