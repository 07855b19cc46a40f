//! Domain layer - Pure resource models and rules.
//!
//! This module contains the types describing cluster resources, catalog
//! metadata and the naming rule. These types have no I/O dependencies and can
//! be tested in isolation.

mod catalog;
mod name;
mod resource;

// Re-export all domain types
pub use catalog::{
    component_type_names, component_type_tags, service_template_plans, ComponentType,
    ServiceTemplate,
};
pub use name::{validate_name, NameValidity, MAX_NAME_LENGTH, MIN_NAME_LENGTH};
pub use resource::{
    ComponentSource, NodeKind, Resource, ResourceKey, ResourcePath, SourceKind,
};
