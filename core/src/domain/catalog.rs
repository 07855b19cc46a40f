//! Catalog metadata: component types and service templates.
//!
//! These are not part of the live tree; they describe what can be created.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A component type offered by the catalog, e.g. `nodejs` with tags `8,10,latest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentType {
    pub name: String,
    /// Version tags in listing order.
    pub tags: Vec<String>,
}

/// A service template offered by the catalog with its ordered plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTemplate {
    pub name: String,
    pub available_plans: Vec<String>,
}

/// Distinct component type names, in first-seen order.
pub fn component_type_names(types: &[ComponentType]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    types
        .iter()
        .filter(|t| seen.insert(t.name.as_str()))
        .map(|t| t.name.clone())
        .collect()
}

/// Tags of the first row listing `name`, or an empty list when the type is unknown.
pub fn component_type_tags(types: &[ComponentType], name: &str) -> Vec<String> {
    types
        .iter()
        .find(|t| t.name == name)
        .map(|t| t.tags.clone())
        .unwrap_or_default()
}

/// Plans of the template named `name`, or an empty list when it is unknown.
pub fn service_template_plans(templates: &[ServiceTemplate], name: &str) -> Vec<String> {
    templates
        .iter()
        .find(|t| t.name == name)
        .map(|t| t.available_plans.clone())
        .unwrap_or_default()
}
