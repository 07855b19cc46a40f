//! Parsers for odo's text output.
//!
//! Every parser here is pure and total: malformed rows are skipped and an
//! empty or header-only input yields an empty result, never an error.
//!
//! Expected tabular output format (first line is a header):
//! ```text
//! NAME            PROJECT                 TAGS
//! nodejs          openshift               8,10,latest
//! python          openshift               2.7,3.6,latest
//! ```

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::domain::{ComponentSource, ComponentType, Resource, ServiceTemplate};

/// Version reported when the banner cannot be recognised.
pub const UNKNOWN_VERSION: &str = "0.0.0";

/// Marker odo prints in front of the active project or application.
const ACTIVE_MARKER: &str = "*";

/// Version used for component types listed without an explicit tag.
const DEFAULT_TYPE_VERSION: &str = "latest";

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^odo v(\d+\.\d+\.\d+(?:[-+][0-9A-Za-z.+-]+)?) \([^)]*\)\s*$")
            .expect("version pattern is a valid regex")
    })
}

/// Extract the semantic version from `odo version` output.
///
/// Only the first line is considered; it must read `odo v<semver> (<hash>)`.
/// Any other shape yields [`UNKNOWN_VERSION`].
pub fn parse_version(output: &str) -> String {
    let first_line = output.lines().next().unwrap_or_default();
    match version_pattern().captures(first_line) {
        Some(caps) => caps[1].to_string(),
        None => {
            debug!(line = first_line, "Unrecognised version banner");
            UNKNOWN_VERSION.to_string()
        }
    }
}

/// Data rows of a whitespace-delimited table: header and blank lines dropped.
fn table_rows(output: &str) -> impl Iterator<Item = Vec<&str>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .skip(1)
        .map(|line| line.split_whitespace().collect())
}

/// Split a comma-separated list column, dropping empty entries.
fn split_list(column: &str) -> Vec<String> {
    column
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Strip the active marker from the front of a row, if present.
fn strip_active_marker<'a>(row: &'a [&'a str]) -> &'a [&'a str] {
    match row.first() {
        Some(&ACTIVE_MARKER) => &row[1..],
        _ => row,
    }
}

/// Parse `odo catalog list components`.
///
/// Rows are `NAME PROJECT TAGS`; the last column holds comma-separated tags.
pub fn parse_component_types(output: &str) -> Vec<ComponentType> {
    table_rows(output)
        .filter_map(|row| match row.as_slice() {
            [name, _project, tags] => Some(ComponentType {
                name: name.to_string(),
                tags: split_list(tags),
            }),
            _ => {
                debug!(row = ?row, "Skipping malformed catalog component row");
                None
            }
        })
        .collect()
}

/// Parse `odo catalog list services`.
///
/// Rows are `NAME PLANS`; plan order is preserved.
pub fn parse_service_templates(output: &str) -> Vec<ServiceTemplate> {
    table_rows(output)
        .filter_map(|row| match row.as_slice() {
            [name, plans] => Some(ServiceTemplate {
                name: name.to_string(),
                available_plans: split_list(plans),
            }),
            _ => {
                debug!(row = ?row, "Skipping malformed service template row");
                None
            }
        })
        .collect()
}

/// Parse `odo project list` or `odo app list`: rows are `[*] NAME`.
pub fn parse_names(output: &str) -> Vec<String> {
    table_rows(output)
        .filter_map(|row| match strip_active_marker(&row) {
            [name] => Some(name.to_string()),
            _ => {
                debug!(row = ?row, "Skipping malformed name row");
                None
            }
        })
        .collect()
}

/// Parse `odo list`: rows are `[*] NAME TYPE[:VERSION] [SOURCE]`.
pub fn parse_components(output: &str) -> Vec<Resource> {
    table_rows(output)
        .filter_map(|row| {
            let (name, component_type, source) = match strip_active_marker(&row) {
                [name, component_type] => (*name, *component_type, None),
                [name, component_type, source] => {
                    (*name, *component_type, ComponentSource::parse(source))
                }
                _ => {
                    debug!(row = ?row, "Skipping malformed component row");
                    return None;
                }
            };
            let (component_type, version) = component_type
                .split_once(':')
                .unwrap_or((component_type, DEFAULT_TYPE_VERSION));
            Some(Resource::component(name, component_type, version, source))
        })
        .collect()
}

/// Parse a size column such as `1Gi` into whole GiB.
fn parse_size_gib(size: &str) -> Option<u32> {
    size.strip_suffix("Gi")
        .or_else(|| size.strip_suffix("G"))
        .unwrap_or(size)
        .parse()
        .ok()
}

/// Parse `odo storage list`: rows are `NAME SIZE PATH`.
pub fn parse_storage(output: &str) -> Vec<Resource> {
    table_rows(output)
        .filter_map(|row| match row.as_slice() {
            [name, size, path] => match parse_size_gib(size) {
                Some(size_gib) => Some(Resource::storage(*name, *path, size_gib)),
                None => {
                    debug!(row = ?row, "Skipping storage row with unreadable size");
                    None
                }
            },
            _ => {
                debug!(row = ?row, "Skipping malformed storage row");
                None
            }
        })
        .collect()
}

/// Parse `odo url list`: rows are `NAME URL [PORT]`.
pub fn parse_urls(output: &str) -> Vec<Resource> {
    table_rows(output)
        .filter_map(|row| match row.as_slice() {
            [name, _url] => Some(Resource::url(*name, None)),
            [name, _url, port] => Some(Resource::url(*name, port.parse().ok())),
            _ => {
                debug!(row = ?row, "Skipping malformed url row");
                None
            }
        })
        .collect()
}

/// Parse `odo service list`: rows are `NAME TYPE [STATUS]`.
pub fn parse_services(output: &str) -> Vec<Resource> {
    table_rows(output)
        .filter_map(|row| match row.as_slice() {
            [name, template] | [name, template, _] => Some(Resource::service(*name, *template)),
            _ => {
                debug!(row = ?row, "Skipping malformed service row");
                None
            }
        })
        .collect()
}
