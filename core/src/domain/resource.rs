//! Cluster resource models.

use serde::{Deserialize, Serialize};

// ============================================================================
// NodeKind
// ============================================================================

/// Kind of a node in the resource hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Cluster,
    Project,
    Application,
    Component,
    Storage,
    Url,
    Service,
}

impl NodeKind {
    /// Get the display name for this kind, as used in user-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            NodeKind::Cluster => "Cluster",
            NodeKind::Project => "Project",
            NodeKind::Application => "Application",
            NodeKind::Component => "Component",
            NodeKind::Storage => "Storage",
            NodeKind::Url => "URL",
            NodeKind::Service => "Service",
        }
    }

    /// Kinds that may appear as children of a node of this kind.
    pub fn child_kinds(&self) -> &'static [NodeKind] {
        match self {
            NodeKind::Cluster => &[NodeKind::Project],
            NodeKind::Project => &[NodeKind::Application],
            NodeKind::Application => &[NodeKind::Component, NodeKind::Service],
            NodeKind::Component => &[NodeKind::Storage, NodeKind::Url],
            NodeKind::Storage | NodeKind::Url | NodeKind::Service => &[],
        }
    }

    /// Whether a node of this kind can own a child of `kind`.
    pub fn can_own(&self, kind: NodeKind) -> bool {
        self.child_kinds().contains(&kind)
    }

    /// Whether nodes of this kind never have children.
    pub fn is_leaf(&self) -> bool {
        self.child_kinds().is_empty()
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Component source
// ============================================================================

/// Where a component's code comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    Git,
    Binary,
    Local,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Git => "git",
            SourceKind::Binary => "binary",
            SourceKind::Local => "local",
        }
    }

    /// Parse a source kind from its lowercase name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "git" => Some(SourceKind::Git),
            "binary" => Some(SourceKind::Binary),
            "local" => Some(SourceKind::Local),
            _ => None,
        }
    }
}

/// Source of a component: kind plus location (repository URL or path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSource {
    pub kind: SourceKind,
    pub location: String,
}

impl ComponentSource {
    pub fn git(url: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Git,
            location: url.into(),
        }
    }

    pub fn binary(path: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Binary,
            location: path.into(),
        }
    }

    pub fn local(path: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Local,
            location: path.into(),
        }
    }

    /// Parse `<kind>:<location>`, e.g. `git:https://github.com/sclorg/nodejs-ex`.
    pub fn parse(value: &str) -> Option<Self> {
        let (kind, location) = value.split_once(':')?;
        let kind = SourceKind::parse(kind)?;
        if location.is_empty() {
            return None;
        }
        Some(Self {
            kind,
            location: location.to_string(),
        })
    }
}

impl std::fmt::Display for ComponentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.location)
    }
}

// ============================================================================
// Resource
// ============================================================================

/// Attributes of one cluster resource, as reported by the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Resource {
    #[serde(rename_all = "camelCase")]
    Cluster { server_url: String },
    Project { name: String },
    Application { name: String },
    #[serde(rename_all = "camelCase")]
    Component {
        name: String,
        component_type: String,
        component_type_version: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<ComponentSource>,
    },
    #[serde(rename_all = "camelCase")]
    Storage {
        name: String,
        mount_path: String,
        size_gib: u32,
    },
    #[serde(rename_all = "camelCase")]
    Url {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        exposed_port: Option<u16>,
    },
    #[serde(rename_all = "camelCase")]
    Service { name: String, template_name: String },
}

impl Resource {
    pub fn project(name: impl Into<String>) -> Self {
        Resource::Project { name: name.into() }
    }

    pub fn application(name: impl Into<String>) -> Self {
        Resource::Application { name: name.into() }
    }

    pub fn component(
        name: impl Into<String>,
        component_type: impl Into<String>,
        version: impl Into<String>,
        source: Option<ComponentSource>,
    ) -> Self {
        Resource::Component {
            name: name.into(),
            component_type: component_type.into(),
            component_type_version: version.into(),
            source,
        }
    }

    pub fn storage(name: impl Into<String>, mount_path: impl Into<String>, size_gib: u32) -> Self {
        Resource::Storage {
            name: name.into(),
            mount_path: mount_path.into(),
            size_gib,
        }
    }

    pub fn url(name: impl Into<String>, exposed_port: Option<u16>) -> Self {
        Resource::Url {
            name: name.into(),
            exposed_port,
        }
    }

    pub fn service(name: impl Into<String>, template_name: impl Into<String>) -> Self {
        Resource::Service {
            name: name.into(),
            template_name: template_name.into(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Resource::Cluster { .. } => NodeKind::Cluster,
            Resource::Project { .. } => NodeKind::Project,
            Resource::Application { .. } => NodeKind::Application,
            Resource::Component { .. } => NodeKind::Component,
            Resource::Storage { .. } => NodeKind::Storage,
            Resource::Url { .. } => NodeKind::Url,
            Resource::Service { .. } => NodeKind::Service,
        }
    }

    /// The resource's name. For the cluster root this is the server URL.
    pub fn name(&self) -> &str {
        match self {
            Resource::Cluster { server_url } => server_url,
            Resource::Project { name }
            | Resource::Application { name }
            | Resource::Component { name, .. }
            | Resource::Storage { name, .. }
            | Resource::Url { name, .. }
            | Resource::Service { name, .. } => name,
        }
    }

    /// Identity of this resource among its siblings.
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.kind(), self.name())
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Component {
                name,
                component_type,
                component_type_version,
                ..
            } => write!(f, "{} ({}:{})", name, component_type, component_type_version),
            Resource::Storage {
                name,
                mount_path,
                size_gib,
            } => write!(f, "{} ({}, {}Gi)", name, mount_path, size_gib),
            Resource::Url {
                name,
                exposed_port: Some(port),
            } => write!(f, "{} (:{})", name, port),
            Resource::Service {
                name,
                template_name,
            } => write!(f, "{} ({})", name, template_name),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// (kind, name) pair identifying a child under one parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: NodeKind,
    pub name: String,
}

impl ResourceKey {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

// ============================================================================
// ResourcePath
// ============================================================================

/// Names of the project/application/component enclosing a node.
///
/// This is what the tool needs on its command line (`--project`, `--app`,
/// `--component`) to address a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourcePath {
    pub project: Option<String>,
    pub application: Option<String>,
    pub component: Option<String>,
}

impl ResourcePath {
    pub fn project(project: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            ..Default::default()
        }
    }

    pub fn application(project: impl Into<String>, application: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            application: Some(application.into()),
            component: None,
        }
    }

    pub fn component(
        project: impl Into<String>,
        application: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            project: Some(project.into()),
            application: Some(application.into()),
            component: Some(component.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_kinds() {
        assert!(NodeKind::Cluster.can_own(NodeKind::Project));
        assert!(NodeKind::Application.can_own(NodeKind::Service));
        assert!(NodeKind::Application.can_own(NodeKind::Component));
        assert!(!NodeKind::Application.can_own(NodeKind::Storage));
        assert!(NodeKind::Url.is_leaf());
        assert!(!NodeKind::Component.is_leaf());
    }

    #[test]
    fn test_component_source_parse() {
        let source = ComponentSource::parse("git:https://github.com/sclorg/nodejs-ex").unwrap();
        assert_eq!(source.kind, SourceKind::Git);
        assert_eq!(source.location, "https://github.com/sclorg/nodejs-ex");
        assert_eq!(source.to_string(), "git:https://github.com/sclorg/nodejs-ex");

        assert_eq!(
            ComponentSource::parse("local:/home/dev/app"),
            Some(ComponentSource::local("/home/dev/app"))
        );
        assert!(ComponentSource::parse("svn:foo").is_none());
        assert!(ComponentSource::parse("git:").is_none());
        assert!(ComponentSource::parse("nodejs").is_none());
    }

    #[test]
    fn test_resource_key() {
        let storage = Resource::storage("data", "/var/data", 1);
        assert_eq!(storage.kind(), NodeKind::Storage);
        assert_eq!(storage.key(), ResourceKey::new(NodeKind::Storage, "data"));
        assert_eq!(storage.key().to_string(), "Storage 'data'");

        let cluster = Resource::Cluster {
            server_url: "https://api.example.com:6443".to_string(),
        };
        assert_eq!(cluster.name(), "https://api.example.com:6443");
    }

    #[test]
    fn test_resource_display() {
        let component = Resource::component("frontend", "nodejs", "8", None);
        assert_eq!(component.to_string(), "frontend (nodejs:8)");
        assert_eq!(Resource::url("web", Some(8080)).to_string(), "web (:8080)");
        assert_eq!(Resource::url("web", None).to_string(), "web");
    }

    #[test]
    fn test_resource_json_shape() {
        let json = serde_json::to_value(Resource::service("db", "mongodb-persistent")).unwrap();
        assert_eq!(json["kind"], "service");
        assert_eq!(json["templateName"], "mongodb-persistent");
    }
}
