use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque registration parameters attached to a resource
pub type Parameters = HashMap<String, serde_json::Value>;

/// A managed entity in the resource tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub uri: String,
    pub resource_type: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub parameters: Parameters,
    /// `None` for root resources
    #[serde(default)]
    pub parent: Option<String>,
    /// Child URIs in insertion order, no duplicates
    #[serde(default)]
    pub children: Vec<String>,
}

impl Resource {
    pub fn new(uri: &str, resource_type: &str, parameters: Parameters) -> Self {
        Self {
            uri: uri.to_string(),
            resource_type: resource_type.to_string(),
            capabilities: Vec::new(),
            parameters,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub(crate) fn link_child(&mut self, child: &str) {
        if !self.children.iter().any(|c| c == child) {
            self.children.push(child.to_string());
        }
    }

    pub(crate) fn unlink_child(&mut self, child: &str) {
        self.children.retain(|c| c != child);
    }
}

/// Parent of a hierarchical URI, i.e. everything before the last `/segment`.
///
/// `/host1/cpu0` -> `/host1`, `/host1` -> `None`.
pub fn parent_uri(uri: &str) -> Option<&str> {
    let trimmed = uri.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&trimmed[..idx]),
    }
}

/// What happened to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceEventKind {
    /// Replayed on subscription for a resource that already existed
    Initial,
    Added,
    Removed,
}

impl fmt::Display for ResourceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceEventKind::Initial => write!(f, "initial"),
            ResourceEventKind::Added => write!(f, "added"),
            ResourceEventKind::Removed => write!(f, "removed"),
        }
    }
}

/// Structural change notification delivered to resource listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub kind: ResourceEventKind,
    pub uri: String,
    pub resource_type: Option<String>,
}

impl ResourceEvent {
    pub fn initial(resource: &Resource) -> Self {
        Self {
            kind: ResourceEventKind::Initial,
            uri: resource.uri.clone(),
            resource_type: Some(resource.resource_type.clone()),
        }
    }

    pub fn added(resource: &Resource) -> Self {
        Self {
            kind: ResourceEventKind::Added,
            uri: resource.uri.clone(),
            resource_type: Some(resource.resource_type.clone()),
        }
    }

    pub fn removed(resource: &Resource) -> Self {
        Self {
            kind: ResourceEventKind::Removed,
            uri: resource.uri.clone(),
            resource_type: Some(resource.resource_type.clone()),
        }
    }
}
