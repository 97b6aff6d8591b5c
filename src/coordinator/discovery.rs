use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::domain::Parameters;
use crate::error::{MapeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryEventType {
    NewResourcesDiscovered,
    ResourcesRemoved,
}

/// Batch of resources found (or lost) under one parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDiscoveryEvent {
    pub event_type: DiscoveryEventType,
    pub parent_uri: String,
    /// Absolute URIs, or names relative to `parent_uri`
    pub resources: Vec<String>,
    #[serde(default)]
    pub resource_types: HashMap<String, String>,
    #[serde(default)]
    pub resource_properties: HashMap<String, Parameters>,
}

impl ResourceDiscoveryEvent {
    pub fn discovered(parent_uri: &str) -> Self {
        Self {
            event_type: DiscoveryEventType::NewResourcesDiscovered,
            parent_uri: parent_uri.to_string(),
            resources: Vec::new(),
            resource_types: HashMap::new(),
            resource_properties: HashMap::new(),
        }
    }

    pub fn removed(parent_uri: &str, resources: &[&str]) -> Self {
        Self {
            event_type: DiscoveryEventType::ResourcesRemoved,
            resources: resources.iter().map(|r| r.to_string()).collect(),
            ..Self::discovered(parent_uri)
        }
    }

    pub fn with_resource(mut self, resource: &str, resource_type: &str, properties: Parameters) -> Self {
        self.resources.push(resource.to_string());
        self.resource_types
            .insert(resource.to_string(), resource_type.to_string());
        self.resource_properties
            .insert(resource.to_string(), properties);
        self
    }

    /// Absolute URI of an entry in `resources`
    pub fn resolve_uri(&self, resource: &str) -> String {
        if resource.starts_with('/') {
            resource.to_string()
        } else {
            format!("{}/{}", self.parent_uri.trim_end_matches('/'), resource)
        }
    }
}

/// Clone-friendly sender handed to discovery agents
#[derive(Clone)]
pub struct DiscoveryHandle {
    tx: mpsc::Sender<ResourceDiscoveryEvent>,
}

impl DiscoveryHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ResourceDiscoveryEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub async fn publish(&self, event: ResourceDiscoveryEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| MapeError::ChannelClosed("discovery channel".into()))
    }
}
