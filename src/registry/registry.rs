use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

use crate::domain::{parent_uri, Parameters, Resource, ResourceEvent};
use crate::error::{MapeError, Result};
use crate::listener::same_listener;

/// Receives structural changes of the resource tree
#[async_trait]
pub trait ResourceListener: Send + Sync {
    async fn process_event(&self, event: &ResourceEvent) -> Result<()>;
}

tokio::task_local! {
    /// Set while a listener delivery task runs `process_event`
    static DELIVERING: ();
}

struct Delivery {
    event: ResourceEvent,
    done: oneshot::Sender<()>,
}

/// Each listener owns an ordered queue drained by its own task. Events are
/// queued under the registry write lock, so every listener sees mutations in
/// the order they were applied.
struct ListenerEntry {
    listener: Arc<dyn ResourceListener>,
    queue: mpsc::UnboundedSender<Delivery>,
}

/// Acknowledgements for queued deliveries
type Pending = Vec<oneshot::Receiver<()>>;

#[derive(Default)]
struct RegistryState {
    resources: HashMap<String, Resource>,
    listeners: Vec<ListenerEntry>,
}

impl RegistryState {
    fn get(&self, uri: &str) -> Result<&Resource> {
        self.resources
            .get(uri)
            .ok_or_else(|| MapeError::NotRegistered(uri.to_string()))
    }

    fn get_mut(&mut self, uri: &str) -> Result<&mut Resource> {
        self.resources
            .get_mut(uri)
            .ok_or_else(|| MapeError::NotRegistered(uri.to_string()))
    }

    fn insert_root(&mut self, resource: Resource) -> Result<Pending> {
        if self.resources.contains_key(&resource.uri) {
            return Err(MapeError::AlreadyRegistered(resource.uri));
        }
        Ok(self.insert(resource))
    }

    fn insert_child(&mut self, parent: &str, mut resource: Resource) -> Result<Pending> {
        if !self.resources.contains_key(parent) {
            return Err(MapeError::NotRegistered(parent.to_string()));
        }
        if self.resources.contains_key(&resource.uri) {
            return Err(MapeError::AlreadyRegistered(resource.uri));
        }

        resource.parent = Some(parent.to_string());
        self.get_mut(parent)?.link_child(&resource.uri);
        Ok(self.insert(resource))
    }

    fn insert(&mut self, resource: Resource) -> Pending {
        let event = ResourceEvent::added(&resource);
        self.resources.insert(resource.uri.clone(), resource);
        self.publish(event)
    }

    /// Queue one event for every subscribed listener
    fn publish(&self, event: ResourceEvent) -> Pending {
        debug!(
            "Dispatching {} event for {} to {} listeners",
            event.kind,
            event.uri,
            self.listeners.len()
        );
        self.listeners
            .iter()
            .filter_map(|entry| enqueue(&entry.queue, event.clone()))
            .collect()
    }
}

fn enqueue(
    queue: &mpsc::UnboundedSender<Delivery>,
    event: ResourceEvent,
) -> Option<oneshot::Receiver<()>> {
    let (done, ack) = oneshot::channel();
    queue.send(Delivery { event, done }).ok().map(|_| ack)
}

async fn delivery_loop(
    listener: Arc<dyn ResourceListener>,
    mut queue: mpsc::UnboundedReceiver<Delivery>,
) {
    DELIVERING
        .scope((), async move {
            while let Some(Delivery { event, done }) = queue.recv().await {
                if let Err(e) = listener.process_event(&event).await {
                    warn!(
                        "Resource listener failed on {} event for {}: {}",
                        event.kind, event.uri, e
                    );
                }
                let _ = done.send(());
            }
        })
        .await
}

/// Wait until the queued events have been processed. A listener that calls
/// back into the registry does not wait, since its own queue is busy with the
/// event it is handling.
async fn delivered(pending: Pending) {
    if DELIVERING.try_with(|_| ()).is_ok() {
        return;
    }
    for ack in pending {
        let _ = ack.await;
    }
}

/// Resource tree guarded by a single lock; listener delivery happens outside it
pub struct ResourceRegistry {
    state: RwLock<RegistryState>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Register a root resource
    pub async fn register(
        &self,
        uri: &str,
        resource_type: &str,
        parameters: Parameters,
    ) -> Result<()> {
        let pending = {
            let mut state = self.state.write().await;
            state.insert_root(Resource::new(uri, resource_type, parameters))?
        };

        info!("Registered resource {} ({})", uri, resource_type);
        delivered(pending).await;
        Ok(())
    }

    /// Register `uri` under an already registered `parent`
    pub async fn register_child(
        &self,
        parent: &str,
        uri: &str,
        resource_type: &str,
        parameters: Parameters,
    ) -> Result<()> {
        let pending = {
            let mut state = self.state.write().await;
            state.insert_child(parent, Resource::new(uri, resource_type, parameters))?
        };

        info!(
            "Registered resource {} ({}) under {}",
            uri, resource_type, parent
        );
        delivered(pending).await;
        Ok(())
    }

    /// Register as a child when the URI's parent is registered, otherwise as a
    /// root. The parent lookup and the insert happen under the same lock.
    pub async fn register_resource(
        &self,
        uri: &str,
        resource_type: &str,
        parameters: Parameters,
    ) -> Result<()> {
        let (pending, parent) = {
            let mut state = self.state.write().await;
            let parent = parent_uri(uri)
                .filter(|p| state.resources.contains_key(*p))
                .map(str::to_string);
            let resource = Resource::new(uri, resource_type, parameters);
            let pending = match &parent {
                Some(parent) => state.insert_child(parent, resource)?,
                None => state.insert_root(resource)?,
            };
            (pending, parent)
        };

        match parent {
            Some(parent) => info!(
                "Registered resource {} ({}) under {}",
                uri, resource_type, parent
            ),
            None => info!("Registered resource {} ({})", uri, resource_type),
        }
        delivered(pending).await;
        Ok(())
    }

    /// Merge `parameters` into the resource's parameter map
    pub async fn add_parameters(&self, uri: &str, parameters: Parameters) -> Result<()> {
        let mut state = self.state.write().await;
        state.get_mut(uri)?.parameters.extend(parameters);
        Ok(())
    }

    pub async fn set_capabilities(&self, uri: &str, capabilities: Vec<String>) -> Result<()> {
        let mut state = self.state.write().await;
        state.get_mut(uri)?.capabilities = capabilities;
        Ok(())
    }

    /// Remove a resource and unlink it from its parent.
    ///
    /// Children are left registered as roots.
    pub async fn unregister(&self, uri: &str) -> Result<()> {
        let pending = {
            let mut state = self.state.write().await;
            let resource = state
                .resources
                .remove(uri)
                .ok_or_else(|| MapeError::NotRegistered(uri.to_string()))?;

            if let Some(parent) = resource.parent.as_deref() {
                if let Some(parent) = state.resources.get_mut(parent) {
                    parent.unlink_child(uri);
                }
            }
            for child in &resource.children {
                if let Some(child) = state.resources.get_mut(child) {
                    child.parent = None;
                }
            }

            state.publish(ResourceEvent::removed(&resource))
        };

        info!("Unregistered resource {}", uri);
        delivered(pending).await;
        Ok(())
    }

    pub async fn is_registered(&self, uri: &str) -> bool {
        self.state.read().await.resources.contains_key(uri)
    }

    /// All registered URIs, sorted
    pub async fn all_registered(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut uris: Vec<String> = state.resources.keys().cloned().collect();
        uris.sort();
        uris
    }

    pub async fn type_of(&self, uri: &str) -> Result<String> {
        let state = self.state.read().await;
        Ok(state.get(uri)?.resource_type.clone())
    }

    pub async fn capabilities_of(&self, uri: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state.get(uri)?.capabilities.clone())
    }

    pub async fn resource(&self, uri: &str) -> Result<Resource> {
        let state = self.state.read().await;
        state.get(uri).cloned()
    }

    pub async fn children_of(&self, uri: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state.get(uri)?.children.clone())
    }

    pub async fn parent_of(&self, uri: &str) -> Result<Option<String>> {
        let state = self.state.read().await;
        Ok(state.get(uri)?.parent.clone())
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.resources.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Subscribe a listener and replay every registered resource to it.
    ///
    /// The replay is queued and the subscription recorded under the write
    /// lock, so a concurrent registration is either in the replay or delivered
    /// live after it, never both.
    pub async fn add_listener(&self, listener: Arc<dyn ResourceListener>) {
        let pending = {
            let mut state = self.state.write().await;
            if state
                .listeners
                .iter()
                .any(|e| same_listener(&e.listener, &listener))
            {
                debug!("Resource listener already subscribed");
                return;
            }

            let (queue, rx) = mpsc::unbounded_channel();
            let mut replay: Vec<ResourceEvent> =
                state.resources.values().map(ResourceEvent::initial).collect();
            replay.sort_by(|a, b| a.uri.cmp(&b.uri));

            debug!("Replaying {} resources to new listener", replay.len());
            let pending: Pending = replay
                .into_iter()
                .filter_map(|event| enqueue(&queue, event))
                .collect();

            tokio::spawn(delivery_loop(listener.clone(), rx));
            state.listeners.push(ListenerEntry { listener, queue });
            pending
        };

        delivered(pending).await;
    }

    /// Returns false if the listener was not subscribed. Events already queued
    /// for it are still delivered.
    pub async fn remove_listener(&self, listener: &Arc<dyn ResourceListener>) -> bool {
        let mut state = self.state.write().await;
        let before = state.listeners.len();
        state
            .listeners
            .retain(|e| !same_listener(&e.listener, listener));
        state.listeners.len() < before
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
