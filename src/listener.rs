//! Listener bookkeeping shared by every fan-out point
//!
//! Listeners are compared by identity (the address of the shared value), so the
//! same `Arc` registered twice is stored once and can be removed with any clone
//! of it.

use std::sync::Arc;

/// Identity comparison for shared listeners, ignoring vtable metadata
pub fn same_listener<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Ordered set of listeners keyed by identity
pub struct ListenerSet<T: ?Sized> {
    listeners: Vec<Arc<T>>,
}

impl<T: ?Sized> ListenerSet<T> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Returns false if the listener was already present
    pub fn add(&mut self, listener: Arc<T>) -> bool {
        if self.contains(&listener) {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    /// Returns false if the listener was not present
    pub fn remove(&mut self, listener: &Arc<T>) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| !same_listener(l, listener));
        self.listeners.len() < before
    }

    pub fn contains(&self, listener: &Arc<T>) -> bool {
        self.listeners.iter().any(|l| same_listener(l, listener))
    }

    /// Copy of the current listeners, for delivery outside the owning lock
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.listeners.clone()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl<T: ?Sized> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
