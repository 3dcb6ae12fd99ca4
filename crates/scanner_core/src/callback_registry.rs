//! Callback registry for store change subscriptions.
//!
//! This module provides a thread-safe registry for managing event callbacks.
//! The document store uses it to deliver each saved
//! [`StoreChanges`](crate::changes::StoreChanges) snapshot to its subscribers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// A unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback function type for events of type `E`.
///
/// Callbacks receive a reference to the event and should not block for extended periods.
pub type EventCallback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Thread-safe registry for managing event subscriptions.
///
/// The registry supports:
/// - Subscribing to events with unique IDs
/// - Unsubscribing by ID
/// - Emitting events to all active subscribers, in subscription order
///
/// # Example
///
/// ```ignore
/// use scanner_core::callback_registry::CallbackRegistry;
/// use std::sync::Arc;
///
/// let registry: CallbackRegistry<String> = CallbackRegistry::new();
///
/// let id = registry.subscribe(Arc::new(|event| {
///     println!("Event: {}", event);
/// }));
///
/// registry.emit(&"saved".to_string());
///
/// registry.unsubscribe(id);
/// ```
pub struct CallbackRegistry<E> {
    /// Map of subscription IDs to callbacks.
    callbacks: RwLock<BTreeMap<SubscriptionId, EventCallback<E>>>,
    /// Counter for generating unique subscription IDs.
    next_id: AtomicU64,
}

impl<E> CallbackRegistry<E> {
    /// Create a new empty callback registry.
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to events.
    ///
    /// Returns a subscription ID that can be used to unsubscribe later.
    pub fn subscribe(&self, callback: EventCallback<E>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut callbacks = self.callbacks.write().unwrap();
        callbacks.insert(id, callback);
        id
    }

    /// Unsubscribe from events.
    ///
    /// Returns `true` if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.write().unwrap();
        callbacks.remove(&id).is_some()
    }

    /// Emit an event to all registered callbacks.
    ///
    /// Callbacks are invoked synchronously in subscription order.
    /// If a callback panics, it does not affect other callbacks.
    pub fn emit(&self, event: &E) {
        // Snapshot the callbacks so a subscriber may unsubscribe from inside its callback
        let callbacks: Vec<EventCallback<E>> =
            self.callbacks.read().unwrap().values().cloned().collect();
        for callback in callbacks {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(event);
            }));
            if result.is_err() {
                log::error!("Change subscriber panicked; continuing with remaining subscribers");
            }
        }
    }

    /// Get the number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let callbacks = self.callbacks.read().unwrap();
        callbacks.len()
    }

    /// Clear all subscriptions.
    pub fn clear(&self) {
        let mut callbacks = self.callbacks.write().unwrap();
        callbacks.clear();
    }
}

impl<E> Default for CallbackRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for CallbackRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let callbacks = self.callbacks.read().unwrap();
        f.debug_struct("CallbackRegistry")
            .field("subscriber_count", &callbacks.len())
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .finish()
    }
}
