use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

/// Handle returned when registering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A shareable listener callback.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// An ordered set of listeners for events of type `T`.
///
/// Listeners are called in registration order. The lock is released before
/// any listener runs, so a listener may register or remove listeners.
pub struct ListenerRegistry<T: ?Sized> {
    listeners: RwLock<Vec<(ListenerId, Listener<T>)>>,
}

impl<T: ?Sized> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ListenerRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

impl<T: ?Sized> ListenerRegistry<T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn add<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.add_shared(Arc::new(listener))
    }

    /// Register an already shared listener.
    pub fn add_shared(&self, listener: Listener<T>) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.write().push((id, listener));
        id
    }

    /// Remove a listener. Returns `false` if the id is unknown.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Invoke every listener with `event`.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// still run.
    pub fn notify(&self, event: &T) {
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!(listener = %id, "Listener panicked");
            }
        }
    }
}
