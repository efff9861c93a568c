//! Registry of named handlers for server-to-client invocations.
//!
//! The hub pushes invocations by target name; callers subscribe with
//! `on(name, handler)`. Several handlers may share a name and are invoked in
//! the order they were registered. The registry belongs to a connection and
//! outlives every transport link, so subscriptions survive reconnects.

use hashbrown::HashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A handler invoked with the arguments of a server invocation.
pub type Handler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Thread-safe mapping from invocation target to its ordered handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Vec<Handler>>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for invocations of `target`.
    pub fn register<F>(&self, target: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(target.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Removes every handler registered for `target`, returning how many were removed.
    pub fn remove(&self, target: &str) -> usize {
        self.handlers
            .write()
            .remove(target)
            .map(|handlers| handlers.len())
            .unwrap_or(0)
    }

    /// Invokes every handler registered for `target` with `arguments`.
    ///
    /// Returns the number of handlers invoked. The lock is not held while
    /// handlers run, so a handler may register further handlers. A panicking
    /// handler does not prevent the others from running.
    pub fn dispatch(&self, target: &str, arguments: &[Value]) -> usize {
        let handlers = match self.handlers.read().get(target) {
            Some(handlers) => handlers.clone(),
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(target_name = target, "no handler registered for invocation");
                return 0;
            }
        };

        for handler in &handlers {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(arguments);
            }));

            if outcome.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(target_name = target, "invocation handler panicked");
            }
        }

        handlers.len()
    }

    /// Returns true if at least one handler is registered for `target`.
    pub fn contains(&self, target: &str) -> bool {
        self.handlers
            .read()
            .get(target)
            .is_some_and(|handlers| !handlers.is_empty())
    }

    /// Returns the number of handlers registered for `target`.
    pub fn handler_count(&self, target: &str) -> usize {
        self.handlers.read().get(target).map_or(0, Vec::len)
    }

    /// Returns the number of distinct targets with handlers.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Returns true if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let mut targets: Vec<_> = handlers.keys().cloned().collect();
        targets.sort();
        f.debug_struct("HandlerRegistry")
            .field("targets", &targets)
            .finish()
    }
}
