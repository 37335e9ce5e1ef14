//! Open, name-keyed factory registries.
//!
//! The tag and ISUPPORT registries share this registration core: a mapping
//! from a name to a factory that builds a typed value from `(name, raw
//! value)`. Registration is an explicit runtime API so callers can add
//! decoders for server-specific names; unknown names return `None` and the
//! caller takes its generic fallback path.
//!
//! Registries are mutated rarely (at setup time) and read often, so the
//! map sits behind a read-write lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// A factory building a typed value from a name and optional raw value.
pub type Factory<V, E> = Arc<dyn Fn(&str, Option<&str>) -> Result<V, E> + Send + Sync>;

/// Name-keyed factory table with runtime registration.
pub struct FactoryRegistry<V, E> {
    factories: RwLock<HashMap<String, Factory<V, E>>>,
}

impl<V, E> FactoryRegistry<V, E> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Register a factory under `name`, replacing any previous one.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&str, Option<&str>) -> Result<V, E> + Send + Sync + 'static,
    {
        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());
        factories.insert(name.into(), Arc::new(factory));
    }

    /// Remove the factory registered under `name`.
    ///
    /// Returns whether a factory was present.
    pub fn unregister(&self, name: &str) -> bool {
        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());
        factories.remove(name).is_some()
    }

    /// Whether a factory is registered under `name`.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        factories.contains_key(name)
    }

    /// Names with registered factories, in no particular order.
    #[must_use]
    pub fn registered_names(&self) -> Vec<String> {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        factories.keys().cloned().collect()
    }

    /// Invoke the factory for `name`, if one is registered.
    ///
    /// `None` means no factory is registered; `Some(Err(_))` means the
    /// factory rejected the value. The caller decides the fallback.
    pub fn create(&self, name: &str, raw: Option<&str>) -> Option<Result<V, E>> {
        let factory = {
            let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
            factories.get(name).cloned()
        };
        factory.map(|f| f(name, raw))
    }
}

impl<V, E> Default for FactoryRegistry<V, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> fmt::Debug for FactoryRegistry<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.registered_names();
        names.sort();
        f.debug_struct("FactoryRegistry")
            .field("names", &names)
            .finish()
    }
}
