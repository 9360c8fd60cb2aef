//! Typed per-request values that middleware hand to later stages.
//!
//! A guard that learns something about a request (for example a freshly
//! issued token) stores it here, and handlers further down the chain read it
//! back by type.
//!
//! ```
//! use bulwark_core::Extensions;
//!
//! #[derive(Debug, PartialEq)]
//! struct UserId(u64);
//!
//! let mut ext = Extensions::new();
//! ext.insert(UserId(7));
//! assert_eq!(ext.get::<UserId>(), Some(&UserId(7)));
//! assert_eq!(ext.get::<String>(), None);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Values keyed by their type. At most one value per type.
#[derive(Clone, Default)]
pub struct Extensions {
    map: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any earlier value of the same type
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.map.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    /// Remove a value and return whether one was present
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> bool {
        self.map.remove(&TypeId::of::<T>()).is_some()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Marker(&'static str);

    #[test]
    fn test_insert_replaces_same_type() {
        let mut ext = Extensions::new();
        ext.insert(Marker("first"));
        ext.insert(Marker("second"));

        assert_eq!(ext.len(), 1);
        assert_eq!(ext.get::<Marker>(), Some(&Marker("second")));
    }

    #[test]
    fn test_types_are_independent() {
        let mut ext = Extensions::new();
        ext.insert(Marker("m"));
        ext.insert(42u32);

        assert!(ext.contains::<u32>());
        assert!(ext.remove::<Marker>());
        assert!(!ext.remove::<Marker>());
        assert_eq!(ext.get::<u32>(), Some(&42));
    }

    #[test]
    fn test_clone_shares_values() {
        let mut ext = Extensions::new();
        ext.insert(Marker("shared"));
        let copy = ext.clone();
        assert_eq!(copy.get::<Marker>(), Some(&Marker("shared")));
    }
}
