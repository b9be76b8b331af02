// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Inherited contextual values.
//!
//! ## Overview
//!
//! An [`Environment`] maps key types to values. Every node resolves its environment from
//! its parent's, and each of its modifiers may override entries for everything nested
//! inside it. Overrides never leak to siblings or ancestors because every node works on
//! its own copy; values are shared behind [`Arc`] so copies stay cheap.
//!
//! Reading a key that no ancestor has set yields [`EnvironmentKey::default_value`].

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::any::{Any, TypeId};

/// A typed key into an [`Environment`].
///
/// Keys are usually zero-sized marker types:
///
/// ```
/// use understory_view_tree::{Environment, EnvironmentKey};
///
/// struct Accent;
/// impl EnvironmentKey for Accent {
///     type Value = u32;
///     fn default_value() -> u32 {
///         0x3366ff
///     }
/// }
///
/// let mut env = Environment::new();
/// assert_eq!(env.get::<Accent>(), 0x3366ff);
/// env.set::<Accent>(0xff0000);
/// assert_eq!(env.get::<Accent>(), 0xff0000);
/// ```
pub trait EnvironmentKey: 'static {
    /// Value stored under this key.
    type Value: Clone + Send + Sync + 'static;

    /// Value observed when no enclosing node has set this key.
    fn default_value() -> Self::Value;
}

/// A snapshot of inherited values at one position in the tree.
#[derive(Clone, Default)]
pub struct Environment {
    values: BTreeMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl core::fmt::Debug for Environment {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Environment")
            .field("overrides", &self.values.len())
            .finish()
    }
}

impl Environment {
    /// Create an environment with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the nearest value for `K`, or its default.
    pub fn get<K: EnvironmentKey>(&self) -> K::Value {
        self.values
            .get(&TypeId::of::<K>())
            .and_then(|value| value.downcast_ref::<K::Value>())
            .cloned()
            .unwrap_or_else(K::default_value)
    }

    /// Returns `true` when some enclosing node has set `K`.
    pub fn contains<K: EnvironmentKey>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<K>())
    }

    /// Override `K` for everything that reads from this environment.
    pub fn set<K: EnvironmentKey>(&mut self, value: K::Value) {
        self.values.insert(TypeId::of::<K>(), Arc::new(value));
    }

    /// Override `K` with a modified copy of its current value.
    pub fn update<K: EnvironmentKey>(&mut self, f: impl FnOnce(&mut K::Value)) {
        let mut value = self.get::<K>();
        f(&mut value);
        self.set::<K>(value);
    }

    /// Drop the override for `K`, so reads fall back to the default.
    pub fn remove<K: EnvironmentKey>(&mut self) {
        self.values.remove(&TypeId::of::<K>());
    }

    /// Number of keys with an explicit value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when no key has an explicit value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    struct Label;
    impl EnvironmentKey for Label {
        type Value = String;
        fn default_value() -> String {
            String::from("none")
        }
    }

    struct Depth;
    impl EnvironmentKey for Depth {
        type Value = u32;
        fn default_value() -> u32 {
            0
        }
    }

    #[test]
    fn defaults_until_set() {
        let mut env = Environment::new();
        assert_eq!(env.get::<Label>(), "none");
        assert!(!env.contains::<Label>());
        env.set::<Label>("outer".into());
        assert_eq!(env.get::<Label>(), "outer");
        assert!(env.contains::<Label>());
        env.remove::<Label>();
        assert_eq!(env.get::<Label>(), "none");
    }

    #[test]
    fn copies_do_not_observe_later_overrides() {
        let mut outer = Environment::new();
        outer.set::<Depth>(1);
        let mut inner = outer.clone();
        inner.update::<Depth>(|d| *d += 1);
        assert_eq!(outer.get::<Depth>(), 1);
        assert_eq!(inner.get::<Depth>(), 2);
        assert_eq!(inner.len(), 1);
    }
}
