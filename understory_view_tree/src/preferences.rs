// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Values aggregated from descendants towards the root.
//!
//! During [`Tree::commit`](crate::Tree::commit) every node merges the [`Preferences`] of its
//! children in child order and then lets its modifiers contribute, innermost first.
//! Each key supplies its own reduction through [`PreferenceKey::reduce`].

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::any::{Any, TypeId};

/// A typed key for values collected from descendants.
pub trait PreferenceKey: 'static {
    /// Value aggregated under this key.
    type Value: Clone + PartialEq + Send + Sync + 'static;

    /// Value observed when no descendant contributed.
    fn default_value() -> Self::Value;

    /// Fold `next` into `value`.
    fn reduce(value: &mut Self::Value, next: Self::Value);
}

type Erased = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct Entry {
    value: Erased,
    reduce: fn(&mut Erased, &Erased),
    eq: fn(&Erased, &Erased) -> bool,
}

impl Entry {
    fn new<K: PreferenceKey>(value: K::Value) -> Self {
        Self {
            value: Arc::new(value),
            reduce: reduce_erased::<K>,
            eq: eq_erased::<K>,
        }
    }
}

fn reduce_erased<K: PreferenceKey>(into: &mut Erased, next: &Erased) {
    let (Some(current), Some(next)) = (
        into.downcast_ref::<K::Value>(),
        next.downcast_ref::<K::Value>(),
    ) else {
        return;
    };
    let mut value = current.clone();
    K::reduce(&mut value, next.clone());
    *into = Arc::new(value);
}

fn eq_erased<K: PreferenceKey>(a: &Erased, b: &Erased) -> bool {
    match (a.downcast_ref::<K::Value>(), b.downcast_ref::<K::Value>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Reduced values collected from a subtree.
#[derive(Clone, Default)]
pub struct Preferences {
    values: BTreeMap<TypeId, Entry>,
}

impl core::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Preferences")
            .field("keys", &self.values.len())
            .finish()
    }
}

impl PartialEq for Preferences {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self.values.iter().all(|(key, entry)| {
                other
                    .values
                    .get(key)
                    .is_some_and(|theirs| (entry.eq)(&entry.value, &theirs.value))
            })
    }
}

impl Preferences {
    /// Create an empty set of preferences.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the reduced value for `K`, or its default when nothing contributed.
    pub fn get<K: PreferenceKey>(&self) -> K::Value {
        self.values
            .get(&TypeId::of::<K>())
            .and_then(|entry| entry.value.downcast_ref::<K::Value>())
            .cloned()
            .unwrap_or_else(K::default_value)
    }

    /// Fold `value` into the current value for `K`.
    pub fn contribute<K: PreferenceKey>(&mut self, value: K::Value) {
        match self.values.get_mut(&TypeId::of::<K>()) {
            Some(entry) => {
                let next: Erased = Arc::new(value);
                (entry.reduce)(&mut entry.value, &next);
            }
            None => {
                self.values.insert(TypeId::of::<K>(), Entry::new::<K>(value));
            }
        }
    }

    /// Fold every value of `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        for (key, theirs) in &other.values {
            match self.values.get_mut(key) {
                Some(entry) => (entry.reduce)(&mut entry.value, &theirs.value),
                None => {
                    self.values.insert(*key, theirs.clone());
                }
            }
        }
    }

    /// Returns `true` when nothing has been contributed.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    struct Tags;
    impl PreferenceKey for Tags {
        type Value = Vec<u8>;
        fn default_value() -> Vec<u8> {
            Vec::new()
        }
        fn reduce(value: &mut Vec<u8>, next: Vec<u8>) {
            value.extend(next);
        }
    }

    struct Max;
    impl PreferenceKey for Max {
        type Value = u32;
        fn default_value() -> u32 {
            0
        }
        fn reduce(value: &mut u32, next: u32) {
            *value = (*value).max(next);
        }
    }

    #[test]
    fn contribute_reduces_in_order() {
        let mut prefs = Preferences::new();
        assert!(prefs.get::<Tags>().is_empty());
        prefs.contribute::<Tags>(vec![1]);
        prefs.contribute::<Tags>(vec![2, 3]);
        assert_eq!(prefs.get::<Tags>(), vec![1, 2, 3]);
    }

    #[test]
    fn merge_keeps_multiset_and_compares_by_value() {
        let mut a = Preferences::new();
        a.contribute::<Tags>(vec![1]);
        a.contribute::<Max>(4);
        let mut b = Preferences::new();
        b.contribute::<Tags>(vec![1]);
        b.contribute::<Max>(9);

        let mut merged = a.clone();
        merged.merge(&b);
        assert_eq!(merged.get::<Tags>(), vec![1, 1]);
        assert_eq!(merged.get::<Max>(), 9);

        assert_ne!(a, b);
        let mut c = Preferences::new();
        c.contribute::<Max>(4);
        c.contribute::<Tags>(vec![1]);
        assert_eq!(a, c);
    }
}
