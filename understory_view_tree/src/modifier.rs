// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Behavior attached to nodes.

use crate::environment::Environment;
use crate::preferences::Preferences;
use crate::types::NodeId;

/// Behavior attached to a node of a [`Tree`](crate::Tree).
///
/// A node holds an ordered list of modifiers, outermost first. Every method has a
/// no-op default so a modifier only implements the hooks it needs.
///
/// ## Ordering
///
/// - [`Modifier::environment`] runs top-down; the modifier sees the environment left
///   by its parent and by the modifiers before it on the same node.
/// - [`Modifier::preferences`] runs bottom-up; inner modifiers contribute first.
/// - [`Modifier::mount`] runs parents before children, outer modifiers first.
/// - [`Modifier::unmount`] runs children before parents, inner modifiers first.
pub trait Modifier: Send + Sync + 'static {
    /// Override inherited values for the rest of the node and its descendants.
    fn environment(&self, env: &mut Environment) {
        let _ = env;
    }

    /// Contribute values for ancestors to read.
    fn preferences(&self, prefs: &mut Preferences) {
        let _ = prefs;
    }

    /// The node joined the tree.
    fn mount(&self, cx: &ModifierContext<'_>) {
        let _ = cx;
    }

    /// The environment at this modifier was resolved again.
    fn update(&self, cx: &ModifierContext<'_>) {
        let _ = cx;
    }

    /// The preferences collected beneath this modifier changed.
    fn preferences_changed(&self, cx: &ModifierContext<'_>) {
        let _ = cx;
    }

    /// The node is leaving the tree, or this modifier was replaced.
    fn unmount(&self, cx: &ModifierContext<'_>) {
        let _ = cx;
    }
}

/// What a modifier can observe during a lifecycle hook.
#[derive(Clone, Copy, Debug)]
pub struct ModifierContext<'a> {
    pub(crate) node: NodeId,
    pub(crate) environment: &'a Environment,
    pub(crate) preferences: &'a Preferences,
}

impl<'a> ModifierContext<'a> {
    /// The node this modifier is attached to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The environment as it reaches this modifier, before its own overrides.
    pub fn environment(&self) -> &'a Environment {
        self.environment
    }

    /// Preferences collected from the node's content and inner modifiers.
    pub fn preferences(&self) -> &'a Preferences {
        self.preferences
    }
}
