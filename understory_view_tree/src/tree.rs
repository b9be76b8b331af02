// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: structure, environment resolution, preferences, lifecycles.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::environment::Environment;
use crate::modifier::{Modifier, ModifierContext};
use crate::preferences::Preferences;
use crate::types::{Changes, NodeFlags, NodeId};

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

/// Top-level view tree.
pub struct Tree {
    nodes: Vec<Option<Node>>, // slots
    generations: Vec<u32>,    // last generation per slot (persists across frees)
    pub(crate) free_list: Vec<usize>,
    pub(crate) epoch: u64,
    root_environment: Environment,
}

impl core::fmt::Debug for Tree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        let free = self.free_list.len();
        f.debug_struct("Tree")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &free)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

pub(crate) struct Node {
    generation: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Outermost first.
    modifiers: Vec<Arc<dyn Modifier>>,
    /// Environment reaching each modifier, parallel to `modifiers`.
    positions: Vec<Environment>,
    /// Environment seen by the content and the children.
    inner: Environment,
    /// Preferences reaching each modifier, parallel to `modifiers`.
    collected: Vec<Preferences>,
    /// Preferences handed to the parent.
    preferences: Preferences,
    flags: NodeFlags,
}

impl Node {
    fn new(generation: u32, modifiers: Vec<Arc<dyn Modifier>>) -> Self {
        Self {
            generation,
            parent: None,
            children: Vec::new(),
            modifiers,
            positions: Vec::new(),
            inner: Environment::new(),
            collected: Vec::new(),
            preferences: Preferences::new(),
            flags: NodeFlags::ENVIRONMENT_DIRTY,
        }
    }

    fn cx(&self, id: NodeId, i: usize) -> Option<ModifierContext<'_>> {
        Some(ModifierContext {
            node: id,
            environment: self.positions.get(i)?,
            preferences: self.collected.get(i)?,
        })
    }

    fn unmount_modifiers(&mut self, id: NodeId) {
        if !self.flags.contains(NodeFlags::MOUNTED) {
            return;
        }
        for (i, modifier) in self.modifiers.iter().enumerate().rev() {
            if let Some(cx) = self.cx(id, i) {
                modifier.unmount(&cx);
            }
        }
        self.flags.remove(NodeFlags::MOUNTED);
    }
}

impl Tree {
    /// Create a new empty tree with an empty root environment.
    pub fn new() -> Self {
        Self::with_environment(Environment::new())
    }

    /// Create a new empty tree whose roots inherit `root_environment`.
    pub fn with_environment(root_environment: Environment) -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            epoch: 0,
            root_environment,
        }
    }

    /// The environment every root inherits.
    pub fn root_environment(&self) -> &Environment {
        &self.root_environment
    }

    /// Replace the environment every root inherits.
    ///
    /// Every node is resolved again at the next [`Tree::commit`].
    pub fn set_root_environment(&mut self, env: Environment) {
        self.root_environment = env;
        for n in self.nodes.iter_mut().flatten() {
            if n.parent.is_none() {
                n.flags.insert(NodeFlags::ENVIRONMENT_DIRTY);
            }
        }
    }

    /// Insert a new node as a child of `parent` (or as a root if `None`).
    ///
    /// The node's modifiers are mounted at the next [`Tree::commit`].
    pub fn insert(
        &mut self,
        parent: Option<NodeId>,
        modifiers: Vec<Arc<dyn Modifier>>,
    ) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, modifiers));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, modifiers)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        let id = NodeId::new(idx, generation);
        if let Some(p) = parent.filter(|p| self.is_alive(*p)) {
            self.link_parent(id, p);
        }
        id
    }

    /// Remove a node (and its subtree) from the tree.
    ///
    /// Modifiers are unmounted immediately: children before parents, inner modifiers first.
    pub fn remove(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        if let Some(parent) = self.node(id).and_then(|n| n.parent) {
            self.unlink_parent(id, parent);
        }
        self.remove_subtree(id);
    }

    fn remove_subtree(&mut self, id: NodeId) {
        let children = self.node(id).map(|n| n.children.clone()).unwrap_or_default();
        for child in children {
            self.remove_subtree(child);
        }
        if let Some(mut node) = self.nodes[id.idx()].take() {
            node.unmount_modifiers(id);
            self.free_list.push(id.idx());
        }
    }

    /// Reparent `id` under `new_parent`.
    ///
    /// The subtree keeps its mounted state and is resolved again at the next commit.
    pub fn reparent(&mut self, id: NodeId, new_parent: Option<NodeId>) {
        if !self.is_alive(id) || new_parent.is_some_and(|p| !self.is_alive(p)) {
            return;
        }
        if new_parent.is_some_and(|p| self.path_to_root(p).contains(&id)) {
            // Would create a cycle.
            return;
        }
        if let Some(parent) = self.node(id).and_then(|n| n.parent) {
            self.unlink_parent(id, parent);
        }
        if let Some(p) = new_parent {
            self.link_parent(id, p);
        }
        self.invalidate(id);
    }

    /// Replace the modifiers of `id`.
    ///
    /// The old modifiers are unmounted now; the new ones mount at the next commit
    /// and descendants observe the new environment.
    pub fn set_modifiers(&mut self, id: NodeId, modifiers: Vec<Arc<dyn Modifier>>) {
        if let Some(n) = self.node_opt_mut(id) {
            n.unmount_modifiers(id);
            n.modifiers = modifiers;
            n.positions.clear();
            n.collected.clear();
            n.flags.insert(NodeFlags::ENVIRONMENT_DIRTY);
        }
    }

    /// Request that `id` and its descendants resolve their environment again.
    ///
    /// Mounted modifiers in the subtree receive [`Modifier::update`] at the next commit.
    pub fn invalidate(&mut self, id: NodeId) {
        if let Some(n) = self.node_opt_mut(id) {
            n.flags.insert(NodeFlags::ENVIRONMENT_DIRTY);
        }
    }

    /// Run the batched update and return a summary of the lifecycle work.
    ///
    /// 1. Broadcast: dirty subtrees resolve their environment top-down.
    /// 2. Collect: preferences are merged bottom-up.
    /// 3. Lifecycle: new nodes mount, re-resolved nodes update, and nodes whose
    ///    collected preferences changed are notified.
    pub fn commit(&mut self) -> Changes {
        self.epoch = self.epoch.wrapping_add(1);
        let roots = self.roots();

        let mut resolved = Vec::new();
        for &root in &roots {
            let env = self.root_environment.clone();
            self.broadcast(root, &env, false, &mut resolved);
        }

        let mut changed = Vec::new();
        for &root in &roots {
            self.collect(root, &mut changed);
        }

        let mut changes = Changes::default();
        for &root in &roots {
            self.lifecycle(root, &resolved, &changed, &mut changes);
        }
        changes
    }

    fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| match n {
                Some(n) if n.parent.is_none() =>
                {
                    #[allow(
                        clippy::cast_possible_truncation,
                        reason = "NodeId uses 32-bit indices by design."
                    )]
                    Some(NodeId::new(i as u32, n.generation))
                }
                _ => None,
            })
            .collect()
    }

    fn broadcast(
        &mut self,
        id: NodeId,
        inherited: &Environment,
        force: bool,
        resolved: &mut Vec<NodeId>,
    ) {
        let Some(node) = self.node_opt_mut(id) else {
            return;
        };
        let dirty = force || node.flags.contains(NodeFlags::ENVIRONMENT_DIRTY);
        if dirty {
            let mut env = inherited.clone();
            let mut positions = Vec::with_capacity(node.modifiers.len());
            for modifier in &node.modifiers {
                positions.push(env.clone());
                modifier.environment(&mut env);
            }
            node.positions = positions;
            node.inner = env;
            node.flags.remove(NodeFlags::ENVIRONMENT_DIRTY);
            resolved.push(id);
        }
        let inner = node.inner.clone();
        let children = node.children.clone();
        for child in children {
            self.broadcast(child, &inner, dirty, resolved);
        }
    }

    fn collect(&mut self, id: NodeId, changed: &mut Vec<NodeId>) {
        let children = self.node(id).map(|n| n.children.clone()).unwrap_or_default();
        for &child in &children {
            self.collect(child, changed);
        }
        let mut prefs = Preferences::new();
        for child in children {
            if let Some(c) = self.node(child) {
                prefs.merge(&c.preferences);
            }
        }
        let Some(node) = self.node_opt_mut(id) else {
            return;
        };
        let mut collected = Vec::with_capacity(node.modifiers.len());
        for modifier in node.modifiers.iter().rev() {
            collected.push(prefs.clone());
            modifier.preferences(&mut prefs);
        }
        collected.reverse();
        if node.collected != collected {
            changed.push(id);
        }
        node.collected = collected;
        node.preferences = prefs;
    }

    fn lifecycle(
        &mut self,
        id: NodeId,
        resolved: &[NodeId],
        changed: &[NodeId],
        changes: &mut Changes,
    ) {
        let Some(node) = self.node_opt_mut(id) else {
            return;
        };
        if !node.flags.contains(NodeFlags::MOUNTED) {
            for (i, modifier) in node.modifiers.iter().enumerate() {
                if let Some(cx) = node.cx(id, i) {
                    modifier.mount(&cx);
                }
            }
            node.flags.insert(NodeFlags::MOUNTED);
            changes.mounted.push(id);
        } else {
            if resolved.contains(&id) {
                for (i, modifier) in node.modifiers.iter().enumerate() {
                    if let Some(cx) = node.cx(id, i) {
                        modifier.update(&cx);
                    }
                }
                changes.updated.push(id);
            }
            if changed.contains(&id) {
                for (i, modifier) in node.modifiers.iter().enumerate() {
                    if let Some(cx) = node.cx(id, i) {
                        modifier.preferences_changed(&cx);
                    }
                }
                changes.preferences_changed.push(id);
            }
        }
        let children = node.children.clone();
        for child in children {
            self.lifecycle(child, resolved, changed, changes);
        }
    }

    /// Environment seen by the content and children of `id`, as of the last commit.
    pub fn environment(&self, id: NodeId) -> Option<&Environment> {
        self.node(id).map(|n| &n.inner)
    }

    /// Preferences `id` hands to its parent, as of the last commit.
    pub fn preferences(&self, id: NodeId) -> Option<&Preferences> {
        self.node(id).map(|n| &n.preferences)
    }

    /// Flags of `id`, or `None` when `id` is stale.
    pub fn flags(&self, id: NodeId) -> Option<NodeFlags> {
        self.node(id).map(|n| n.flags)
    }

    /// Parent of `id`, or `None` for roots and stale ids.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Children of `id` in insertion order.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Path from the root to `id` (inclusive); empty when `id` is stale.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut cur = Some(id).filter(|id| self.is_alive(*id));
        while let Some(n) = cur {
            path.push(n);
            cur = self.parent_of(n);
        }
        path.reverse();
        path
    }

    /// Number of ancestors of `id`.
    pub fn depth(&self, id: NodeId) -> Option<usize> {
        self.is_alive(id).then(|| self.path_to_root(id).len() - 1)
    }

    /// Returns `true` if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .is_some_and(|n| n.generation == id.1)
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .filter(|n| n.generation == id.1)
    }

    fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes
            .get_mut(id.idx())
            .and_then(|n| n.as_mut())
            .filter(|n| n.generation == id.1)
    }

    fn link_parent(&mut self, id: NodeId, parent: NodeId) {
        if let Some(p) = self.node_opt_mut(parent) {
            p.children.push(id);
        }
        if let Some(n) = self.node_opt_mut(id) {
            n.parent = Some(parent);
        }
    }

    fn unlink_parent(&mut self, id: NodeId, parent: NodeId) {
        if let Some(p) = self.node_opt_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        if let Some(n) = self.node_opt_mut(id) {
            n.parent = None;
        }
    }
}
