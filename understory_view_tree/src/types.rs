// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the view tree: node identifiers and flags.

/// Identifier for a node in the tree.
///
/// This is a small, copyable handle that stays stable across commits but becomes
/// invalid when the underlying slot is reused.
/// It consists of a slot index and a generation counter.
///
/// ## Semantics
///
/// - On insert, a fresh slot is allocated with generation `1`.
/// - On remove, the slot is freed; any existing `NodeId` that pointed to that slot is now stale.
/// - On reuse of a freed slot, its generation is incremented, producing a new, distinct `NodeId`.
///
/// Use [`Tree::is_alive`](crate::Tree::is_alive) to check whether a `NodeId` still refers to a live node.
/// Stale `NodeId`s never alias a different live node because the generation must match.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}v{}", self.0, self.1)
    }
}

bitflags::bitflags! {
    /// Per-node bookkeeping flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// The node's modifiers have received `mount` and not yet `unmount`.
        const MOUNTED           = 0b0000_0001;
        /// The node's environment must be resolved again at the next commit.
        const ENVIRONMENT_DIRTY = 0b0000_0010;
    }
}

/// Summary of the lifecycle work performed by [`Tree::commit`](crate::Tree::commit).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Changes {
    /// Nodes whose modifiers were mounted, parents before children.
    pub mounted: alloc::vec::Vec<NodeId>,
    /// Already mounted nodes whose environment was resolved again.
    pub updated: alloc::vec::Vec<NodeId>,
    /// Mounted nodes whose collected preferences changed.
    pub preferences_changed: alloc::vec::Vec<NodeId>,
}

impl Changes {
    /// Returns `true` when the commit did not touch any node.
    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty() && self.updated.is_empty() && self.preferences_changed.is_empty()
    }
}
