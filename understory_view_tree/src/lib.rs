// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_view_tree --heading-base-level=0

//! Understory View Tree: a host tree for declarative UI behavior.
//!
//! The view tree holds the structure of a UI and the behavior attached to it, without
//! knowing anything about rendering or layout.
//!
//! - Represents a hierarchy of nodes addressed by generational [`NodeId`]s.
//! - Threads an inherited [`Environment`] from the roots to the leaves; any node may
//!   override entries for its own subtree.
//! - Aggregates [`Preferences`] from the leaves to the roots with a reducer per key.
//! - Attaches [`Modifier`]s to nodes and drives their mount, update, and unmount hooks.
//! - Batches structural changes; [`Tree::commit`] applies them and returns [`Changes`].
//!
//! ## Where this fits
//!
//! Higher level crates build on the three primitives: an environment entry carries
//! state down, a preference carries state up, and a modifier observes both at one
//! position. `understory_hierarchy` uses them to propagate events and errors.
//!
//! ## API overview
//!
//! - [`Tree`]: node storage, structural edits, and the commit step.
//! - [`EnvironmentKey`] / [`Environment`]: typed inherited values.
//! - [`PreferenceKey`] / [`Preferences`]: typed aggregated values.
//! - [`Modifier`] / [`ModifierContext`]: behavior attached to a node.
//! - [`NodeFlags`]: mounted and dirty state of a node.
//!
//! ### Minimal usage
//!
//! ```
//! use std::sync::Arc;
//! use understory_view_tree::{Environment, EnvironmentKey, Modifier, Tree};
//!
//! struct Indent;
//! impl EnvironmentKey for Indent {
//!     type Value = usize;
//!     fn default_value() -> usize {
//!         0
//!     }
//! }
//!
//! struct Nest;
//! impl Modifier for Nest {
//!     fn environment(&self, env: &mut Environment) {
//!         env.update::<Indent>(|i| *i += 2);
//!     }
//! }
//!
//! let mut tree = Tree::new();
//! let root = tree.insert(None, vec![Arc::new(Nest)]);
//! let child = tree.insert(Some(root), vec![Arc::new(Nest)]);
//!
//! let changes = tree.commit();
//! assert_eq!(changes.mounted, vec![root, child]);
//! assert_eq!(tree.environment(child).unwrap().get::<Indent>(), 4);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod environment;
mod modifier;
mod preferences;
mod tree;
mod types;

pub use environment::{Environment, EnvironmentKey};
pub use modifier::{Modifier, ModifierContext};
pub use preferences::{PreferenceKey, Preferences};
pub use tree::Tree;
pub use types::{Changes, NodeFlags, NodeId};
