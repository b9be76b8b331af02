// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_hierarchy --heading-base-level=0

//! Understory Hierarchy: typed events and errors that bubble up a view tree.
//!
//! A node in an [`understory_view_tree::Tree`] triggers an event or reports an error;
//! the value travels up through the node's ancestors until a handler consumes it, or
//! reaches the root, where events are dropped and errors fail a debug assertion.
//!
//! - [`events`] and [`errors`]: handler modifiers. Handlers can consume, pass on, or
//!   replace a value; event handlers can fail into the error channel and error
//!   handlers can recover into the event channel. Asynchronous bodies run as Tokio
//!   tasks that are cancelled when their node unmounts.
//! - [`publishing`]: the opposite direction. A publisher sends events down to the
//!   subscribers beneath it, choosing the shallowest, all, or the deepest ones.
//! - [`safety`]: development-time declarations of which types a subtree produces,
//!   checked against the handlers above it.
//! - [`alert`]: a ready-made handler presenting alertable errors.
//! - [`config`]: the safety level and related settings, inherited like everything else.
//!
//! ## How values travel
//!
//! Each handler modifier publishes a new head for the channel it intercepts in the
//! environment of its subtree. A channel is therefore an immutable list of interceptors
//! ordered nearest first, and triggering walks it from the position it was read at.
//! Siblings and ancestors never observe a handler installed beside or beneath them.
//!
//! ## Example
//!
//! ```
//! use understory_hierarchy::{AnyEvent, Delivery, Event, TreeExt, events};
//! use understory_view_tree::Tree;
//!
//! #[derive(Debug)]
//! struct Opened;
//! impl Event for Opened {}
//!
//! #[derive(Debug)]
//! struct Loaded;
//! impl Event for Loaded {}
//!
//! let mut tree = Tree::new();
//! let screen = tree.insert(None, vec![events::handle_of::<Loaded, _>(|_| Ok(()))]);
//! let loader = tree.insert(
//!     Some(screen),
//!     vec![events::transform_of::<Opened, _>(|_| Ok(AnyEvent::new(Loaded)))],
//! );
//! let button = tree.insert(Some(loader), Vec::new());
//! let _ = tree.commit();
//!
//! assert_eq!(tree.trigger_event(button, Opened), Some(Delivery::Consumed));
//! ```

pub mod alert;
pub mod config;
pub mod errors;
pub mod events;
pub mod publishing;
pub mod safety;

mod chain;
mod error;
mod sync;
mod task;
mod value;

#[cfg(test)]
mod testing;

pub use alert::{Alert, AlertHandler, AlertPresenter, AlertableError};
pub use chain::{Delivery, ErrorChannel, ErrorChannelKey, EventChannel, EventChannelKey, Receive};
pub use config::ResponderConfig;
pub use error::{ResponderError, TypeList, Violation};
pub use safety::SafetyLevel;
pub use value::{AnyError, AnyEvent, Event, TypeKey};

use understory_view_tree::{Environment, NodeId, Tree};

/// Channel access on an [`Environment`].
pub trait EnvironmentExt {
    /// The event handlers above this position.
    fn event_channel(&self) -> EventChannel;

    /// The error handlers above this position.
    fn error_channel(&self) -> ErrorChannel;

    /// Trigger `event` from this position.
    fn trigger(&self, event: impl Into<AnyEvent>) -> Delivery {
        self.event_channel().trigger(event)
    }

    /// Report `error` from this position.
    fn report(&self, error: impl Into<AnyError>) -> Delivery {
        self.error_channel().report(error)
    }

    /// Report `error` from this position, keeping its alert.
    fn report_alertable<E: AlertableError>(&self, error: E) -> Delivery {
        self.error_channel().report_alertable(error)
    }
}

impl EnvironmentExt for Environment {
    fn event_channel(&self) -> EventChannel {
        self.get::<EventChannelKey>()
    }

    fn error_channel(&self) -> ErrorChannel {
        self.get::<ErrorChannelKey>()
    }
}

/// Triggering from a node of a committed [`Tree`].
pub trait TreeExt {
    /// Trigger `event` from `node`; `None` when `node` is stale.
    fn trigger_event(&self, node: NodeId, event: impl Into<AnyEvent>) -> Option<Delivery>;

    /// Report `error` from `node`; `None` when `node` is stale.
    fn report_error(&self, node: NodeId, error: impl Into<AnyError>) -> Option<Delivery>;

    /// Report `error` from `node`, keeping its alert; `None` when `node` is stale.
    fn report_alertable<E: AlertableError>(&self, node: NodeId, error: E) -> Option<Delivery>;
}

impl TreeExt for Tree {
    fn trigger_event(&self, node: NodeId, event: impl Into<AnyEvent>) -> Option<Delivery> {
        let channel = self.environment(node)?.event_channel();
        Some(channel.trigger(event))
    }

    fn report_error(&self, node: NodeId, error: impl Into<AnyError>) -> Option<Delivery> {
        let channel = self.environment(node)?.error_channel();
        Some(channel.report(error))
    }

    fn report_alertable<E: AlertableError>(&self, node: NodeId, error: E) -> Option<Delivery> {
        let channel = self.environment(node)?.error_channel();
        Some(channel.report_alertable(error))
    }
}
