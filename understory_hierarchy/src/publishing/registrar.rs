// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Registrars threaded through the environment, one per event type.

use std::collections::BTreeMap;
use std::sync::Arc;

use understory_view_tree::EnvironmentKey;

use super::container::{Container, SubscriberId};
use super::publisher::PublisherId;
use crate::value::TypeKey;

/// Receives container updates from the subscribers directly beneath it.
///
/// Both operations are keyed by [`SubscriberId`] and idempotent.
pub(crate) trait Sink: Send + Sync {
    fn upsert(&self, container: Container);
    fn remove(&self, id: SubscriberId);
}

/// The nearest place a subscriber registers into.
#[derive(Clone)]
pub(crate) struct Registrar {
    /// Identity of the publisher or subscriber that installed this registrar.
    pub(crate) owner: u64,
    /// Bumped each time the owner unmounts; its registrations are gone by then.
    pub(crate) generation: u64,
    /// The publisher at the top of the chain of registrars.
    pub(crate) origin: PublisherId,
    pub(crate) sink: Arc<dyn Sink>,
}

impl core::fmt::Debug for Registrar {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registrar")
            .field("owner", &self.owner)
            .field("generation", &self.generation)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Environment key holding the visible registrar per event type.
#[derive(Debug)]
pub(crate) struct Registrars;

impl EnvironmentKey for Registrars {
    type Value = BTreeMap<TypeKey, Registrar>;
    fn default_value() -> Self::Value {
        BTreeMap::new()
    }
}
