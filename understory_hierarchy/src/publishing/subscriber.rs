// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::panic::Location;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;
use understory_view_tree::{Environment, Modifier, ModifierContext};

use super::container::{Container, Endpoint, SubscriberId, next_id};
use super::registrar::{Registrar, Registrars, Sink};
use crate::config::ConfigKey;
use crate::error::Violation;
use crate::sync::lock;
use crate::value::{AnyEvent, Event, TypeKey};

struct Subscriber {
    state: Arc<SubscriberState>,
}

struct SubscriberState {
    id: SubscriberId,
    kind: TypeKey,
    location: &'static Location<'static>,
    endpoint: Endpoint,
    alive: Arc<AtomicBool>,
    generation: AtomicU64,
    inner: Mutex<SubscriberInner>,
}

#[derive(Default)]
struct SubscriberInner {
    children: BTreeMap<SubscriberId, Container>,
    parent: Option<Registrar>,
    mounted: bool,
}

impl core::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.state.id)
            .field("kind", &self.state.kind)
            .finish_non_exhaustive()
    }
}

/// Receive events of type `E` published by the nearest [`publisher`](super::publisher)
/// above this node.
///
/// Subscribers nested beneath this one register into it, which is what gives
/// [`Destination::LastSubscriber`](super::Destination::LastSubscriber) its depth.
#[track_caller]
pub fn subscribe<E: Event>(handler: impl Fn(&E) + Send + Sync + 'static) -> Arc<dyn Modifier> {
    let alive = Arc::new(AtomicBool::new(false));
    let live = Arc::clone(&alive);
    let endpoint: Endpoint = Arc::new(move |event: &AnyEvent| {
        if !live.load(Ordering::Acquire) {
            return;
        }
        if let Some(event) = event.downcast_ref::<E>() {
            handler(event);
        }
    });
    Arc::new(Subscriber {
        state: Arc::new(SubscriberState {
            id: SubscriberId(next_id()),
            kind: TypeKey::of::<E>(),
            location: Location::caller(),
            endpoint,
            alive,
            generation: AtomicU64::new(0),
            inner: Mutex::new(SubscriberInner::default()),
        }),
    })
}

impl SubscriberState {
    fn container(&self, inner: &SubscriberInner) -> Container {
        Container {
            id: self.id,
            endpoint: Arc::clone(&self.endpoint),
            children: inner.children.clone(),
        }
    }

    /// Register with the registrar visible at this position, if it changed.
    ///
    /// A registrar whose owner remounted since the last registration counts as changed:
    /// the owner dropped its containers when it unmounted.
    fn attach(&self, cx: &ModifierContext<'_>) {
        let env = cx.environment();
        let parent = env.get::<Registrars>().get(&self.kind).cloned();
        let (previous, container) = {
            let mut inner = lock(&self.inner);
            let unchanged = match (&inner.parent, &parent) {
                (Some(old), Some(new)) => {
                    old.owner == new.owner && old.generation == new.generation
                }
                (None, None) => inner.mounted,
                _ => false,
            };
            if unchanged {
                return;
            }
            inner.mounted = true;
            let previous = core::mem::replace(&mut inner.parent, parent.clone());
            (previous, self.container(&inner))
        };
        self.alive.store(true, Ordering::Release);
        if let Some(previous) = previous {
            previous.sink.remove(self.id);
        }
        match parent {
            Some(parent) => {
                trace!(kind = %self.kind, id = ?self.id, origin = ?parent.origin, "subscribing");
                parent.sink.upsert(container);
            }
            None => env
                .get::<ConfigKey>()
                .safety_level
                .report(&Violation::MissingPublisher {
                    kind: self.kind,
                    location: self.location,
                }),
        }
    }

    fn detach(&self) {
        self.alive.store(false, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        let parent = {
            let mut inner = lock(&self.inner);
            inner.mounted = false;
            inner.children.clear();
            inner.parent.take()
        };
        if let Some(parent) = parent {
            trace!(kind = %self.kind, id = ?self.id, "unsubscribing");
            parent.sink.remove(self.id);
        }
    }

    /// Forward the current container to the parent registrar, if attached.
    fn propagate(&self, inner: &SubscriberInner) -> Option<(Registrar, Container)> {
        let parent = inner.parent.clone().filter(|_| inner.mounted)?;
        Some((parent, self.container(inner)))
    }
}

impl Sink for SubscriberState {
    fn upsert(&self, container: Container) {
        let forward = {
            let mut inner = lock(&self.inner);
            inner.children.insert(container.id, container);
            self.propagate(&inner)
        };
        if let Some((parent, container)) = forward {
            parent.sink.upsert(container);
        }
    }

    fn remove(&self, id: SubscriberId) {
        let forward = {
            let mut inner = lock(&self.inner);
            if inner.children.remove(&id).is_none() {
                return;
            }
            self.propagate(&inner)
        };
        if let Some((parent, container)) = forward {
            parent.sink.upsert(container);
        }
    }
}

impl Modifier for Subscriber {
    fn environment(&self, env: &mut Environment) {
        let kind = self.state.kind;
        let Some(origin) = env.get::<Registrars>().get(&kind).map(|r| r.origin) else {
            return;
        };
        let registrar = Registrar {
            owner: self.state.id.0,
            generation: self.state.generation.load(Ordering::Acquire),
            origin,
            sink: self.state.clone(),
        };
        env.update::<Registrars>(|registrars| {
            registrars.insert(kind, registrar);
        });
    }

    fn mount(&self, cx: &ModifierContext<'_>) {
        self.state.attach(cx);
    }

    fn update(&self, cx: &ModifierContext<'_>) {
        self.state.attach(cx);
    }

    fn unmount(&self, _: &ModifierContext<'_>) {
        self.state.detach();
    }
}
