// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::marker::PhantomData;
use core::panic::Location;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;
use understory_view_tree::{Environment, Modifier, ModifierContext};

use super::Destination;
use super::container::{Container, Endpoint, SubscriberId, next_id, select};
use super::registrar::{Registrar, Registrars, Sink};
use crate::config::ConfigKey;
use crate::error::Violation;
use crate::sync::lock;
use crate::value::{AnyEvent, Event, TypeKey};

/// Identity of a publisher modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublisherId(pub(crate) u64);

/// Sends events of type `E` to the subscribers a [`Publisher`] selected.
///
/// A new value is handed out whenever the selection changes; older values keep
/// working, but endpoints of unmounted subscribers ignore what they receive.
pub struct EventPublisher<E> {
    id: PublisherId,
    targets: Arc<[(SubscriberId, Endpoint)]>,
    _marker: PhantomData<fn(E)>,
}

impl<E> Clone for EventPublisher<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            targets: Arc::clone(&self.targets),
            _marker: PhantomData,
        }
    }
}

impl<E> core::fmt::Debug for EventPublisher<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("id", &self.id)
            .field("subscribers", &self.subscribers().collect::<Vec<_>>())
            .finish()
    }
}

impl<E> EventPublisher<E> {
    /// The publisher this came from.
    pub fn id(&self) -> PublisherId {
        self.id
    }

    /// Number of subscribers that receive each event.
    pub fn subscriber_count(&self) -> usize {
        self.targets.len()
    }

    /// The subscribers that receive each event.
    pub fn subscribers(&self) -> impl Iterator<Item = SubscriberId> + '_ {
        self.targets.iter().map(|(id, _)| *id)
    }
}

impl<E: Event> EventPublisher<E> {
    /// Deliver `event` to every selected subscriber.
    pub fn publish(&self, event: E) {
        let event = AnyEvent::new(event);
        trace!(kind = %event.kind(), subscribers = self.targets.len(), "publishing");
        for (_, endpoint) in self.targets.iter() {
            endpoint(&event);
        }
    }
}

type OnReady<E> = Box<dyn Fn(Option<EventPublisher<E>>) + Send + Sync>;

/// Modifier that collects subscribers for `E` beneath it; see [`publisher`].
pub struct Publisher<E> {
    state: Arc<PublisherState<E>>,
}

struct PublisherState<E> {
    id: PublisherId,
    kind: TypeKey,
    location: &'static Location<'static>,
    on_ready: OnReady<E>,
    generation: AtomicU64,
    inner: Mutex<PublisherInner>,
}

struct PublisherInner {
    containers: BTreeMap<SubscriberId, Container>,
    destination: Destination,
    selection: Vec<SubscriberId>,
    mounted: bool,
    /// Origin of an enclosing publisher for the same type, once reported.
    enclosing: Option<PublisherId>,
}

impl<E> core::fmt::Debug for Publisher<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = lock(&self.state.inner);
        f.debug_struct("Publisher")
            .field("id", &self.state.id)
            .field("kind", &self.state.kind)
            .field("destination", &inner.destination)
            .field("selection", &inner.selection)
            .finish_non_exhaustive()
    }
}

/// Collect the subscribers for `E` declared beneath this node.
///
/// `on_ready` receives an [`EventPublisher`] whenever the selected subscribers change,
/// and `None` when the selection becomes empty or the publisher unmounts.
#[track_caller]
pub fn publisher<E: Event>(
    destination: Destination,
    on_ready: impl Fn(Option<EventPublisher<E>>) + Send + Sync + 'static,
) -> Arc<Publisher<E>> {
    Arc::new(Publisher {
        state: Arc::new(PublisherState {
            id: PublisherId(next_id()),
            kind: TypeKey::of::<E>(),
            location: Location::caller(),
            on_ready: Box::new(on_ready),
            generation: AtomicU64::new(0),
            inner: Mutex::new(PublisherInner {
                containers: BTreeMap::new(),
                destination,
                selection: Vec::new(),
                mounted: false,
                enclosing: None,
            }),
        }),
    })
}

impl<E: Event> Publisher<E> {
    /// Identity of this publisher.
    pub fn id(&self) -> PublisherId {
        self.state.id
    }

    /// The current destination policy.
    pub fn destination(&self) -> Destination {
        lock(&self.state.inner).destination
    }

    /// Change the destination policy and select subscribers again.
    pub fn set_destination(&self, destination: Destination) {
        lock(&self.state.inner).destination = destination;
        self.state.refresh();
    }
}

impl<E: Event> PublisherState<E> {
    fn refresh(&self) {
        let ready = {
            let mut inner = lock(&self.inner);
            if !inner.mounted {
                return;
            }
            let targets = select(&inner.containers, inner.destination);
            let ids: Vec<SubscriberId> = targets.iter().map(|(id, _)| *id).collect();
            if ids == inner.selection {
                return;
            }
            inner.selection = ids;
            (!targets.is_empty()).then(|| EventPublisher {
                id: self.id,
                targets: targets.into(),
                _marker: PhantomData,
            })
        };
        trace!(
            kind = %self.kind,
            subscribers = ready.as_ref().map_or(0, EventPublisher::subscriber_count),
            "publisher ready"
        );
        (self.on_ready)(ready);
    }

    fn check_enclosing(&self, cx: &ModifierContext<'_>) {
        let env = cx.environment();
        let enclosing = env.get::<Registrars>().get(&self.kind).map(|r| r.origin);
        let offending = {
            let mut inner = lock(&self.inner);
            let changed = inner.enclosing != enclosing;
            inner.enclosing = enclosing;
            changed && enclosing.is_some()
        };
        if offending {
            env.get::<ConfigKey>()
                .safety_level
                .report(&Violation::DuplicatePublisher {
                    kind: self.kind,
                    location: self.location,
                });
        }
    }
}

impl<E: Event> Sink for PublisherState<E> {
    fn upsert(&self, container: Container) {
        lock(&self.inner).containers.insert(container.id, container);
        self.refresh();
    }

    fn remove(&self, id: SubscriberId) {
        let removed = lock(&self.inner).containers.remove(&id);
        if removed.is_some() {
            self.refresh();
        }
    }
}

impl<E: Event> Modifier for Publisher<E> {
    fn environment(&self, env: &mut Environment) {
        let registrar = Registrar {
            owner: self.state.id.0,
            generation: self.state.generation.load(Ordering::Acquire),
            origin: self.state.id,
            sink: self.state.clone(),
        };
        env.update::<Registrars>(|registrars| {
            registrars.insert(self.state.kind, registrar);
        });
    }

    fn mount(&self, cx: &ModifierContext<'_>) {
        lock(&self.state.inner).mounted = true;
        self.state.check_enclosing(cx);
        self.state.refresh();
    }

    fn update(&self, cx: &ModifierContext<'_>) {
        self.state.check_enclosing(cx);
    }

    fn unmount(&self, _: &ModifierContext<'_>) {
        self.state.generation.fetch_add(1, Ordering::AcqRel);
        let had_selection = {
            let mut inner = lock(&self.state.inner);
            inner.mounted = false;
            inner.enclosing = None;
            inner.containers.clear();
            !core::mem::take(&mut inner.selection).is_empty()
        };
        if had_selection {
            (self.state.on_ready)(None);
        }
    }
}
