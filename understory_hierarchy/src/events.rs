// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event handler modifiers.
//!
//! [`receive`] is the primitive: the closure sees every event triggered beneath the
//! node and either handles it or lets it continue. The other constructors are built
//! on the same interceptor:
//!
//! - [`handle`] always stops propagation.
//! - [`transform`] always continues, with a replacement event.
//! - The `_of` variants only run for one event type and pass everything else through.
//!   They also record that type as handled, which `safety::triggers` checks.
//! - The `_async` variants spawn one task per event, owned by the node.
//!
//! Returning `Err` from any handler reports the error on the error channel as seen
//! from the handler's node.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use understory_view_tree::{Environment, Modifier, ModifierContext};

use crate::chain::{Body, EventStep, Interceptor, Receive};
use crate::safety::HandledEvents;
use crate::task::TaskScope;
use crate::value::{AnyError, AnyEvent, Event, TypeKey};
use crate::{ErrorChannelKey, EventChannelKey};

struct EventHandler {
    filter: Option<TypeKey>,
    body: Body<AnyEvent, EventStep>,
    scope: TaskScope,
}

impl core::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventHandler")
            .field("filter", &self.filter)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl EventHandler {
    fn sync(
        filter: Option<TypeKey>,
        body: impl Fn(AnyEvent) -> EventStep + Send + Sync + 'static,
    ) -> Arc<dyn Modifier> {
        Arc::new(Self {
            filter,
            body: Body::Sync(Arc::new(body)),
            scope: TaskScope::default(),
        })
    }

    fn spawning<F>(filter: Option<TypeKey>, body: F) -> Arc<dyn Modifier>
    where
        F: Fn(AnyEvent) -> futures::future::BoxFuture<'static, EventStep> + Send + Sync + 'static,
    {
        Arc::new(Self {
            filter,
            body: Body::Async(Arc::new(body)),
            scope: TaskScope::default(),
        })
    }
}

impl Modifier for EventHandler {
    fn environment(&self, env: &mut Environment) {
        let errors = env.get::<ErrorChannelKey>();
        let interceptor = Interceptor {
            filter: self.filter,
            body: self.body.clone(),
            scope: self.scope.clone(),
        };
        env.update::<EventChannelKey>(|channel| *channel = channel.intercept(interceptor, errors));
        if let Some(kind) = self.filter {
            env.update::<HandledEvents>(|handled| {
                handled.insert(kind);
            });
        }
    }

    fn mount(&self, _: &ModifierContext<'_>) {
        self.scope.open();
    }

    fn unmount(&self, _: &ModifierContext<'_>) {
        self.scope.close();
    }
}

fn decide(event: AnyEvent, outcome: Result<Receive, AnyError>) -> EventStep {
    match outcome {
        Ok(Receive::Handled) => EventStep::Consumed,
        Ok(Receive::NotHandled) => EventStep::Forward(event),
        Err(error) => EventStep::Fail(error),
    }
}

/// Intercept every event triggered beneath this node.
pub fn receive<F>(f: F) -> Arc<dyn Modifier>
where
    F: Fn(&AnyEvent) -> Result<Receive, AnyError> + Send + Sync + 'static,
{
    EventHandler::sync(None, move |event| {
        let outcome = f(&event);
        decide(event, outcome)
    })
}

/// Intercept events of type `E`; other events pass through.
pub fn receive_of<E, F>(f: F) -> Arc<dyn Modifier>
where
    E: Event,
    F: Fn(&E) -> Result<Receive, AnyError> + Send + Sync + 'static,
{
    EventHandler::sync(Some(TypeKey::of::<E>()), move |event| {
        let outcome = match event.downcast_ref::<E>() {
            Some(e) => f(e),
            None => Ok(Receive::NotHandled),
        };
        decide(event, outcome)
    })
}

/// Intercept every event with an asynchronous body.
///
/// The triggering call returns [`Delivery::Pending`](crate::Delivery::Pending); the
/// decision is applied when the task completes, unless the node unmounted first.
pub fn receive_async<F, Fut>(f: F) -> Arc<dyn Modifier>
where
    F: Fn(AnyEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Receive, AnyError>> + Send + 'static,
{
    EventHandler::spawning(None, move |event| {
        let work = f(event.clone());
        async move { decide(event, work.await) }.boxed()
    })
}

/// Intercept events of type `E` with an asynchronous body.
pub fn receive_of_async<E, F, Fut>(f: F) -> Arc<dyn Modifier>
where
    E: Event + Clone,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Receive, AnyError>> + Send + 'static,
{
    EventHandler::spawning(Some(TypeKey::of::<E>()), move |event| {
        let work = event.downcast_ref::<E>().cloned().map(&f);
        async move {
            let outcome = match work {
                Some(work) => work.await,
                None => Ok(Receive::NotHandled),
            };
            decide(event, outcome)
        }
        .boxed()
    })
}

/// Consume every event triggered beneath this node.
pub fn handle<F>(f: F) -> Arc<dyn Modifier>
where
    F: Fn(&AnyEvent) -> Result<(), AnyError> + Send + Sync + 'static,
{
    receive(move |event| f(event).map(|()| Receive::Handled))
}

/// Consume events of type `E`.
pub fn handle_of<E, F>(f: F) -> Arc<dyn Modifier>
where
    E: Event,
    F: Fn(&E) -> Result<(), AnyError> + Send + Sync + 'static,
{
    receive_of::<E, _>(move |event| f(event).map(|()| Receive::Handled))
}

/// Consume every event with an asynchronous body.
pub fn handle_async<F, Fut>(f: F) -> Arc<dyn Modifier>
where
    F: Fn(AnyEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AnyError>> + Send + 'static,
{
    receive_async(move |event| f(event).map(|r| r.map(|()| Receive::Handled)))
}

/// Consume events of type `E` with an asynchronous body.
pub fn handle_of_async<E, F, Fut>(f: F) -> Arc<dyn Modifier>
where
    E: Event + Clone,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AnyError>> + Send + 'static,
{
    receive_of_async::<E, _, _>(move |event| f(event).map(|r| r.map(|()| Receive::Handled)))
}

/// Replace every event with the one `f` returns; the replacement continues upward.
pub fn transform<F>(f: F) -> Arc<dyn Modifier>
where
    F: Fn(AnyEvent) -> Result<AnyEvent, AnyError> + Send + Sync + 'static,
{
    EventHandler::sync(None, move |event| match f(event) {
        Ok(next) => EventStep::Forward(next),
        Err(error) => EventStep::Fail(error),
    })
}

/// Replace events of type `E`; other events pass through unchanged.
pub fn transform_of<E, F>(f: F) -> Arc<dyn Modifier>
where
    E: Event,
    F: Fn(&E) -> Result<AnyEvent, AnyError> + Send + Sync + 'static,
{
    EventHandler::sync(Some(TypeKey::of::<E>()), move |event| {
        let Some(e) = event.downcast_ref::<E>() else {
            return EventStep::Forward(event);
        };
        match f(e) {
            Ok(next) => EventStep::Forward(next),
            Err(error) => EventStep::Fail(error),
        }
    })
}
