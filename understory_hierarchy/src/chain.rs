// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The two upward channels and their handler chains.
//!
//! ## Overview
//!
//! A channel is an immutable singly linked list of interceptors, nearest first. A node
//! that handles events does not mutate the list it inherits; it publishes a new head
//! whose `next` is the inherited one, so siblings and ancestors keep seeing the old list.
//!
//! ## Dispatch
//!
//! [`EventChannel::trigger`] walks the list it was called on:
//!
//! - An interceptor whose type filter does not match, or whose node has unmounted,
//!   is skipped without running user code.
//! - A consumed value stops the walk.
//! - A forwarded value, original or replacement, continues at the next interceptor.
//! - A failed event handler reports its error on the error channel captured at its
//!   position. A recovering error handler triggers its event on the event channel
//!   captured at its position.
//! - An asynchronous interceptor ends the synchronous walk; its task resumes the walk
//!   from the same place once it completes, unless its node unmounted meanwhile.
//!
//! Values that reach the end of the list hit the channel's root default: events are
//! dropped with a debug log, errors are logged and fail a debug assertion.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, error, trace};
use understory_view_tree::EnvironmentKey;

use crate::alert::AlertableError;
use crate::task::TaskScope;
use crate::value::{AnyError, AnyEvent, TypeKey};

/// Decision of a handler that may decline a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Receive {
    /// The value was dealt with; propagation stops.
    Handled,
    /// The value continues to the next ancestor.
    NotHandled,
}

/// How a synchronous trigger ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// A handler consumed the value.
    Consumed,
    /// An asynchronous handler took over; the outcome is decided later.
    Pending,
    /// An event handler failed and its error went to the error channel.
    Redirected,
    /// An error handler recovered and its event went to the event channel.
    Recovered,
    /// The value reached the channel's root default.
    Unhandled,
}

pub(crate) enum EventStep {
    Consumed,
    Forward(AnyEvent),
    Fail(AnyError),
}

pub(crate) enum ErrorStep {
    Consumed,
    Forward(AnyError),
    Recover(AnyEvent),
}

pub(crate) type SyncBody<V, S> = Arc<dyn Fn(V) -> S + Send + Sync>;
pub(crate) type AsyncBody<V, S> = Arc<dyn Fn(V) -> BoxFuture<'static, S> + Send + Sync>;

pub(crate) enum Body<V, S> {
    Sync(SyncBody<V, S>),
    Async(AsyncBody<V, S>),
}

impl<V, S> Clone for Body<V, S> {
    fn clone(&self) -> Self {
        match self {
            Self::Sync(f) => Self::Sync(Arc::clone(f)),
            Self::Async(f) => Self::Async(Arc::clone(f)),
        }
    }
}

pub(crate) struct Interceptor<V, S> {
    pub(crate) filter: Option<TypeKey>,
    pub(crate) body: Body<V, S>,
    pub(crate) scope: TaskScope,
}

impl<V, S> Interceptor<V, S> {
    fn accepts(&self, kind: TypeKey) -> bool {
        self.filter.is_none_or(|filter| filter == kind) && !self.scope.is_closed()
    }
}

struct EventLink {
    interceptor: Interceptor<AnyEvent, EventStep>,
    errors: ErrorChannel,
    next: EventChannel,
}

struct ErrorLink {
    interceptor: Interceptor<AnyError, ErrorStep>,
    events: EventChannel,
    next: ErrorChannel,
}

/// The event handlers above one position, nearest first.
#[derive(Clone, Default)]
pub struct EventChannel {
    head: Option<Arc<EventLink>>,
}

/// The error handlers above one position, nearest first.
#[derive(Clone, Default)]
pub struct ErrorChannel {
    head: Option<Arc<ErrorLink>>,
}

impl core::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventChannel")
            .field("handlers", &self.len())
            .finish()
    }
}

impl core::fmt::Debug for ErrorChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ErrorChannel")
            .field("handlers", &self.len())
            .finish()
    }
}

impl EventChannel {
    /// Send `event` to the nearest handler.
    pub fn trigger(&self, event: impl Into<AnyEvent>) -> Delivery {
        dispatch_event(self.head.clone(), event.into())
    }

    /// Number of handlers between this position and the root.
    pub fn len(&self) -> usize {
        let mut len = 0;
        let mut cursor = self.head.as_deref();
        while let Some(link) = cursor {
            len += 1;
            cursor = link.next.head.as_deref();
        }
        len
    }

    /// Returns `true` when events go straight to the root default.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn intercept(
        &self,
        interceptor: Interceptor<AnyEvent, EventStep>,
        errors: ErrorChannel,
    ) -> Self {
        Self {
            head: Some(Arc::new(EventLink {
                interceptor,
                errors,
                next: self.clone(),
            })),
        }
    }
}

impl ErrorChannel {
    /// Send `error` to the nearest handler.
    pub fn report(&self, error: impl Into<AnyError>) -> Delivery {
        dispatch_error(self.head.clone(), error.into())
    }

    /// Report `error` so that an [`alert`](crate::alert) handler above presents it.
    pub fn report_alertable<E: AlertableError>(&self, error: E) -> Delivery {
        self.report(AnyError::alertable(error))
    }

    /// Number of handlers between this position and the root.
    pub fn len(&self) -> usize {
        let mut len = 0;
        let mut cursor = self.head.as_deref();
        while let Some(link) = cursor {
            len += 1;
            cursor = link.next.head.as_deref();
        }
        len
    }

    /// Returns `true` when errors go straight to the root default.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn intercept(
        &self,
        interceptor: Interceptor<AnyError, ErrorStep>,
        events: EventChannel,
    ) -> Self {
        Self {
            head: Some(Arc::new(ErrorLink {
                interceptor,
                events,
                next: self.clone(),
            })),
        }
    }
}

impl EventLink {
    fn resume(&self, step: EventStep) -> Delivery {
        match step {
            EventStep::Consumed => Delivery::Consumed,
            EventStep::Forward(event) => dispatch_event(self.next.head.clone(), event),
            EventStep::Fail(error) => {
                trace!(error = %error, "event handler failed; reporting");
                let _ = self.errors.report(error);
                Delivery::Redirected
            }
        }
    }
}

impl ErrorLink {
    fn resume(&self, step: ErrorStep) -> Delivery {
        match step {
            ErrorStep::Consumed => Delivery::Consumed,
            ErrorStep::Forward(error) => dispatch_error(self.next.head.clone(), error),
            ErrorStep::Recover(event) => {
                trace!(event = ?event, "error handler recovered; triggering");
                let _ = self.events.trigger(event);
                Delivery::Recovered
            }
        }
    }
}

fn dispatch_event(mut cursor: Option<Arc<EventLink>>, mut event: AnyEvent) -> Delivery {
    while let Some(link) = cursor {
        let kind = event.kind();
        if !link.interceptor.accepts(kind) {
            cursor = link.next.head.clone();
            continue;
        }
        trace!(%kind, "event handler inspecting");
        let step = match &link.interceptor.body {
            Body::Sync(body) => body(event),
            Body::Async(body) => {
                let work = body(event);
                let deferred = Arc::clone(&link);
                let spawned = link.interceptor.scope.spawn(kind, work, move |step| {
                    let _ = deferred.resume(step);
                });
                return match spawned {
                    Ok(()) => Delivery::Pending,
                    Err(err) => {
                        let _ = link.errors.report(err);
                        Delivery::Redirected
                    }
                };
            }
        };
        match step {
            EventStep::Forward(next) => {
                event = next;
                cursor = link.next.head.clone();
            }
            step => return link.resume(step),
        }
    }
    debug!(event = ?event, "event reached the root without a handler");
    Delivery::Unhandled
}

fn dispatch_error(mut cursor: Option<Arc<ErrorLink>>, mut error: AnyError) -> Delivery {
    while let Some(link) = cursor {
        let kind = error.kind();
        if !link.interceptor.accepts(kind) {
            cursor = link.next.head.clone();
            continue;
        }
        trace!(%kind, "error handler inspecting");
        let step = match &link.interceptor.body {
            Body::Sync(body) => body(error),
            Body::Async(body) => {
                let work = body(error);
                let deferred = Arc::clone(&link);
                let spawned = link.interceptor.scope.spawn(kind, work, move |step| {
                    let _ = deferred.resume(step);
                });
                return match spawned {
                    Ok(()) => Delivery::Pending,
                    Err(err) => dispatch_error(link.next.head.clone(), err.into()),
                };
            }
        };
        match step {
            ErrorStep::Forward(next) => {
                error = next;
                cursor = link.next.head.clone();
            }
            step => return link.resume(step),
        }
    }
    unhandled_error(&error)
}

fn unhandled_error(error: &AnyError) -> Delivery {
    error!(kind = %error.kind(), error = %error, "unhandled error reached the root");
    if cfg!(debug_assertions) {
        panic!("unhandled error: {error}");
    }
    Delivery::Unhandled
}

/// Environment key holding the [`EventChannel`] at a position.
#[derive(Debug)]
pub struct EventChannelKey;

impl EnvironmentKey for EventChannelKey {
    type Value = EventChannel;
    fn default_value() -> EventChannel {
        EventChannel::default()
    }
}

/// Environment key holding the [`ErrorChannel`] at a position.
#[derive(Debug)]
pub struct ErrorChannelKey;

impl EnvironmentKey for ErrorChannelKey {
    type Value = ErrorChannel;
    fn default_value() -> ErrorChannel {
        ErrorChannel::default()
    }
}
