// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error handler modifiers.
//!
//! Mirrors [`events`](crate::events) on the error channel, plus the `catch` family,
//! which turns an error back into an event. The recovered event is triggered on the
//! event channel as seen from the catching node.
//!
//! Returning `Err` from a handler replaces the error being propagated; the new error
//! continues to the next ancestor.

use std::error::Error;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use understory_view_tree::{Environment, Modifier, ModifierContext};

use crate::chain::{Body, ErrorStep, Interceptor, Receive};
use crate::safety::HandledErrors;
use crate::task::TaskScope;
use crate::value::{AnyError, AnyEvent, TypeKey};
use crate::{ErrorChannelKey, EventChannelKey};

struct ErrorHandler {
    filter: Option<TypeKey>,
    body: Body<AnyError, ErrorStep>,
    scope: TaskScope,
}

impl core::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("filter", &self.filter)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl ErrorHandler {
    fn sync(
        filter: Option<TypeKey>,
        body: impl Fn(AnyError) -> ErrorStep + Send + Sync + 'static,
    ) -> Arc<dyn Modifier> {
        Arc::new(Self {
            filter,
            body: Body::Sync(Arc::new(body)),
            scope: TaskScope::default(),
        })
    }

    fn spawning(
        filter: Option<TypeKey>,
        body: impl Fn(AnyError) -> BoxFuture<'static, ErrorStep> + Send + Sync + 'static,
    ) -> Arc<dyn Modifier> {
        Arc::new(Self {
            filter,
            body: Body::Async(Arc::new(body)),
            scope: TaskScope::default(),
        })
    }
}

impl Modifier for ErrorHandler {
    fn environment(&self, env: &mut Environment) {
        let events = env.get::<EventChannelKey>();
        let interceptor = Interceptor {
            filter: self.filter,
            body: self.body.clone(),
            scope: self.scope.clone(),
        };
        env.update::<ErrorChannelKey>(|channel| *channel = channel.intercept(interceptor, events));
        if let Some(kind) = self.filter {
            env.update::<HandledErrors>(|handled| {
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

fn decide(error: AnyError, outcome: Result<Receive, AnyError>) -> ErrorStep {
    match outcome {
        Ok(Receive::Handled) => ErrorStep::Consumed,
        Ok(Receive::NotHandled) => ErrorStep::Forward(error),
        Err(replacement) => ErrorStep::Forward(replacement),
    }
}

fn recover(outcome: Result<AnyEvent, AnyError>) -> ErrorStep {
    match outcome {
        Ok(event) => ErrorStep::Recover(event),
        Err(replacement) => ErrorStep::Forward(replacement),
    }
}

/// Intercept every error reported beneath this node.
pub fn receive<F>(f: F) -> Arc<dyn Modifier>
where
    F: Fn(&AnyError) -> Result<Receive, AnyError> + Send + Sync + 'static,
{
    ErrorHandler::sync(None, move |error| {
        let outcome = f(&error);
        decide(error, outcome)
    })
}

/// Intercept errors of type `E`; other errors pass through.
pub fn receive_of<E, F>(f: F) -> Arc<dyn Modifier>
where
    E: Error + Send + Sync + 'static,
    F: Fn(&E) -> Result<Receive, AnyError> + Send + Sync + 'static,
{
    ErrorHandler::sync(Some(TypeKey::of::<E>()), move |error| {
        let outcome = match error.downcast_ref::<E>() {
            Some(e) => f(e),
            None => Ok(Receive::NotHandled),
        };
        decide(error, outcome)
    })
}

/// Intercept every error with an asynchronous body.
pub fn receive_async<F, Fut>(f: F) -> Arc<dyn Modifier>
where
    F: Fn(AnyError) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Receive, AnyError>> + Send + 'static,
{
    ErrorHandler::spawning(None, move |error| {
        let work = f(error.clone());
        async move { decide(error, work.await) }.boxed()
    })
}

/// Consume every error reported beneath this node.
pub fn handle<F>(f: F) -> Arc<dyn Modifier>
where
    F: Fn(&AnyError) + Send + Sync + 'static,
{
    receive(move |error| {
        f(error);
        Ok(Receive::Handled)
    })
}

/// Consume errors of type `E`.
pub fn handle_of<E, F>(f: F) -> Arc<dyn Modifier>
where
    E: Error + Send + Sync + 'static,
    F: Fn(&E) + Send + Sync + 'static,
{
    receive_of::<E, _>(move |error| {
        f(error);
        Ok(Receive::Handled)
    })
}

/// Replace every error with the one `f` returns; the replacement continues upward.
pub fn transform<F>(f: F) -> Arc<dyn Modifier>
where
    F: Fn(AnyError) -> AnyError + Send + Sync + 'static,
{
    ErrorHandler::sync(None, move |error| ErrorStep::Forward(f(error)))
}

/// Replace errors of type `E`; other errors pass through unchanged.
pub fn transform_of<E, F>(f: F) -> Arc<dyn Modifier>
where
    E: Error + Send + Sync + 'static,
    F: Fn(&E) -> AnyError + Send + Sync + 'static,
{
    ErrorHandler::sync(Some(TypeKey::of::<E>()), move |error| {
        let replacement = error.downcast_ref::<E>().map(&f);
        ErrorStep::Forward(replacement.unwrap_or(error))
    })
}

/// Turn every error into an event triggered from this node.
///
/// Returning `Err` forwards that error upward instead.
pub fn catch<F>(f: F) -> Arc<dyn Modifier>
where
    F: Fn(&AnyError) -> Result<AnyEvent, AnyError> + Send + Sync + 'static,
{
    ErrorHandler::sync(None, move |error| recover(f(&error)))
}

/// Turn errors of type `E` into events; other errors pass through.
pub fn catch_of<E, F>(f: F) -> Arc<dyn Modifier>
where
    E: Error + Send + Sync + 'static,
    F: Fn(&E) -> Result<AnyEvent, AnyError> + Send + Sync + 'static,
{
    ErrorHandler::sync(Some(TypeKey::of::<E>()), move |error| {
        match error.downcast_ref::<E>() {
            Some(e) => recover(f(e)),
            None => ErrorStep::Forward(error),
        }
    })
}

/// Turn every error into an event with an asynchronous body.
pub fn catch_async<F, Fut>(f: F) -> Arc<dyn Modifier>
where
    F: Fn(AnyError) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AnyEvent, AnyError>> + Send + 'static,
{
    ErrorHandler::spawning(None, move |error| f(error).map(recover).boxed())
}

/// Turn errors of type `E` into events with an asynchronous body.
pub fn catch_of_async<E, F, Fut>(f: F) -> Arc<dyn Modifier>
where
    E: Error + Clone + Send + Sync + 'static,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AnyEvent, AnyError>> + Send + 'static,
{
    ErrorHandler::spawning(Some(TypeKey::of::<E>()), move |error| {
        let work = error.downcast_ref::<E>().cloned().map(&f);
        async move {
            match work {
                Some(work) => recover(work.await),
                None => ErrorStep::Forward(error),
            }
        }
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Recorder, errors_into};
    use crate::value::Event;
    use crate::{Delivery, TreeExt, events};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use understory_view_tree::Tree;

    #[derive(Debug, Clone, thiserror::Error)]
    #[error("not found")]
    struct NotFound;

    #[derive(Debug, thiserror::Error)]
    #[error("offline")]
    struct Offline;

    #[derive(Debug)]
    struct ShowPlaceholder;
    impl Event for ShowPlaceholder {}

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "unhandled error")]
    fn not_found_without_handlers_hits_root_assertion() {
        let mut tree = Tree::new();
        let root = tree.insert(None, Vec::new());
        let leaf = tree.insert(Some(root), Vec::new());
        let _ = tree.commit();
        let _ = tree.report_error(leaf, NotFound);
    }

    #[test]
    fn typed_error_handler_consumes_only_its_type() {
        let rec = Recorder::default();
        let mut tree = Tree::new();
        let root = tree.insert(None, vec![errors_into(&rec, "root")]);
        let r = rec.clone();
        let node = tree.insert(
            Some(root),
            vec![handle_of::<NotFound, _>(move |e| r.push(format!("node: {e}")))],
        );
        let _ = tree.commit();

        assert_eq!(tree.report_error(node, NotFound), Some(Delivery::Consumed));
        assert_eq!(tree.report_error(node, Offline), Some(Delivery::Consumed));
        assert_eq!(rec.take(), vec!["node: not found", "root: offline"]);
    }

    #[test]
    fn transformed_error_continues_upward() {
        let rec = Recorder::default();
        let mut tree = Tree::new();
        let root = tree.insert(None, vec![errors_into(&rec, "root")]);
        let node = tree.insert(
            Some(root),
            vec![transform_of::<Offline, _>(|_| NotFound.into())],
        );
        let _ = tree.commit();

        assert_eq!(tree.report_error(node, Offline), Some(Delivery::Consumed));
        assert_eq!(rec.take(), vec!["root: not found"]);
    }

    #[test]
    fn failing_error_handler_replaces_the_error() {
        let rec = Recorder::default();
        let mut tree = Tree::new();
        let root = tree.insert(None, vec![errors_into(&rec, "root")]);
        let node = tree.insert(
            Some(root),
            vec![receive_of::<NotFound, _>(|_| Err(Offline.into()))],
        );
        let _ = tree.commit();

        let _ = tree.report_error(node, NotFound);
        assert_eq!(rec.take(), vec!["root: offline"]);
    }

    #[test]
    fn catch_recovers_into_the_event_channel() {
        let rec = Recorder::default();
        let mut tree = Tree::new();
        let r = rec.clone();
        let root = tree.insert(
            None,
            vec![
                errors_into(&rec, "root"),
                events::handle_of::<ShowPlaceholder, _>(move |_| {
                    r.push("placeholder");
                    Ok(())
                }),
            ],
        );
        let node = tree.insert(
            Some(root),
            vec![catch_of::<NotFound, _>(|_| Ok(ShowPlaceholder.into()))],
        );
        let _ = tree.commit();

        assert_eq!(tree.report_error(node, NotFound), Some(Delivery::Recovered));
        assert_eq!(rec.take(), vec!["placeholder"]);
    }

    #[test]
    fn typed_handlers_register_handled_types() {
        let mut tree = Tree::new();
        let root = tree.insert(
            None,
            vec![catch_of::<NotFound, _>(|_| Ok(ShowPlaceholder.into()))],
        );
        let _ = tree.commit();
        let handled = tree.environment(root).unwrap().get::<HandledErrors>();
        assert!(handled.contains(&TypeKey::of::<NotFound>()));
    }

    #[tokio::test]
    async fn async_catch_triggers_after_completion() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tree = Tree::new();
        let root = tree.insert(
            None,
            vec![events::handle(move |event| {
                let _ = tx.send(event.is::<ShowPlaceholder>());
                Ok(())
            })],
        );
        let node = tree.insert(
            Some(root),
            vec![catch_of_async::<NotFound, _, _>(|_| async {
                tokio::task::yield_now().await;
                Ok(ShowPlaceholder.into())
            })],
        );
        let _ = tree.commit();

        assert_eq!(tree.report_error(node, NotFound), Some(Delivery::Pending));
        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(got.unwrap(), Some(true));
    }
}
