// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cancellation scopes for asynchronous handler bodies.
//!
//! Every handler modifier owns a [`TaskScope`]. Asynchronous bodies are spawned as
//! Tokio tasks inside it; closing the scope on unmount cancels the token every task
//! watches and aborts the tasks, and a task that finishes after its scope closed
//! drops its result instead of delivering it.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::ResponderError;
use crate::sync::lock;
use crate::value::TypeKey;

#[derive(Clone, Default)]
pub(crate) struct TaskScope {
    inner: Arc<ScopeInner>,
}

#[derive(Default)]
struct ScopeInner {
    token: Mutex<CancellationToken>,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl core::fmt::Debug for TaskScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaskScope")
            .field("closed", &self.is_closed())
            .field("tasks", &lock(&self.inner.tasks).len())
            .finish()
    }
}

impl TaskScope {
    /// Reopen a closed scope; tasks spawned before closing stay cancelled.
    pub(crate) fn open(&self) {
        let mut token = lock(&self.inner.token);
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
    }

    pub(crate) fn close(&self) {
        lock(&self.inner.token).cancel();
        for task in lock(&self.inner.tasks).drain(..) {
            task.abort();
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        lock(&self.inner.token).is_cancelled()
    }

    /// Number of spawned tasks that have not finished yet.
    #[cfg(test)]
    pub(crate) fn outstanding(&self) -> usize {
        let mut tasks = lock(&self.inner.tasks);
        tasks.retain(|task| !task.is_finished());
        tasks.len()
    }

    /// Run `work` on the current runtime and hand its output to `deliver`,
    /// unless the scope closes first.
    pub(crate) fn spawn<S, F>(
        &self,
        kind: TypeKey,
        work: BoxFuture<'static, S>,
        deliver: F,
    ) -> Result<(), ResponderError>
    where
        S: Send + 'static,
        F: FnOnce(S) + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| ResponderError::NoRuntime { kind })?;
        let token = lock(&self.inner.token).clone();
        let handle = runtime.spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    trace!(%kind, "handler task cancelled");
                }
                output = work => {
                    if token.is_cancelled() {
                        trace!(%kind, "dropping result of cancelled handler task");
                    } else {
                        deliver(output);
                    }
                }
            }
        });
        let mut tasks = lock(&self.inner.tasks);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle.abort_handle());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn delivers_while_open() {
        let scope = TaskScope::default();
        let (tx, rx) = oneshot::channel();
        scope
            .spawn(TypeKey::of::<u8>(), async { 7_u8 }.boxed(), move |v| {
                let _ = tx.send(v);
            })
            .unwrap();
        assert_eq!(rx.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn closing_cancels_and_drops_results() {
        let scope = TaskScope::default();
        let delivered = Arc::new(AtomicBool::new(false));
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        let flag = delivered.clone();
        scope
            .spawn(
                TypeKey::of::<u8>(),
                async move {
                    let _ = gate_rx.await;
                }
                .boxed(),
                move |()| flag.store(true, Ordering::SeqCst),
            )
            .unwrap();
        assert_eq!(scope.outstanding(), 1);

        scope.close();
        assert!(scope.is_closed());
        let _ = gate_tx.send(());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!delivered.load(Ordering::SeqCst));
        assert_eq!(scope.outstanding(), 0);

        scope.open();
        assert!(!scope.is_closed());
    }

    #[test]
    fn spawning_without_runtime_fails() {
        let scope = TaskScope::default();
        let err = scope
            .spawn(TypeKey::of::<u8>(), async {}.boxed(), |()| {})
            .unwrap_err();
        assert_eq!(err.as_label(), "no_runtime");
    }
}
