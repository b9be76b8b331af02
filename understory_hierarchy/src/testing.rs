// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared test helpers.

use std::io;
use std::sync::{Arc, Mutex};

use understory_view_tree::Modifier;

use crate::chain::Receive;
use crate::sync::lock;
use crate::{errors, events};

/// Ordered log of what handlers observed.
#[derive(Clone, Default)]
pub(crate) struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        lock(&self.0).push(entry.into());
    }

    pub(crate) fn take(&self) -> Vec<String> {
        core::mem::take(&mut *lock(&self.0))
    }

    /// An untyped event handler that records `name` and answers `outcome`.
    pub(crate) fn receive(&self, name: &'static str, outcome: Receive) -> Arc<dyn Modifier> {
        let rec = self.clone();
        events::receive(move |_| {
            rec.push(name);
            Ok(outcome)
        })
    }
}

/// An error handler that consumes everything and records `"{prefix}: {error}"`.
pub(crate) fn errors_into(rec: &Recorder, prefix: &'static str) -> Arc<dyn Modifier> {
    let rec = rec.clone();
    errors::handle(move |error| rec.push(format!("{prefix}: {error}")))
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.0).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a subscriber that captures warnings and errors as plain text.
pub(crate) fn with_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&lock(&buffer.0)).into_owned();
    (out, logs)
}
