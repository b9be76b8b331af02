// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presenting alertable errors.
//!
//! An [`AlertableError`] knows how to describe itself to a user. Report it with
//! [`TreeExt::report_alertable`](crate::TreeExt::report_alertable) (or
//! [`AnyError::alertable`]) and place [`handle_alerts`] above the reporting node; the
//! handler consumes the error and hands an [`Alert`] to the host's [`AlertPresenter`].
//! The alert stays current until [`AlertHandler::dismiss`] is called.
//!
//! The alert is captured when the error is erased. An alertable error reported through
//! the plain `report` paths, `?`, or returned as a replacement from a handler converts
//! without it and is not presented.

use std::error::Error;
use std::sync::{Arc, Mutex};

use tracing::debug;
use understory_view_tree::{Environment, Modifier, ModifierContext};

use crate::chain::{Body, ErrorStep, Interceptor};
use crate::sync::lock;
use crate::task::TaskScope;
use crate::value::AnyError;
use crate::{ErrorChannelKey, EventChannelKey};

/// An error with a user-facing title and message.
///
/// Only errors erased with [`AnyError::alertable`], or reported through a
/// `report_alertable` method, carry their alert up the error channel.
pub trait AlertableError: Error + Send + Sync + 'static {
    /// Title of the alert; [`Alert::DEFAULT_TITLE`] when `None`.
    fn title(&self) -> Option<String> {
        None
    }

    /// Body text of the alert.
    fn message(&self) -> String;
}

/// A title and message ready for presentation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    title: String,
    message: String,
}

impl Alert {
    /// Title used when the error does not supply one.
    pub const DEFAULT_TITLE: &'static str = "Error";
    /// Label of the single button that dismisses the alert.
    pub const DISMISS_LABEL: &'static str = "Okay";

    pub(crate) fn from_error(error: &dyn AlertableError) -> Self {
        Self {
            title: error
                .title()
                .unwrap_or_else(|| Self::DEFAULT_TITLE.to_owned()),
            message: error.message(),
        }
    }

    /// Title of the alert.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Body text of the alert.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The host's modal dialog primitive.
pub trait AlertPresenter: Send + Sync + 'static {
    /// Show `alert` with a single [`Alert::DISMISS_LABEL`] button.
    fn present(&self, alert: &Alert);

    /// The current alert was dismissed.
    fn dismissed(&self) {}
}

/// Error handler that presents alertable errors; see [`handle_alerts`].
pub struct AlertHandler {
    shared: Arc<AlertState>,
    scope: TaskScope,
}

struct AlertState {
    presenter: Box<dyn AlertPresenter>,
    current: Mutex<Option<Alert>>,
}

impl core::fmt::Debug for AlertHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AlertHandler")
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}

impl AlertHandler {
    /// The alert being presented, if any.
    pub fn current(&self) -> Option<Alert> {
        lock(&self.shared.current).clone()
    }

    /// Dismiss the current alert.
    pub fn dismiss(&self) {
        if lock(&self.shared.current).take().is_some() {
            self.shared.presenter.dismissed();
        }
    }
}

/// Consume alertable errors reported beneath this node and present them.
///
/// Errors without an alert continue up the error channel, including alertable errors
/// that were converted with `into()` or `?` rather than [`AnyError::alertable`].
pub fn handle_alerts(presenter: impl AlertPresenter) -> Arc<AlertHandler> {
    Arc::new(AlertHandler {
        shared: Arc::new(AlertState {
            presenter: Box::new(presenter),
            current: Mutex::new(None),
        }),
        scope: TaskScope::default(),
    })
}

impl Modifier for AlertHandler {
    fn environment(&self, env: &mut Environment) {
        let shared = Arc::clone(&self.shared);
        let body = Body::Sync(Arc::new(move |error: AnyError| {
            let Some(alert) = error.alert().cloned() else {
                return ErrorStep::Forward(error);
            };
            debug!(kind = %error.kind(), title = alert.title(), "presenting alert");
            *lock(&shared.current) = Some(alert.clone());
            shared.presenter.present(&alert);
            ErrorStep::Consumed
        }));
        let events = env.get::<EventChannelKey>();
        env.update::<ErrorChannelKey>(|channel| {
            *channel = channel.intercept(
                Interceptor {
                    filter: None,
                    body,
                    scope: self.scope.clone(),
                },
                events,
            );
        });
    }

    fn mount(&self, _: &ModifierContext<'_>) {
        self.scope.open();
    }

    fn unmount(&self, _: &ModifierContext<'_>) {
        self.scope.close();
        self.dismiss();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Recorder, errors_into};
    use crate::{Delivery, TreeExt};
    use understory_view_tree::Tree;

    #[derive(Debug, thiserror::Error)]
    #[error("quota exceeded")]
    struct QuotaExceeded;

    impl AlertableError for QuotaExceeded {
        fn title(&self) -> Option<String> {
            Some("Storage full".into())
        }

        fn message(&self) -> String {
            "Remove some files and try again.".into()
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("offline")]
    struct Offline;

    impl AlertableError for Offline {
        fn message(&self) -> String {
            "You appear to be offline.".into()
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("plain failure")]
    struct Plain;

    struct Screen(Recorder);

    impl AlertPresenter for Screen {
        fn present(&self, alert: &Alert) {
            self.0.push(format!("present {}: {}", alert.title(), alert.message()));
        }

        fn dismissed(&self) {
            self.0.push("dismissed");
        }
    }

    fn mounted(rec: &Recorder) -> (Tree, Arc<AlertHandler>, understory_view_tree::NodeId) {
        let handler = handle_alerts(Screen(rec.clone()));
        let mut tree = Tree::new();
        let outer = tree.insert(None, vec![errors_into(rec, "outer")]);
        let host = tree.insert(Some(outer), vec![handler.clone() as Arc<dyn Modifier>]);
        let leaf = tree.insert(Some(host), Vec::new());
        let _ = tree.commit();
        (tree, handler, leaf)
    }

    #[test]
    fn presents_and_consumes_alertable_errors() {
        let rec = Recorder::default();
        let (tree, handler, leaf) = mounted(&rec);

        let delivery = tree.report_error(leaf, AnyError::alertable(QuotaExceeded));
        assert_eq!(delivery, Some(Delivery::Consumed));
        assert_eq!(
            rec.take(),
            vec!["present Storage full: Remove some files and try again."]
        );
        assert_eq!(
            handler.current().map(|alert| alert.title().to_owned()),
            Some("Storage full".to_owned())
        );
    }

    #[test]
    fn missing_title_falls_back_to_default() {
        let rec = Recorder::default();
        let (tree, handler, leaf) = mounted(&rec);

        let _ = tree.report_error(leaf, AnyError::alertable(Offline));
        let alert = handler.current().unwrap();
        assert_eq!(alert.title(), Alert::DEFAULT_TITLE);
        assert_eq!(alert.message(), "You appear to be offline.");
    }

    #[test]
    fn other_errors_pass_through() {
        let rec = Recorder::default();
        let (tree, handler, leaf) = mounted(&rec);

        let delivery = tree.report_error(leaf, Plain);
        assert_eq!(delivery, Some(Delivery::Consumed));
        assert_eq!(rec.take(), vec!["outer: plain failure"]);
        assert!(handler.current().is_none());
    }

    #[test]
    fn report_alertable_keeps_the_alert() {
        let rec = Recorder::default();
        let (tree, handler, leaf) = mounted(&rec);

        let delivery = tree.report_alertable(leaf, QuotaExceeded);
        assert_eq!(delivery, Some(Delivery::Consumed));
        assert_eq!(
            rec.take(),
            vec!["present Storage full: Remove some files and try again."]
        );
        assert!(handler.current().is_some());
    }

    #[test]
    fn plain_conversion_drops_the_alert() {
        let rec = Recorder::default();
        let (tree, handler, leaf) = mounted(&rec);

        let delivery = tree.report_error(leaf, QuotaExceeded);
        assert_eq!(delivery, Some(Delivery::Consumed));
        assert_eq!(rec.take(), vec!["outer: quota exceeded"]);
        assert!(handler.current().is_none());
    }

    #[test]
    fn dismiss_clears_once() {
        let rec = Recorder::default();
        let (tree, handler, leaf) = mounted(&rec);

        let _ = tree.report_error(leaf, AnyError::alertable(Offline));
        let _ = rec.take();
        handler.dismiss();
        handler.dismiss();
        assert_eq!(rec.take(), vec!["dismissed"]);
        assert!(handler.current().is_none());
    }

    #[test]
    fn unmount_dismisses_current_alert() {
        let rec = Recorder::default();
        let (mut tree, handler, leaf) = mounted(&rec);

        let _ = tree.report_error(leaf, AnyError::alertable(Offline));
        let _ = rec.take();
        let host = tree.parent_of(leaf).unwrap();
        tree.remove(host);
        assert_eq!(rec.take(), vec!["dismissed"]);
        assert!(handler.current().is_none());
    }
}
