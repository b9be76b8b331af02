// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Development-time checks of which events and errors a subtree may produce.
//!
//! ## Declarations
//!
//! [`triggers`] and [`reports`] wrap a subtree with the list of event or error types it
//! is expected to produce. When the node mounts, every declared type must have a typed
//! handler (`handle_of`, `receive_of`, `catch_of`, ...) somewhere above; missing ones
//! are reported unless `require_explicit_responders` is off. While mounted, the node
//! watches the values passing through it and reports types that neither it nor any
//! declaration beneath it listed. It never consumes anything.
//!
//! Declarations aggregate upward through [`DeclaredEvents`] and [`DeclaredErrors`], so an
//! outer declaration accepts what inner declarations already listed.
//!
//! In builds without `debug_assertions` both constructors return a modifier that does
//! nothing.
//!
//! ## Reporting
//!
//! Every misuse is a [`Violation`], reported according to the [`SafetyLevel`] in the
//! environment: `Strict` panics, `Relaxed` logs a warning, `Disabled` stays silent.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;
use understory_view_tree::{EnvironmentKey, Modifier, PreferenceKey};

use crate::error::Violation;
use crate::value::TypeKey;

/// How misuse of the responder API is reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SafetyLevel {
    /// Panic with the violation.
    Strict,
    /// Log the violation as a warning.
    #[default]
    Relaxed,
    /// Ignore violations.
    Disabled,
}

impl SafetyLevel {
    /// Report `violation` at this level.
    pub fn report(self, violation: &Violation) {
        match self {
            Self::Strict => panic!("{violation}"),
            Self::Relaxed => warn!(violation = violation.as_label(), "{violation}"),
            Self::Disabled => {}
        }
    }
}

/// Environment key: event types with a typed handler above a position.
#[derive(Debug)]
pub struct HandledEvents;

impl EnvironmentKey for HandledEvents {
    type Value = BTreeSet<TypeKey>;
    fn default_value() -> Self::Value {
        BTreeSet::new()
    }
}

/// Environment key: error types with a typed handler above a position.
#[derive(Debug)]
pub struct HandledErrors;

impl EnvironmentKey for HandledErrors {
    type Value = BTreeSet<TypeKey>;
    fn default_value() -> Self::Value {
        BTreeSet::new()
    }
}

/// Preference key: event types declared beneath a node, with multiplicity.
#[derive(Debug)]
pub struct DeclaredEvents;

impl PreferenceKey for DeclaredEvents {
    type Value = Vec<TypeKey>;
    fn default_value() -> Self::Value {
        Vec::new()
    }
    fn reduce(value: &mut Self::Value, next: Self::Value) {
        value.extend(next);
    }
}

/// Preference key: error types declared beneath a node, with multiplicity.
#[derive(Debug)]
pub struct DeclaredErrors;

impl PreferenceKey for DeclaredErrors {
    type Value = Vec<TypeKey>;
    fn default_value() -> Self::Value {
        Vec::new()
    }
    fn reduce(value: &mut Self::Value, next: Self::Value) {
        value.extend(next);
    }
}

/// Declare the event types this subtree triggers.
#[track_caller]
pub fn triggers(kinds: impl IntoIterator<Item = TypeKey>) -> Arc<dyn Modifier> {
    #[cfg(debug_assertions)]
    {
        audit::Auditor::new(
            audit::Channel::Events,
            kinds,
            core::panic::Location::caller(),
        )
    }
    #[cfg(not(debug_assertions))]
    {
        let _ = kinds;
        Arc::new(Inert)
    }
}

/// Declare the error types this subtree reports.
#[track_caller]
pub fn reports(kinds: impl IntoIterator<Item = TypeKey>) -> Arc<dyn Modifier> {
    #[cfg(debug_assertions)]
    {
        audit::Auditor::new(
            audit::Channel::Errors,
            kinds,
            core::panic::Location::caller(),
        )
    }
    #[cfg(not(debug_assertions))]
    {
        let _ = kinds;
        Arc::new(Inert)
    }
}

#[cfg(not(debug_assertions))]
#[derive(Debug)]
struct Inert;

#[cfg(not(debug_assertions))]
impl Modifier for Inert {}

#[cfg(debug_assertions)]
mod audit {
    use core::panic::Location;
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};

    use understory_view_tree::{Environment, Modifier, ModifierContext, Preferences};

    use super::{DeclaredErrors, DeclaredEvents, HandledErrors, HandledEvents, SafetyLevel};
    use crate::chain::{Body, ErrorStep, EventStep, Interceptor};
    use crate::config::ConfigKey;
    use crate::error::{TypeList, Violation};
    use crate::sync::lock;
    use crate::task::TaskScope;
    use crate::value::{AnyError, AnyEvent, TypeKey};
    use crate::{ErrorChannelKey, EventChannelKey};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(super) enum Channel {
        Events,
        Errors,
    }

    struct AuditState {
        channel: Channel,
        kinds: Vec<TypeKey>,
        location: &'static Location<'static>,
        below: Mutex<BTreeSet<TypeKey>>,
    }

    impl AuditState {
        fn observe(&self, kind: TypeKey, level: SafetyLevel) {
            if self.kinds.contains(&kind) || lock(&self.below).contains(&kind) {
                return;
            }
            let location = self.location;
            level.report(&match self.channel {
                Channel::Events => Violation::UndeclaredEvent { kind, location },
                Channel::Errors => Violation::UndeclaredError { kind, location },
            });
        }

        fn refresh_below(&self, prefs: &Preferences) {
            let below = match self.channel {
                Channel::Events => prefs.get::<DeclaredEvents>(),
                Channel::Errors => prefs.get::<DeclaredErrors>(),
            };
            *lock(&self.below) = below.into_iter().collect();
        }
    }

    pub(super) struct Auditor {
        state: Arc<AuditState>,
        scope: TaskScope,
    }

    impl core::fmt::Debug for Auditor {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            f.debug_struct("Auditor")
                .field("channel", &self.state.channel)
                .field("kinds", &self.state.kinds)
                .field("location", &self.state.location)
                .finish_non_exhaustive()
        }
    }

    impl Auditor {
        pub(super) fn new(
            channel: Channel,
            kinds: impl IntoIterator<Item = TypeKey>,
            location: &'static Location<'static>,
        ) -> Arc<dyn Modifier> {
            Arc::new(Self {
                state: Arc::new(AuditState {
                    channel,
                    kinds: kinds.into_iter().collect(),
                    location,
                    below: Mutex::new(BTreeSet::new()),
                }),
                scope: TaskScope::default(),
            })
        }
    }

    impl Modifier for Auditor {
        fn environment(&self, env: &mut Environment) {
            let level = env.get::<ConfigKey>().safety_level;
            let state = Arc::clone(&self.state);
            let scope = self.scope.clone();
            match self.state.channel {
                Channel::Events => {
                    let body = Body::Sync(Arc::new(move |event: AnyEvent| {
                        state.observe(event.kind(), level);
                        EventStep::Forward(event)
                    }));
                    let errors = env.get::<ErrorChannelKey>();
                    env.update::<EventChannelKey>(|channel| {
                        *channel = channel.intercept(
                            Interceptor {
                                filter: None,
                                body,
                                scope,
                            },
                            errors,
                        );
                    });
                }
                Channel::Errors => {
                    let body = Body::Sync(Arc::new(move |error: AnyError| {
                        state.observe(error.kind(), level);
                        ErrorStep::Forward(error)
                    }));
                    let events = env.get::<EventChannelKey>();
                    env.update::<ErrorChannelKey>(|channel| {
                        *channel = channel.intercept(
                            Interceptor {
                                filter: None,
                                body,
                                scope,
                            },
                            events,
                        );
                    });
                }
            }
        }

        fn preferences(&self, prefs: &mut Preferences) {
            let kinds = self.state.kinds.clone();
            match self.state.channel {
                Channel::Events => prefs.contribute::<DeclaredEvents>(kinds),
                Channel::Errors => prefs.contribute::<DeclaredErrors>(kinds),
            }
        }

        fn mount(&self, cx: &ModifierContext<'_>) {
            self.scope.open();
            self.state.refresh_below(cx.preferences());

            let config = cx.environment().get::<ConfigKey>();
            if !config.require_explicit_responders {
                return;
            }
            let handled = match self.state.channel {
                Channel::Events => cx.environment().get::<HandledEvents>(),
                Channel::Errors => cx.environment().get::<HandledErrors>(),
            };
            let mut missing = Vec::new();
            for kind in &self.state.kinds {
                if !handled.contains(kind) && !missing.contains(kind) {
                    missing.push(*kind);
                }
            }
            if missing.is_empty() {
                return;
            }
            let kinds = TypeList(missing);
            let location = self.state.location;
            config.safety_level.report(&match self.state.channel {
                Channel::Events => Violation::UnhandledEvents { kinds, location },
                Channel::Errors => Violation::UnhandledErrors { kinds, location },
            });
        }

        fn preferences_changed(&self, cx: &ModifierContext<'_>) {
            self.state.refresh_below(cx.preferences());
        }

        fn unmount(&self, _: &ModifierContext<'_>) {
            self.scope.close();
        }
    }
}
