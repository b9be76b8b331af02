// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors raised by the propagation machinery itself.

use core::fmt;
use core::panic::Location;

use crate::value::TypeKey;

/// A failure of the propagation machinery, reported on the error channel.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ResponderError {
    /// An asynchronous handler ran outside a Tokio runtime.
    #[error("asynchronous handler for `{kind}` invoked outside a Tokio runtime")]
    NoRuntime {
        /// Type of the value the handler received.
        kind: TypeKey,
    },
}

impl ResponderError {
    /// Returns a stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::NoRuntime { .. } => "no_runtime",
        }
    }
}

/// A misuse of the responder API, reported according to the
/// [`SafetyLevel`](crate::safety::SafetyLevel) in effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Violation {
    /// An event passed a `triggers` declaration that does not list its type.
    #[error("event `{kind}` passed through `triggers` at {location} without being declared")]
    UndeclaredEvent {
        /// Observed event type.
        kind: TypeKey,
        /// Where the declaration was made.
        location: &'static Location<'static>,
    },
    /// An error passed a `reports` declaration that does not list its type.
    #[error("error `{kind}` passed through `reports` at {location} without being declared")]
    UndeclaredError {
        /// Observed error type.
        kind: TypeKey,
        /// Where the declaration was made.
        location: &'static Location<'static>,
    },
    /// Declared event types have no typed handler above the declaration.
    #[error("events [{kinds}] declared at {location} have no handler above them")]
    UnhandledEvents {
        /// Declared types without a handler.
        kinds: TypeList,
        /// Where the declaration was made.
        location: &'static Location<'static>,
    },
    /// Declared error types have no typed handler above the declaration.
    #[error("errors [{kinds}] declared at {location} have no handler above them")]
    UnhandledErrors {
        /// Declared types without a handler.
        kinds: TypeList,
        /// Where the declaration was made.
        location: &'static Location<'static>,
    },
    /// A subscriber has no publisher for its event type above it.
    #[error("subscriber for `{kind}` at {location} has no publisher above it")]
    MissingPublisher {
        /// Subscribed event type.
        kind: TypeKey,
        /// Where the subscriber was declared.
        location: &'static Location<'static>,
    },
    /// A publisher is nested inside another publisher for the same event type.
    #[error("publisher for `{kind}` at {location} is nested inside another publisher for the same event")]
    DuplicatePublisher {
        /// Published event type.
        kind: TypeKey,
        /// Where the inner publisher was declared.
        location: &'static Location<'static>,
    },
}

impl Violation {
    /// Returns a stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::UndeclaredEvent { .. } => "undeclared_event",
            Self::UndeclaredError { .. } => "undeclared_error",
            Self::UnhandledEvents { .. } => "unhandled_events",
            Self::UnhandledErrors { .. } => "unhandled_errors",
            Self::MissingPublisher { .. } => "missing_publisher",
            Self::DuplicatePublisher { .. } => "duplicate_publisher",
        }
    }
}

/// Displayable list of types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeList(pub Vec<TypeKey>);

impl fmt::Display for TypeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, kind) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "`{kind}`")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_list_display() {
        let list = TypeList(vec![TypeKey::of::<u8>(), TypeKey::of::<u16>()]);
        assert_eq!(list.to_string(), "`u8`, `u16`");
        assert_eq!(TypeList::default().to_string(), "");
    }

    #[test]
    fn labels_are_stable() {
        let v = Violation::MissingPublisher {
            kind: TypeKey::of::<u8>(),
            location: Location::caller(),
        };
        assert_eq!(v.as_label(), "missing_publisher");
        assert!(v.to_string().starts_with("subscriber for `u8`"));
        let e = ResponderError::NoRuntime {
            kind: TypeKey::of::<u8>(),
        };
        assert_eq!(e.as_label(), "no_runtime");
    }
}
