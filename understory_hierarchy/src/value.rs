// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type-erased events and errors.
//!
//! Both channels carry values of an open set of types. [`AnyEvent`] and [`AnyError`]
//! erase the concrete type behind an [`Arc`] and remember its [`TypeKey`], which
//! type-filtered handlers compare against before running any user code.

use core::any::{Any, TypeId};
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use std::error::Error;
use std::sync::Arc;

use crate::alert::{Alert, AlertableError};

/// Identity of a concrete event or error type.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// The key of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// The type's name as reported by [`core::any::type_name`].
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A value that bubbles up the event channel.
///
/// ```
/// use understory_hierarchy::{AnyEvent, Event};
///
/// #[derive(Debug)]
/// struct Opened(u32);
/// impl Event for Opened {}
///
/// let event = AnyEvent::new(Opened(7));
/// assert_eq!(event.downcast_ref::<Opened>().map(|o| o.0), Some(7));
/// ```
pub trait Event: Any + fmt::Debug + Send + Sync {}

/// A type-erased [`Event`].
#[derive(Clone)]
pub struct AnyEvent {
    value: Arc<dyn Event>,
    kind: TypeKey,
}

impl AnyEvent {
    /// Erase `event`.
    pub fn new<E: Event>(event: E) -> Self {
        Self {
            value: Arc::new(event),
            kind: TypeKey::of::<E>(),
        }
    }

    /// The concrete type of the event.
    pub fn kind(&self) -> TypeKey {
        self.kind
    }

    /// Returns `true` if the event is an `E`.
    pub fn is<E: Event>(&self) -> bool {
        self.kind == TypeKey::of::<E>()
    }

    /// Borrow the event as an `E`.
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        let any: &dyn Any = &*self.value;
        any.downcast_ref::<E>()
    }
}

impl fmt::Debug for AnyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.value, f)
    }
}

impl<E: Event> From<E> for AnyEvent {
    fn from(event: E) -> Self {
        Self::new(event)
    }
}

/// A type-erased error travelling up the error channel.
///
/// Any [`Error`] converts into an `AnyError`, so handlers can use `?`.
/// Errors built with [`AnyError::alertable`] also carry an [`Alert`].
#[derive(Clone)]
pub struct AnyError {
    error: Arc<dyn Error + Send + Sync>,
    kind: TypeKey,
    alert: Option<Alert>,
}

impl AnyError {
    /// Erase `error`.
    pub fn new<E: Error + Send + Sync + 'static>(error: E) -> Self {
        Self {
            error: Arc::new(error),
            kind: TypeKey::of::<E>(),
            alert: None,
        }
    }

    /// Erase `error`, keeping its title and message for presentation.
    pub fn alertable<E: AlertableError>(error: E) -> Self {
        let alert = Alert::from_error(&error);
        Self {
            alert: Some(alert),
            ..Self::new(error)
        }
    }

    /// The concrete type of the error.
    pub fn kind(&self) -> TypeKey {
        self.kind
    }

    /// Returns `true` if the error is an `E`.
    pub fn is<E: Error + 'static>(&self) -> bool {
        self.kind == TypeKey::of::<E>()
    }

    /// Borrow the error as an `E`.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.error.downcast_ref::<E>()
    }

    /// The alert this error presents as, if it was built with [`AnyError::alertable`].
    pub fn alert(&self) -> Option<&Alert> {
        self.alert.as_ref()
    }

    /// Borrow the underlying error.
    pub fn as_error(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.error
    }
}

impl fmt::Debug for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.error, f)
    }
}

impl fmt::Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.error, f)
    }
}

impl<E: Error + Send + Sync + 'static> From<E> for AnyError {
    fn from(error: E) -> Self {
        Self::new(error)
    }
}
