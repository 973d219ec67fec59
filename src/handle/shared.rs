//! Shared ownership handles
//!
//! Provides reference-counted handles over heap values. A record is freed
//! when its last handle is released; just before that happens the record's
//! destruction event fires, so non-owners can react to the teardown
//! without keeping the value alive themselves.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use crate::event::Notifier;

use super::trace;

/// Bookkeeping shared by every handle to one record.
struct Meta {
    /// Optional debug label, also tracked by [`trace`]
    label: Option<String>,
    /// Fired exactly once, just before the value is freed
    destroyed: Notifier,
    /// Set while the destruction event runs, so weak upgrades fail
    dying: Cell<bool>,
}

/// The two co-owned allocations behind a live handle.
///
/// `meta` and `value` are cloned together, so the strong count of `meta`
/// is the number of live handles. The value lives in its own `Rc` so that
/// capability re-typing can lean on `Rc`'s unsized coercion and downcast
/// instead of reinterpreting memory.
struct Inner<T: ?Sized> {
    meta: Rc<Meta>,
    value: Rc<T>,
}

/// Releases one handle's share of a record.
///
/// On the last handle the destruction event fires while the value is
/// still alive; the record is marked dying first so observers cannot
/// upgrade a weak handle back into ownership.
fn release<T: ?Sized>(inner: Inner<T>) {
    if Rc::strong_count(&inner.meta) == 1 {
        inner.meta.dying.set(true);
        inner.meta.destroyed.notify();
        trace::record_destroyed(inner.meta.label.as_deref());
    }
}

/// An owning, copyable handle to a reference-counted record.
///
/// Cloning a handle shares the record; dropping the last clone frees the
/// value exactly once. A default-constructed handle is null: it refers to
/// no record and tolerates being cloned, assigned or discarded, but
/// dereferencing it is a contract violation and panics.
pub struct Handle<T: ?Sized> {
    inner: Option<Inner<T>>,
}

impl<T> Handle<T> {
    /// Create a record with count 1 holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::build(None, value)
    }

    /// Create a labelled record.
    ///
    /// The label shows up in [`Debug`] output and in the live-record
    /// accounting of [`trace`].
    #[must_use]
    pub fn with_label(label: impl Into<String>, value: T) -> Self {
        Self::build(Some(label.into()), value)
    }

    fn build(label: Option<String>, value: T) -> Self {
        trace::record_created(label.as_deref());
        let meta = Rc::new(Meta {
            label,
            destroyed: Notifier::new(),
            dying: Cell::new(false),
        });
        Self {
            inner: Some(Inner {
                meta,
                value: Rc::new(value),
            }),
        }
    }
}

impl<T: ?Sized> Handle<T> {
    /// A handle referring to no record.
    #[must_use]
    pub fn null() -> Self {
        Self { inner: None }
    }

    /// True iff this handle refers to a record.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Borrow the value, or `None` for a null handle.
    #[must_use]
    pub fn try_get(&self) -> Option<&T> {
        self.inner.as_ref().map(|inner| &*inner.value)
    }

    /// Borrow the value.
    ///
    /// # Panics
    ///
    /// Panics if the handle is null. Check [`Handle::is_valid`] or use
    /// [`Handle::try_get`] at boundaries where a null handle can occur.
    #[must_use]
    pub fn get(&self) -> &T {
        self.try_get().expect("dereferenced a null handle")
    }

    /// The debug label this record was created with, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.inner.as_ref().and_then(|inner| inner.meta.label.as_deref())
    }

    /// Number of live handles sharing this record; 0 for a null handle.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inner| Rc::strong_count(&inner.meta))
    }

    /// The record's destruction event.
    ///
    /// Connecting here observes the teardown without owning a share of
    /// the record: the event fires exactly once, while the value is still
    /// alive, when the last handle is released.
    ///
    /// # Panics
    ///
    /// Panics if the handle is null.
    #[must_use]
    pub fn destruction_event(&self) -> &Notifier {
        &self
            .inner
            .as_ref()
            .expect("null handle has no destruction event")
            .meta
            .destroyed
    }

    /// Create a non-owning handle to the same record.
    #[must_use]
    pub fn downgrade(&self) -> WeakHandle<T> {
        WeakHandle {
            inner: self.inner.as_ref().map(|inner| WeakInner {
                meta: Rc::downgrade(&inner.meta),
                value: Rc::downgrade(&inner.value),
            }),
        }
    }

    /// Release this handle's share of the record, leaving it null.
    ///
    /// Equivalent to assigning a null handle over it.
    pub fn detach(&mut self) {
        if let Some(inner) = self.inner.take() {
            release(inner);
        }
    }

    /// Re-view the record through a wider capability type.
    ///
    /// `coerce` must only unsize the pointer it is given, for example
    /// `handle.widen(|v| v as Rc<dyn Drawable>)`; the result refers to
    /// the same record and the same allocation.
    #[must_use]
    pub fn widen<U: ?Sized>(mut self, coerce: impl FnOnce(Rc<T>) -> Rc<U>) -> Handle<U> {
        match self.inner.take() {
            Some(inner) => {
                let before = Rc::as_ptr(&inner.value).cast::<()>();
                let value = coerce(inner.value);
                debug_assert!(
                    std::ptr::eq(before, Rc::as_ptr(&value).cast::<()>()),
                    "widen closure must re-view the same allocation"
                );
                Handle {
                    inner: Some(Inner {
                        meta: inner.meta,
                        value,
                    }),
                }
            }
            None => Handle::null(),
        }
    }
}

impl<T: Any> Handle<T> {
    /// Upcast to a type-erased handle over the same record.
    #[must_use]
    pub fn into_dyn(mut self) -> Handle<dyn Any> {
        match self.inner.take() {
            Some(inner) => {
                let value: Rc<dyn Any> = inner.value;
                Handle {
                    inner: Some(Inner {
                        meta: inner.meta,
                        value,
                    }),
                }
            }
            None => Handle::null(),
        }
    }
}

impl Handle<dyn Any> {
    /// Checked downcast back to a concrete type.
    ///
    /// On a type mismatch (or a null handle) the original handle is
    /// handed back unchanged, mirroring [`Rc::downcast`].
    pub fn downcast<T: Any>(mut self) -> Result<Handle<T>, Handle<dyn Any>> {
        match self.inner.take() {
            Some(inner) => match inner.value.downcast::<T>() {
                Ok(value) => Ok(Handle {
                    inner: Some(Inner {
                        meta: inner.meta,
                        value,
                    }),
                }),
                Err(value) => Err(Handle {
                    inner: Some(Inner {
                        meta: inner.meta,
                        value,
                    }),
                }),
            },
            None => Err(Handle::null()),
        }
    }
}

impl<T: ?Sized> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.as_ref().map(|inner| Inner {
                meta: Rc::clone(&inner.meta),
                value: Rc::clone(&inner.value),
            }),
        }
    }
}

impl<T: ?Sized> Drop for Handle<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            release(inner);
        }
    }
}

impl<T: ?Sized> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.get()
    }
}

impl<T: ?Sized> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Rc::ptr_eq(&a.meta, &b.meta),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ?Sized> Eq for Handle<T> {}

impl<T: ?Sized> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("Handle")
                .field("label", &inner.meta.label)
                .field("handles", &Rc::strong_count(&inner.meta))
                .finish(),
            None => f.write_str("Handle(null)"),
        }
    }
}

struct WeakInner<T: ?Sized> {
    meta: Weak<Meta>,
    value: Weak<T>,
}

/// A non-owning handle that does not keep the record alive.
///
/// Use [`WeakHandle::upgrade`] to regain ownership; it fails once the
/// record is gone, including while its destruction event is running, so
/// observers cannot resurrect a dying value.
pub struct WeakHandle<T: ?Sized> {
    inner: Option<WeakInner<T>>,
}

impl<T: ?Sized> WeakHandle<T> {
    /// A weak handle referring to no record.
    #[must_use]
    pub fn null() -> Self {
        Self { inner: None }
    }

    /// Attempt to regain an owning handle.
    #[must_use]
    pub fn upgrade(&self) -> Option<Handle<T>> {
        let inner = self.inner.as_ref()?;
        let meta = inner.meta.upgrade()?;
        if meta.dying.get() {
            return None;
        }
        let value = inner.value.upgrade()?;
        Some(Handle {
            inner: Some(Inner { meta, value }),
        })
    }

    /// True while the record is alive and not being torn down.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.as_ref().is_some_and(|inner| {
            inner
                .meta
                .upgrade()
                .is_some_and(|meta| !meta.dying.get())
        })
    }
}

impl<T: ?Sized> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.as_ref().map(|inner| WeakInner {
                meta: Weak::clone(&inner.meta),
                value: Weak::clone(&inner.value),
            }),
        }
    }
}

impl<T: ?Sized> Default for WeakHandle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle")
            .field("valid", &self.is_valid())
            .finish()
    }
}
