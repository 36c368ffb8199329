//! Single-threaded value streams.
//!
//! [`Observable<T>`] is a shared, version-tracked cell with subscriber
//! callbacks. [`Subscription`] is the handle returned by `subscribe`; it
//! cancels on drop.
//!
//! # Invariants
//!
//! 1. The version increments exactly once per mutation that changes the value.
//! 2. Setting a value equal to the current one is a no-op.
//! 3. Subscribers run in ascending `order`, ties in registration order.
//! 4. A cancelled subscriber is never invoked again, even mid-cycle.
//! 5. When a callback sets the value again, the outer cycle stops delivering
//!    the superseded value.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = Box<dyn Fn(&T)>;

struct Subscriber<T> {
    id: u64,
    order: u64,
    active: Cell<bool>,
    callback: Callback<T>,
}

struct ObservableInner<T> {
    value: T,
    version: u64,
    next_id: u64,
    subscribers: Vec<Rc<Subscriber<T>>>,
}

/// A shared value with change notification.
///
/// Cloning an `Observable` yields another handle to the same value.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Store `value` and notify subscribers if it differs from the current one.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        if !self.replace(value) {
            return false;
        }
        self.notify();
        true
    }

    /// Store `value` without notifying anyone.
    pub fn replace(&self, value: T) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.value == value {
            return false;
        }
        inner.value = value;
        inner.version += 1;
        true
    }

    /// Deliver the current value to every active subscriber.
    pub fn notify(&self) {
        self.prune();
        let (version, value, subscribers) = {
            let inner = self.inner.borrow();
            (inner.version, inner.value.clone(), inner.subscribers.clone())
        };
        for subscriber in subscribers {
            if self.version() != version {
                break;
            }
            if subscriber.active.get() {
                (subscriber.callback)(&value);
            }
        }
    }

    /// Subscribe after every existing subscriber.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.subscribe_ordered(u64::MAX, callback)
    }

    /// Subscribe at a fixed position in the notification order.
    ///
    /// Lower `order` runs first. A subscriber that is cancelled and later
    /// re-registered with the same `order` returns to the same slot.
    pub fn subscribe_ordered(&self, order: u64, callback: impl Fn(&T) + 'static) -> Subscription {
        self.prune();
        let subscriber = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            let subscriber = Rc::new(Subscriber {
                id,
                order,
                active: Cell::new(true),
                callback: Box::new(callback),
            });
            let position = inner
                .subscribers
                .iter()
                .position(|s| s.order > order)
                .unwrap_or(inner.subscribers.len());
            inner.subscribers.insert(position, Rc::clone(&subscriber));
            subscriber
        };

        let weak_inner: Weak<RefCell<ObservableInner<T>>> = Rc::downgrade(&self.inner);
        let id = subscriber.id;
        let weak_subscriber = Rc::downgrade(&subscriber);
        Subscription::new(move || {
            if let Some(subscriber) = weak_subscriber.upgrade() {
                subscriber.active.set(false);
            }
            if let Some(inner) = weak_inner.upgrade() {
                // A failed borrow leaves the entry inactive for `prune`.
                let removed = match inner.try_borrow_mut() {
                    Ok(mut inner) => inner
                        .subscribers
                        .iter()
                        .position(|s| s.id == id)
                        .map(|position| inner.subscribers.remove(position)),
                    Err(_) => None,
                };
                drop(removed);
            }
        })
    }

    /// Drop cancelled subscribers whose removal was deferred.
    ///
    /// Removed callbacks are dropped after the borrow is released, since
    /// they may own subscriptions to this observable.
    fn prune(&self) {
        let stale: Vec<Rc<Subscriber<T>>> = {
            let mut inner = self.inner.borrow_mut();
            if inner.subscribers.iter().all(|s| s.active.get()) {
                return;
            }
            let (active, stale) = inner.subscribers.drain(..).partition(|s| s.active.get());
            inner.subscribers = active;
            stale
        };
        drop(stale);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|s| s.active.get())
            .count()
    }
}

/// Handle for a registered callback. Dropping it cancels the callback.
pub struct Subscription {
    cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: RefCell::new(Some(Box::new(cancel))),
        }
    }

    /// Remove the callback. Calling this more than once does nothing.
    pub fn cancel(&self) {
        let cancel = self.cancel.borrow_mut().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.borrow().is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
