//! The store contract.
//!
//! A store holds a value and tells subscribers about it: once immediately
//! on subscription, then after every change, in subscription order.
//! Writable stores accept `set` and `update`. Derived stores compute their
//! value from other stores and only listen to them while someone listens
//! to the derived store.
//!
//! Everything here is single-threaded. Deliveries are ordered by the
//! per-thread queue in [`crate::runtime`].

mod derived;
mod store;
mod subscription;

pub use derived::{derived, source, Derive, Derived, Sources};
pub use store::{readable, ReadOnlyStore, Setter, Store};
pub use subscription::{Cleanup, Subscription};

use std::cell::RefCell;
use std::rc::Rc;

/// A store that can be subscribed to.
///
/// Implementations must call `run` with the current value before
/// `subscribe_with_invalidate` returns. The provided [`get`](Readable::get)
/// and every derivation rely on that first delivery.
pub trait Readable {
    type Value: Clone + 'static;

    /// Subscribe with an extra `invalidate` callback.
    ///
    /// `invalidate` runs as soon as a change is announced, before any
    /// subscriber sees the new value. Derivations use it to hold off
    /// recomputing until every changed source has delivered.
    fn subscribe_with_invalidate(
        &self,
        run: Rc<dyn Fn(&Self::Value)>,
        invalidate: Rc<dyn Fn()>,
    ) -> Subscription;

    /// Subscribe to the value. `run` is called immediately and after every change.
    fn subscribe<F>(&self, run: F) -> Subscription
    where
        F: Fn(&Self::Value) + 'static,
        Self: Sized,
    {
        self.subscribe_with_invalidate(Rc::new(run), Rc::new(|| {}))
    }

    /// Read the current value through a short-lived subscription.
    ///
    /// # Panics
    ///
    /// Panics if the store does not deliver its value on subscribe.
    fn get(&self) -> Self::Value {
        let captured: Rc<RefCell<Option<Self::Value>>> = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&captured);
        let subscription = self.subscribe_with_invalidate(
            Rc::new(move |value: &Self::Value| *sink.borrow_mut() = Some(value.clone())),
            Rc::new(|| {}),
        );
        subscription.unsubscribe();
        let value = captured.borrow_mut().take();
        value.expect("readable stores deliver their value on subscribe")
    }
}

/// A store that also accepts new values.
pub trait Writable: Readable {
    fn set(&self, value: Self::Value);

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Self::Value),
        Self: Sized,
    {
        let mut value = self.get();
        f(&mut value);
        self.set(value);
    }
}

/// Point read of any store.
pub fn get<R>(store: &R) -> R::Value
where
    R: Readable + ?Sized,
{
    store.get()
}
