use super::OriginSet;
use crate::runtime::{Job, NotifyRuntime};
use crate::store::Cleanup;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// How new values of a [`WritableDerived`](super::WritableDerived) are
/// sent back to its origins.
///
/// The `WithOld` forms also receive the origin values the last derivation
/// saw, which is what lets a reflect patch one field of a larger value.
pub enum Reflect<V, O: OriginSet> {
    /// Return the new origin value(s); they are written back immediately.
    Sync(Box<dyn Fn(&V) -> O::Reflected>),
    /// Write back through [`Upstream`] whenever ready.
    Async(Box<dyn Fn(&V, Upstream<O>) -> Option<Cleanup>>),
    /// Like `Sync`, also given the origin values the last derivation saw.
    SyncWithOld(Box<dyn Fn(&V, &O::Values) -> O::Reflected>),
    /// Like `Async`, also given the origin values the last derivation saw.
    AsyncWithOld(Box<dyn Fn(&V, &O::Values, Upstream<O>) -> Option<Cleanup>>),
}

impl<V, O: OriginSet> Reflect<V, O> {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&V) -> O::Reflected + 'static,
    {
        Reflect::Sync(Box::new(f))
    }

    pub fn asynchronous<F>(f: F) -> Self
    where
        F: Fn(&V, Upstream<O>) -> Option<Cleanup> + 'static,
    {
        Reflect::Async(Box::new(f))
    }

    /// Reflect from the new value and the old origin values.
    pub fn sync_with_old<F>(f: F) -> Self
    where
        F: Fn(&V, &O::Values) -> O::Reflected + 'static,
    {
        Reflect::SyncWithOld(Box::new(f))
    }

    /// Write back later, given the new value and the old origin values.
    pub fn asynchronous_with_old<F>(f: F) -> Self
    where
        F: Fn(&V, &O::Values, Upstream<O>) -> Option<Cleanup> + 'static,
    {
        Reflect::AsyncWithOld(Box::new(f))
    }

    pub(crate) fn wants_old(&self) -> bool {
        matches!(self, Reflect::SyncWithOld(_) | Reflect::AsyncWithOld(_))
    }
}

/// State shared by the engine, its derivation and every [`Upstream`].
pub(crate) struct Bridge<O: OriginSet> {
    pub(crate) origins: O,
    // Set right before each write-back write, consumed by the echo it causes
    pub(crate) block_next_derive: Cell<bool>,
    pub(crate) last_values: RefCell<Option<O::Values>>,
}

impl<O: OriginSet> Bridge<O> {
    pub(crate) fn new(origins: O) -> Self {
        Self {
            origins,
            block_next_derive: Cell::new(false),
            last_values: RefCell::new(None),
        }
    }

    pub(crate) fn send_upstream(self: &Rc<Self>, reflected: O::Reflected) {
        if NotifyRuntime::is_flushing() {
            // Echoes are queued behind the running flush: arm the flag right
            // before each one is delivered and clear it after the last.
            self.origins.write_back(reflected, &|| {
                let bridge = Rc::clone(self);
                NotifyRuntime::schedule([Box::new(move || bridge.block_next_derive.set(true)) as Job]);
            });
            let bridge = Rc::clone(self);
            NotifyRuntime::schedule([Box::new(move || bridge.block_next_derive.set(false)) as Job]);
            return;
        }

        let _reset = EchoReset(&self.block_next_derive);
        self.origins
            .write_back(reflected, &|| self.block_next_derive.set(true));
    }

    /// Origin values seen by the running derivation, or read fresh when
    /// nothing is subscribed.
    pub(crate) fn old_values(&self) -> Option<O::Values> {
        let cached = self.last_values.borrow().clone();
        cached.or_else(|| self.origins.current())
    }
}

struct EchoReset<'a>(&'a Cell<bool>);

impl Drop for EchoReset<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Write-back handle given to asynchronous reflect callbacks.
///
/// May be kept and used later; each `send` is one write-back batch.
pub struct Upstream<O: OriginSet> {
    bridge: Rc<Bridge<O>>,
}

impl<O: OriginSet> Upstream<O> {
    pub(crate) fn new(bridge: &Rc<Bridge<O>>) -> Self {
        Self {
            bridge: Rc::clone(bridge),
        }
    }

    pub fn send(&self, reflected: O::Reflected) {
        tracing::trace!("deferred write-back");
        self.bridge.send_upstream(reflected);
    }
}

impl<O: OriginSet> Clone for Upstream<O> {
    fn clone(&self) -> Self {
        Self {
            bridge: Rc::clone(&self.bridge),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidirectional::SingleOrigin;
    use crate::store::Store;

    #[test]
    fn echo_flag_cleared_after_write_back() {
        let origin = Store::new(0);
        let bridge = Rc::new(Bridge::new(SingleOrigin::new(origin.clone())));

        bridge.send_upstream(3);
        assert_eq!(origin.get(), 3);
        assert!(!bridge.block_next_derive.get());
    }

    #[test]
    fn echo_flag_cleared_when_write_panics() {
        let origin = Store::new(0);
        let _subscription = origin.subscribe(|value| {
            if *value == 13 {
                panic!("unlucky");
            }
        });
        let bridge = Rc::new(Bridge::new(SingleOrigin::new(origin.clone())));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| bridge.send_upstream(13)));
        assert!(result.is_err());
        assert!(!bridge.block_next_derive.get());
    }

    #[test]
    fn echo_flag_armed_for_queued_echo() {
        let origin = Store::new(0);
        let bridge = Rc::new(Bridge::new(SingleOrigin::new(origin.clone())));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let (seen_clone, watched) = (seen.clone(), bridge.clone());
        let _subscription = origin.subscribe(move |value| {
            seen_clone.borrow_mut().push((*value, watched.block_next_derive.get()));
        });

        let sender = bridge.clone();
        NotifyRuntime::schedule([Box::new(move || {
            sender.send_upstream(4);
            assert!(!sender.block_next_derive.get());
        }) as Job]);

        assert_eq!(*seen.borrow(), vec![(0, false), (4, true)]);
        assert!(!bridge.block_next_derive.get());
    }

    #[test]
    fn old_values_fall_back_to_origins() {
        let origin = Store::new(8);
        let bridge = Bridge::new(SingleOrigin::new(origin.clone()));
        assert_eq!(bridge.old_values(), Some(8));

        *bridge.last_values.borrow_mut() = Some(2);
        assert_eq!(bridge.old_values(), Some(2));
    }

    #[test]
    fn with_old_forms_flagged() {
        let plain: Reflect<i32, SingleOrigin<i32>> = Reflect::sync(|v: &i32| *v);
        let with_old: Reflect<i32, SingleOrigin<i32>> = Reflect::sync_with_old(|_: &i32, old: &i32| *old);
        assert!(!plain.wants_old());
        assert!(with_old.wants_old());
    }
}
