use super::{Cleanup, Readable, Subscription, Writable};
use crate::runtime::{Job, NotifyRuntime};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

type StartNotifier<T> = Box<dyn Fn(Setter<T>) -> Option<Cleanup>>;

struct SubscriberEntry<T> {
    run: Rc<dyn Fn(&T)>,
    invalidate: Rc<dyn Fn()>,
    // Cleared on unsubscribe so queued deliveries are dropped
    active: Cell<bool>,
}

struct StoreInner<T> {
    value: RefCell<T>,
    subscribers: RefCell<Vec<Rc<SubscriberEntry<T>>>>,
    start: Option<StartNotifier<T>>,
    stop: RefCell<Option<Cleanup>>,
    ready: Cell<bool>,
}

impl<T> StoreInner<T> {
    fn remove(&self, entry: &Rc<SubscriberEntry<T>>) {
        entry.active.set(false);
        let now_empty = {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.retain(|s| !Rc::ptr_eq(s, entry));
            subscribers.is_empty()
        };

        if now_empty && self.ready.get() {
            self.ready.set(false);
            let stop = self.stop.borrow_mut().take();
            if let Some(stop) = stop {
                tracing::trace!("store stopped");
                stop.run();
            }
        }
    }
}

/// A writable store holding a single value.
///
/// Subscribers receive the current value as soon as they subscribe and
/// again after every change. Setting a value equal to the current one
/// notifies nobody. An optional start notifier runs when the first
/// subscriber arrives, and the cleanup it returns runs when the last one
/// leaves.
pub struct Store<T> {
    inner: Rc<StoreInner<T>>,
}

impl<T: Clone + PartialEq + 'static> Store<T> {
    /// Create a new store with the given initial value.
    pub fn new(initial: T) -> Self {
        Self::build(initial, None)
    }

    /// Create a store whose `start` runs on the first subscription.
    ///
    /// `start` receives a [`Setter`] for the store and may return a
    /// [`Cleanup`] that runs when the last subscriber unsubscribes.
    ///
    /// # Examples
    ///
    /// ```
    /// use backflow::{Cleanup, Store};
    ///
    /// let clock = Store::with_start(0, |set| {
    ///     set.set(1);
    ///     Some(Cleanup::new(|| {}))
    /// });
    /// assert_eq!(clock.get(), 1);
    /// ```
    pub fn with_start<F>(initial: T, start: F) -> Self
    where
        F: Fn(Setter<T>) -> Option<Cleanup> + 'static,
    {
        Self::build(initial, Some(Box::new(start)))
    }

    fn build(initial: T, start: Option<StartNotifier<T>>) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                value: RefCell::new(initial),
                subscribers: RefCell::new(Vec::new()),
                start,
                stop: RefCell::new(None),
                ready: Cell::new(false),
            }),
        }
    }

    /// Get a clone of the current value.
    ///
    /// A store with a start notifier and no subscribers is started and
    /// stopped around the read so the value is current.
    pub fn get(&self) -> T {
        if self.inner.ready.get() || self.inner.start.is_none() {
            return self.inner.value.borrow().clone();
        }
        let subscription = self.subscribe(|_| {});
        let value = self.inner.value.borrow().clone();
        subscription.unsubscribe();
        value
    }

    /// Read the value without cloning and without starting the store.
    ///
    /// `f` must not write to this store.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let value = self.inner.value.borrow();
        f(&value)
    }

    /// Set a new value and notify subscribers if it changed.
    pub fn set(&self, new_value: T) {
        {
            let mut value = self.inner.value.borrow_mut();
            if *value == new_value {
                return;
            }
            *value = new_value;
        }
        self.notify();
    }

    /// Update the value using a function.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let mut next = self.inner.value.borrow().clone();
        f(&mut next);
        self.set(next);
    }

    /// Subscribe to value changes.
    ///
    /// The callback runs immediately with the current value.
    pub fn subscribe<F>(&self, run: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        self.subscribe_entry(Rc::new(run), Rc::new(|| {}))
    }

    /// A read-only handle to this store.
    pub fn read_only(&self) -> ReadOnlyStore<T> {
        ReadOnlyStore {
            store: self.clone(),
        }
    }

    /// Number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    fn subscribe_entry(&self, run: Rc<dyn Fn(&T)>, invalidate: Rc<dyn Fn()>) -> Subscription {
        let entry = Rc::new(SubscriberEntry {
            run,
            invalidate,
            active: Cell::new(true),
        });
        let first = {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            subscribers.push(Rc::clone(&entry));
            subscribers.len() == 1
        };

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            if first {
                self.start();
            }
            let current = self.inner.value.borrow().clone();
            (entry.run)(&current);
        }));
        if let Err(e) = result {
            self.inner.remove(&entry);
            std::panic::resume_unwind(e);
        }

        let store = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = store.upgrade() {
                inner.remove(&entry);
            }
        })
    }

    fn start(&self) {
        if let Some(start) = &self.inner.start {
            tracing::trace!("store started");
            let stop = start(Setter {
                target: Rc::downgrade(&self.inner),
            });
            *self.inner.stop.borrow_mut() = stop;
        }
        self.inner.ready.set(true);
    }

    fn notify(&self) {
        if !self.inner.ready.get() {
            return;
        }
        let value = Rc::new(self.inner.value.borrow().clone());
        let subscribers: Vec<_> = self.inner.subscribers.borrow().clone();

        for subscriber in &subscribers {
            (subscriber.invalidate)();
        }
        NotifyRuntime::schedule(subscribers.into_iter().map(|subscriber| {
            let value = Rc::clone(&value);
            Box::new(move || {
                if subscriber.active.get() {
                    (subscriber.run)(&value);
                }
            }) as Job
        }));
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Readable for Store<T> {
    type Value = T;

    fn subscribe_with_invalidate(&self, run: Rc<dyn Fn(&T)>, invalidate: Rc<dyn Fn()>) -> Subscription {
        self.subscribe_entry(run, invalidate)
    }

    fn get(&self) -> T {
        Store::get(self)
    }
}

impl<T: Clone + PartialEq + 'static> Writable for Store<T> {
    fn set(&self, value: T) {
        Store::set(self, value);
    }
}

/// Write access handed to start notifiers and asynchronous derivations.
///
/// Holds the store weakly: once the store is gone, writes are ignored.
pub struct Setter<T> {
    target: Weak<StoreInner<T>>,
}

impl<T: Clone + PartialEq + 'static> Setter<T> {
    /// Set the store's value, as [`Store::set`] would.
    pub fn set(&self, value: T) {
        if let Some(inner) = self.target.upgrade() {
            Store { inner }.set(value);
        }
    }

    /// Update the store's value in place, as [`Store::update`] would.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        if let Some(inner) = self.target.upgrade() {
            Store { inner }.update(f);
        }
    }
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            target: Weak::clone(&self.target),
        }
    }
}

/// A store that can be observed but not written from outside.
pub struct ReadOnlyStore<T> {
    store: Store<T>,
}

impl<T: Clone + PartialEq + 'static> ReadOnlyStore<T> {
    pub fn get(&self) -> T {
        self.store.get()
    }

    pub fn subscribe<F>(&self, run: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        self.store.subscribe(run)
    }
}

impl<T> Clone for ReadOnlyStore<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Readable for ReadOnlyStore<T> {
    type Value = T;

    fn subscribe_with_invalidate(&self, run: Rc<dyn Fn(&T)>, invalidate: Rc<dyn Fn()>) -> Subscription {
        self.store.subscribe_entry(run, invalidate)
    }

    fn get(&self) -> T {
        self.store.get()
    }
}

/// Create a read-only store whose value is driven by `start`.
pub fn readable<T, F>(initial: T, start: F) -> ReadOnlyStore<T>
where
    T: Clone + PartialEq + 'static,
    F: Fn(Setter<T>) -> Option<Cleanup> + 'static,
{
    Store::with_start(initial, start).read_only()
}
