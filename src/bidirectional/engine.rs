use super::reflect::Bridge;
use super::{OriginSet, Reflect, Upstream};
use crate::error::Result;
use crate::runtime::{Job, NotifyRuntime};
use crate::store::{Cleanup, Derive, Derived, Readable, Setter, Subscription, Writable};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct Engine<O: OriginSet, V> {
    bridge: Rc<Bridge<O>>,
    derived: Derived<V>,
    reflect: Reflect<V, O>,
    reflect_cleanup: RefCell<Option<Cleanup>>,
    // Ids of the latest update started and the latest one that reflected
    active_update: Cell<u64>,
    done_update: Cell<u64>,
}

impl<O: OriginSet, V: Clone + PartialEq + 'static> Engine<O, V> {
    fn reflect(&self, value: &V) {
        let previous = self.reflect_cleanup.borrow_mut().take();
        if let Some(previous) = previous {
            previous.run();
        }

        match &self.reflect {
            Reflect::Sync(f) => {
                let reflected = f(value);
                self.bridge.send_upstream(reflected);
            }
            Reflect::Async(f) => {
                let cleanup = f(value, Upstream::new(&self.bridge));
                self.keep_cleanup(cleanup);
            }
            Reflect::SyncWithOld(f) => {
                let Some(old) = self.bridge.old_values() else {
                    tracing::warn!("origin values unavailable; reflect skipped");
                    return;
                };
                let reflected = f(value, &old);
                self.bridge.send_upstream(reflected);
            }
            Reflect::AsyncWithOld(f) => {
                let Some(old) = self.bridge.old_values() else {
                    tracing::warn!("origin values unavailable; reflect skipped");
                    return;
                };
                let cleanup = f(value, &old, Upstream::new(&self.bridge));
                self.keep_cleanup(cleanup);
            }
        }
    }

    /// Close the transient subscription of update `update_id` and reflect
    /// the latest value it observed, unless a newer update already did.
    fn finish_update(&self, update_id: u64, probe: &UpdateProbe<V>, subscription: Subscription) {
        subscription.unsubscribe();

        let latest = probe.latest.borrow_mut().take();
        let Some(latest) = latest else {
            tracing::trace!(update_id, "value unchanged; reflect skipped");
            return;
        };
        if update_id <= self.done_update.get() {
            tracing::trace!(update_id, "nested update already reflected");
            return;
        }
        self.done_update.set(update_id);
        tracing::trace!(update_id, "reflecting to origins");
        self.reflect(&latest);
    }

    fn keep_cleanup(&self, cleanup: Option<Cleanup>) {
        // A reflect nested inside this one may have stored its own cleanup
        let displaced = std::mem::replace(&mut *self.reflect_cleanup.borrow_mut(), cleanup);
        if let Some(displaced) = displaced {
            displaced.run();
        }
    }
}

impl<O: OriginSet, V> Drop for Engine<O, V> {
    fn drop(&mut self) {
        if let Some(cleanup) = self.reflect_cleanup.get_mut().take() {
            cleanup.run();
        }
    }
}

/// What the transient subscription of one `update` observed.
struct UpdateProbe<V> {
    writing: Cell<bool>,
    old: RefCell<Option<V>>,
    latest: RefCell<Option<V>>,
}

/// A store derived from origin stores that also accepts writes and
/// reflects them back to those origins.
///
/// Reading works like [`Derived`]: origins are subscribed while this
/// store has subscribers, and every origin change runs the derive
/// callback. Writing through [`set`](Self::set) or
/// [`update`](Self::update) notifies subscribers first, then runs the
/// reflect callback once and writes its result to the origins. The
/// origin notification caused by that write-back does not derive again.
///
/// # Examples
///
/// ```
/// use backflow::{create_bidirectional_store, Derive, Reflect, SingleOrigin, Store};
///
/// let celsius = Store::new(100.0_f64);
/// let fahrenheit = create_bidirectional_store(
///     SingleOrigin::new(celsius.clone()),
///     Derive::sync(|c: &f64| c * 9.0 / 5.0 + 32.0),
///     Reflect::sync(|f: &f64| (f - 32.0) * 5.0 / 9.0),
/// )
/// .unwrap();
///
/// assert_eq!(fahrenheit.get(), 212.0);
/// fahrenheit.set(32.0);
/// assert_eq!(celsius.get(), 0.0);
/// ```
pub struct WritableDerived<O: OriginSet, V> {
    engine: Rc<Engine<O, V>>,
}

impl<O: OriginSet, V: Clone + PartialEq + 'static> WritableDerived<O, V> {
    /// Create a store starting from `V::default()`.
    pub fn new(origins: O, derive: Derive<O::Values, V>, reflect: Reflect<V, O>) -> Result<Self>
    where
        V: Default,
    {
        Self::with_initial(origins, derive, reflect, V::default())
    }

    /// Create a store whose value is `initial` until the first derivation
    /// sets one.
    pub fn with_initial(
        origins: O,
        derive: Derive<O::Values, V>,
        reflect: Reflect<V, O>,
        initial: V,
    ) -> Result<Self> {
        let sources = origins.clone();
        let bridge = Rc::new(Bridge::new(origins));
        let wrapped = wrap_derive(Rc::clone(&bridge), derive, reflect.wants_old());
        let derived = Derived::new(sources, wrapped, initial)?;

        Ok(Self {
            engine: Rc::new(Engine {
                bridge,
                derived,
                reflect,
                reflect_cleanup: RefCell::new(None),
                active_update: Cell::new(0),
                done_update: Cell::new(0),
            }),
        })
    }

    /// Get the current value.
    ///
    /// Without subscribers the origins are subscribed around the read.
    pub fn get(&self) -> V {
        self.engine.derived.get()
    }

    /// Subscribe to value changes.
    ///
    /// The callback runs immediately with the current value.
    pub fn subscribe<F>(&self, run: F) -> Subscription
    where
        F: Fn(&V) + 'static,
    {
        self.engine.derived.subscribe(run)
    }

    /// Set a new value and reflect it to the origins.
    pub fn set(&self, value: V) {
        self.update(move |current| *current = value);
    }

    /// Update the value using a function and reflect the result.
    ///
    /// Reflect runs after every subscriber has seen the new value. When a
    /// subscriber writes to this store again during the notification, the
    /// last value written is reflected, once. Nothing is reflected when
    /// the value did not change. Called while another store is notifying,
    /// the reflect waits until this write has been delivered.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut V),
    {
        let engine = &self.engine;
        let update_id = engine.active_update.get() + 1;
        engine.active_update.set(update_id);

        let probe = Rc::new(UpdateProbe {
            writing: Cell::new(false),
            old: RefCell::new(None),
            latest: RefCell::new(None),
        });
        let sink = Rc::clone(&probe);
        let subscription = engine.derived.subscribe(move |value| {
            if sink.writing.get() {
                *sink.latest.borrow_mut() = Some(value.clone());
            } else {
                *sink.old.borrow_mut() = Some(value.clone());
            }
        });

        let old = probe.old.borrow_mut().take();
        let Some(mut next) = old else {
            return;
        };
        f(&mut next);
        probe.writing.set(true);

        // Inside a running flush the write is only queued; decide after its deliveries
        let deferred = NotifyRuntime::is_flushing();
        engine.derived.store().set(next);
        if deferred {
            tracing::trace!(update_id, "reflect deferred until deliveries settle");
            let engine = Rc::clone(engine);
            NotifyRuntime::schedule([Box::new(move || engine.finish_update(update_id, &probe, subscription)) as Job]);
        } else {
            engine.finish_update(update_id, &probe, subscription);
        }
    }

    /// Number of subscribers currently attached.
    pub fn subscriber_count(&self) -> usize {
        self.engine.derived.store().subscriber_count()
    }
}

/// Route origin values to the user's derive unless they are the echo of
/// a write-back.
fn wrap_derive<O, V>(bridge: Rc<Bridge<O>>, derive: Derive<O::Values, V>, keep_values: bool) -> Derive<O::Values, V>
where
    O: OriginSet,
    V: Clone + PartialEq + 'static,
{
    Derive::asynchronous(move |values: &O::Values, setter: Setter<V>| {
        if keep_values {
            *bridge.last_values.borrow_mut() = Some(values.clone());
        }

        let user_cleanup = if bridge.block_next_derive.replace(false) {
            tracing::trace!("write-back echo not derived");
            None
        } else {
            match &derive {
                Derive::Sync(f) => {
                    setter.set(f(values));
                    None
                }
                Derive::Async(f) => f(values, setter),
            }
        };

        let bridge = Rc::clone(&bridge);
        Some(Cleanup::new(move || {
            *bridge.last_values.borrow_mut() = None;
            if let Some(cleanup) = user_cleanup {
                cleanup.run();
            }
        }))
    })
}

impl<O: OriginSet, V> Clone for WritableDerived<O, V> {
    fn clone(&self) -> Self {
        Self {
            engine: Rc::clone(&self.engine),
        }
    }
}

impl<O: OriginSet, V: Clone + PartialEq + 'static> Readable for WritableDerived<O, V> {
    type Value = V;

    fn subscribe_with_invalidate(&self, run: Rc<dyn Fn(&V)>, invalidate: Rc<dyn Fn()>) -> Subscription {
        self.engine.derived.subscribe_with_invalidate(run, invalidate)
    }

    fn get(&self) -> V {
        WritableDerived::get(self)
    }
}

impl<O: OriginSet, V: Clone + PartialEq + 'static> Writable for WritableDerived<O, V> {
    fn set(&self, value: V) {
        WritableDerived::set(self, value);
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut V),
        Self: Sized,
    {
        WritableDerived::update(self, f);
    }
}

/// Create a store derived from `origins` that reflects writes back to them.
///
/// The value starts as `V::default()`. To start from another value, or for
/// a `V` without `Default`, use [`WritableDerived::with_initial`]:
///
/// ```
/// use backflow::{Derive, Reflect, SingleOrigin, Store, WritableDerived};
///
/// let origin = Store::new(1);
/// let pending = WritableDerived::with_initial(
///     SingleOrigin::new(origin),
///     Derive::asynchronous(|_: &i32, _| None),
///     Reflect::sync(|n: &i32| *n),
///     -1,
/// )
/// .unwrap();
/// assert_eq!(pending.get(), -1);
/// ```
pub fn create_bidirectional_store<O, V>(
    origins: O,
    derive: Derive<O::Values, V>,
    reflect: Reflect<V, O>,
) -> Result<WritableDerived<O, V>>
where
    O: OriginSet,
    V: Clone + PartialEq + Default + 'static,
{
    WritableDerived::new(origins, derive, reflect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidirectional::SingleOrigin;
    use crate::store::Store;

    fn doubled(origin: &Store<i32>) -> WritableDerived<SingleOrigin<i32>, i32> {
        create_bidirectional_store(
            SingleOrigin::new(origin.clone()),
            Derive::sync(|n: &i32| n * 2),
            Reflect::sync(|n: &i32| n / 2),
        )
        .unwrap()
    }

    #[test]
    fn reads_and_writes_through() {
        let origin = Store::new(3);
        let store = doubled(&origin);

        assert_eq!(store.get(), 6);
        store.set(10);
        assert_eq!(origin.get(), 5);
        assert_eq!(store.get(), 10);
    }

    #[test]
    fn update_ids_advance() {
        let origin = Store::new(1);
        let store = doubled(&origin);

        store.update(|n| *n += 2);
        store.update(|n| *n += 2);
        assert_eq!(store.engine.active_update.get(), 2);
        assert_eq!(store.engine.done_update.get(), 2);
        assert_eq!(origin.get(), 3);
    }

    #[test]
    fn unchanged_update_does_not_mark_done() {
        let origin = Store::new(1);
        let store = doubled(&origin);

        store.update(|_| {});
        assert_eq!(store.engine.active_update.get(), 1);
        assert_eq!(store.engine.done_update.get(), 0);
    }

    #[test]
    fn old_values_cleared_when_unsubscribed() {
        let origin = Store::new(1);
        let store = create_bidirectional_store(
            SingleOrigin::new(origin.clone()),
            Derive::sync(|n: &i32| *n),
            Reflect::sync_with_old(|n: &i32, _old: &i32| *n),
        )
        .unwrap();

        let subscription = store.subscribe(|_| {});
        assert_eq!(*store.engine.bridge.last_values.borrow(), Some(1));
        subscription.unsubscribe();
        assert_eq!(*store.engine.bridge.last_values.borrow(), None);
    }

    #[test]
    fn pending_reflect_cleanup_runs_on_drop() {
        let origin = Store::new(0);
        let cleaned = Rc::new(Cell::new(false));
        let cleaned_clone = cleaned.clone();
        let store = create_bidirectional_store(
            SingleOrigin::new(origin),
            Derive::sync(|n: &i32| *n),
            Reflect::asynchronous(move |_: &i32, _upstream| {
                let cleaned = cleaned_clone.clone();
                Some(Cleanup::new(move || cleaned.set(true)))
            }),
        )
        .unwrap();

        store.set(1);
        assert!(!cleaned.get());
        drop(store);
        assert!(cleaned.get());
    }
}
