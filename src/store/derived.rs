use super::{Cleanup, Readable, Setter, Store, Subscription};
use crate::error::{Result, StoreError};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// How a derivation turns source values into its own value.
pub enum Derive<A, V> {
    /// The return value becomes the derived value.
    Sync(Box<dyn Fn(&A) -> V>),
    /// The callback sets the value through the [`Setter`], now or later.
    /// A returned [`Cleanup`] runs before the next call and when the
    /// derivation stops.
    Async(Box<dyn Fn(&A, Setter<V>) -> Option<Cleanup>>),
}

impl<A, V> Derive<A, V> {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&A) -> V + 'static,
    {
        Derive::Sync(Box::new(f))
    }

    pub fn asynchronous<F>(f: F) -> Self
    where
        F: Fn(&A, Setter<V>) -> Option<Cleanup> + 'static,
    {
        Derive::Async(Box::new(f))
    }
}

/// One or more stores a derivation reads from.
///
/// `Values` is what the derive callback sees: the bare value for a single
/// source, a vector for a list.
pub trait Sources: 'static {
    type Item: Clone + 'static;
    type Values: Clone + 'static;

    fn readers(&self) -> Vec<Rc<dyn Readable<Value = Self::Item>>>;

    /// Shape the per-source values, in source order, into `Values`.
    fn collect(items: Vec<Self::Item>) -> Option<Self::Values>;
}

impl<T: Clone + 'static> Sources for Rc<dyn Readable<Value = T>> {
    type Item = T;
    type Values = T;

    fn readers(&self) -> Vec<Rc<dyn Readable<Value = T>>> {
        vec![Rc::clone(self)]
    }

    fn collect(items: Vec<T>) -> Option<T> {
        items.into_iter().next()
    }
}

impl<T: Clone + 'static> Sources for Vec<Rc<dyn Readable<Value = T>>> {
    type Item = T;
    type Values = Vec<T>;

    fn readers(&self) -> Vec<Rc<dyn Readable<Value = T>>> {
        self.clone()
    }

    fn collect(items: Vec<T>) -> Option<Vec<T>> {
        Some(items)
    }
}

/// Share any store as a derivation source.
pub fn source<S>(store: &S) -> Rc<dyn Readable<Value = S::Value>>
where
    S: Readable + Clone + 'static,
{
    Rc::new(store.clone())
}

/// Per-start state of a running derivation.
struct DerivedRun<S: Sources, V> {
    values: RefCell<Vec<Option<S::Item>>>,
    // Sources that announced a change but have not delivered it yet
    pending: RefCell<Vec<bool>>,
    started: Cell<bool>,
    cleanup: RefCell<Option<Cleanup>>,
    compute: Rc<Derive<S::Values, V>>,
    setter: Setter<V>,
}

impl<S: Sources, V: Clone + PartialEq + 'static> DerivedRun<S, V> {
    fn sync(&self) {
        if self.pending.borrow().iter().any(|pending| *pending) {
            return;
        }

        let previous = self.cleanup.borrow_mut().take();
        if let Some(previous) = previous {
            previous.run();
        }

        let items: Option<Vec<S::Item>> = self.values.borrow().iter().cloned().collect();
        let Some(values) = items.and_then(S::collect) else {
            return;
        };

        match &*self.compute {
            Derive::Sync(f) => self.setter.set(f(&values)),
            Derive::Async(f) => {
                let cleanup = f(&values, self.setter.clone());
                *self.cleanup.borrow_mut() = cleanup;
            }
        }
    }

    fn stop(&self) {
        self.started.set(false);
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup.run();
        }
    }
}

/// A read-only store computed from one or more sources.
///
/// Sources are subscribed only while the derived store has subscribers.
/// When one change reaches the derivation through several paths, it
/// recomputes once, after every affected source has delivered.
pub struct Derived<V> {
    store: Store<V>,
}

impl<V: Clone + PartialEq + 'static> Derived<V> {
    /// Create a derivation over `sources`.
    ///
    /// # Examples
    ///
    /// ```
    /// use backflow::store::{source, Derive, Derived};
    /// use backflow::Store;
    ///
    /// let count = Store::new(2);
    /// let doubled = Derived::new(source(&count), Derive::sync(|n: &i32| n * 2), 0).unwrap();
    /// assert_eq!(doubled.get(), 4);
    /// ```
    pub fn new<S: Sources>(sources: S, compute: Derive<S::Values, V>, initial: V) -> Result<Self> {
        let readers = sources.readers();
        if readers.is_empty() {
            return Err(StoreError::NoOrigins);
        }
        let compute = Rc::new(compute);

        let store = Store::with_start(initial, move |setter| {
            let run = Rc::new(DerivedRun::<S, V> {
                values: RefCell::new(vec![None; readers.len()]),
                pending: RefCell::new(vec![false; readers.len()]),
                started: Cell::new(false),
                cleanup: RefCell::new(None),
                compute: Rc::clone(&compute),
                setter,
            });

            let subscriptions: Vec<Subscription> = readers
                .iter()
                .enumerate()
                .map(|(index, reader)| {
                    let on_value = Rc::clone(&run);
                    let on_invalidate = Rc::clone(&run);
                    reader.subscribe_with_invalidate(
                        Rc::new(move |value: &S::Item| {
                            on_value.values.borrow_mut()[index] = Some(value.clone());
                            on_value.pending.borrow_mut()[index] = false;
                            if on_value.started.get() {
                                on_value.sync();
                            }
                        }),
                        Rc::new(move || on_invalidate.pending.borrow_mut()[index] = true),
                    )
                })
                .collect();

            run.started.set(true);
            run.sync();

            Some(Cleanup::new(move || {
                drop(subscriptions);
                run.stop();
            }))
        });

        Ok(Self { store })
    }

    pub fn get(&self) -> V {
        self.store.get()
    }

    pub fn subscribe<F>(&self, run: F) -> Subscription
    where
        F: Fn(&V) + 'static,
    {
        self.store.subscribe(run)
    }

    /// Write straight into the derived value, bypassing the sources.
    pub(crate) fn store(&self) -> &Store<V> {
        &self.store
    }
}

impl<V> Clone for Derived<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<V: Clone + PartialEq + 'static> Readable for Derived<V> {
    type Value = V;

    fn subscribe_with_invalidate(&self, run: Rc<dyn Fn(&V)>, invalidate: Rc<dyn Fn()>) -> Subscription {
        self.store.subscribe_with_invalidate(run, invalidate)
    }

    fn get(&self) -> V {
        self.store.get()
    }
}

/// Create a derivation over `sources`.
pub fn derived<S, V>(sources: S, compute: Derive<S::Values, V>, initial: V) -> Result<Derived<V>>
where
    S: Sources,
    V: Clone + PartialEq + 'static,
{
    Derived::new(sources, compute, initial)
}
