use crate::error::{Result, StoreError};
use crate::store::{Readable, Sources, Writable};
use std::rc::Rc;

/// Stores a [`WritableDerived`](super::WritableDerived) derives from and
/// writes back to.
pub trait OriginSet: Sources + Clone {
    /// What a reflect callback produces for these origins.
    type Reflected: 'static;

    /// Apply `reflected` to the origins.
    ///
    /// `before_write` is called right before each individual store write.
    fn write_back(&self, reflected: Self::Reflected, before_write: &dyn Fn());

    /// Read every origin directly, without a standing subscription.
    fn current(&self) -> Option<Self::Values> {
        let items = self.readers().iter().map(|reader| reader.get()).collect();
        Self::collect(items)
    }
}

/// A single writable origin. Reflect returns the origin's new value.
pub struct SingleOrigin<T> {
    reader: Rc<dyn Readable<Value = T>>,
    writer: Rc<dyn Writable<Value = T>>,
}

impl<T: Clone + 'static> SingleOrigin<T> {
    pub fn new<S>(store: S) -> Self
    where
        S: Writable<Value = T> + 'static,
    {
        let shared = Rc::new(store);
        Self {
            reader: shared.clone(),
            writer: shared,
        }
    }
}

impl<T> Clone for SingleOrigin<T> {
    fn clone(&self) -> Self {
        Self {
            reader: Rc::clone(&self.reader),
            writer: Rc::clone(&self.writer),
        }
    }
}

impl<T: Clone + 'static> Sources for SingleOrigin<T> {
    type Item = T;
    type Values = T;

    fn readers(&self) -> Vec<Rc<dyn Readable<Value = T>>> {
        vec![Rc::clone(&self.reader)]
    }

    fn collect(items: Vec<T>) -> Option<T> {
        items.into_iter().next()
    }
}

impl<T: Clone + 'static> OriginSet for SingleOrigin<T> {
    type Reflected = T;

    fn write_back(&self, reflected: T, before_write: &dyn Fn()) {
        before_write();
        self.writer.set(reflected);
    }
}

/// One position in an [`OriginList`].
pub enum OriginSlot<T> {
    Writable {
        reader: Rc<dyn Readable<Value = T>>,
        writer: Rc<dyn Writable<Value = T>>,
    },
    ReadOnly(Rc<dyn Readable<Value = T>>),
}

impl<T: Clone + 'static> OriginSlot<T> {
    /// A slot that is read from and written back to.
    pub fn writable<S>(store: S) -> Self
    where
        S: Writable<Value = T> + 'static,
    {
        let shared = Rc::new(store);
        OriginSlot::Writable {
            reader: shared.clone(),
            writer: shared,
        }
    }

    /// A slot that is only read; reflected values for it are dropped.
    pub fn read_only<S>(store: S) -> Self
    where
        S: Readable<Value = T> + 'static,
    {
        OriginSlot::ReadOnly(Rc::new(store))
    }

    fn reader(&self) -> Rc<dyn Readable<Value = T>> {
        match self {
            OriginSlot::Writable { reader, .. } => Rc::clone(reader),
            OriginSlot::ReadOnly(reader) => Rc::clone(reader),
        }
    }
}

impl<T> Clone for OriginSlot<T> {
    fn clone(&self) -> Self {
        match self {
            OriginSlot::Writable { reader, writer } => OriginSlot::Writable {
                reader: Rc::clone(reader),
                writer: Rc::clone(writer),
            },
            OriginSlot::ReadOnly(reader) => OriginSlot::ReadOnly(Rc::clone(reader)),
        }
    }
}

/// An ordered, fixed-length list of origins sharing one value type.
///
/// Derive sees `Vec<T>` in slot order. Reflect returns one
/// `Option<T>` per slot; `None` leaves that origin alone.
pub struct OriginList<T> {
    slots: Vec<OriginSlot<T>>,
}

impl<T: Clone + 'static> OriginList<T> {
    pub fn new(slots: Vec<OriginSlot<T>>) -> Result<Self> {
        if slots.is_empty() {
            return Err(StoreError::NoOrigins);
        }
        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<T> Clone for OriginList<T> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

impl<T: Clone + 'static> Sources for OriginList<T> {
    type Item = T;
    type Values = Vec<T>;

    fn readers(&self) -> Vec<Rc<dyn Readable<Value = T>>> {
        self.slots.iter().map(OriginSlot::reader).collect()
    }

    fn collect(items: Vec<T>) -> Option<Vec<T>> {
        Some(items)
    }
}

impl<T: Clone + 'static> OriginSet for OriginList<T> {
    type Reflected = Vec<Option<T>>;

    fn write_back(&self, reflected: Vec<Option<T>>, before_write: &dyn Fn()) {
        if reflected.len() > self.slots.len() {
            tracing::trace!(
                origins = self.slots.len(),
                reflected = reflected.len(),
                "reflected values past the last origin ignored"
            );
        }

        for (index, (slot, value)) in self.slots.iter().zip(reflected).enumerate() {
            let Some(value) = value else {
                continue;
            };
            match slot {
                OriginSlot::Writable { writer, .. } => {
                    before_write();
                    writer.set(value);
                }
                OriginSlot::ReadOnly(_) => {
                    tracing::warn!(index, "reflected value for read-only origin ignored");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{readable, Store};
    use std::cell::Cell;

    #[test]
    fn empty_list_rejected() {
        let result = OriginList::<i32>::new(Vec::new());
        assert_eq!(result.err(), Some(StoreError::NoOrigins));
    }

    #[test]
    fn sparse_write_back_skips_missing_positions() {
        let stores: Vec<Store<i32>> = (1..=4).map(Store::new).collect();
        let origins = OriginList::new(stores.iter().cloned().map(OriginSlot::writable).collect()).unwrap();

        let writes = Cell::new(0);
        origins.write_back(vec![Some(5), None, Some(6)], &|| writes.set(writes.get() + 1));

        let values: Vec<i32> = stores.iter().map(Store::get).collect();
        assert_eq!(values, vec![5, 2, 6, 4]);
        assert_eq!(writes.get(), 2);
    }

    #[test]
    fn read_only_slot_is_never_written() {
        let writable = Store::new(1);
        let fixed = readable(2, |_| None);
        let origins = OriginList::new(vec![
            OriginSlot::writable(writable.clone()),
            OriginSlot::read_only(fixed.clone()),
        ])
        .unwrap();

        origins.write_back(vec![Some(10), Some(20)], &|| {});
        assert_eq!(writable.get(), 10);
        assert_eq!(fixed.get(), 2);
        assert_eq!(origins.current(), Some(vec![10, 2]));
    }
}
