//! # Backflow
//!
//! Two-way derived stores for Rust.
//!
//! A derived store computes its value from other stores. Backflow's
//! [`WritableDerived`] also accepts writes and sends them back upstream,
//! which makes it a binding between a view of some state and the state
//! itself: a field of a form, a temperature in another unit, one cell of
//! a table.
//!
//! ## Store contract
//!
//! The [`store`] module provides the stores everything else is built on:
//! - `Store<T>` - writable value with subscribers and a start/stop hook
//! - `Derived<V>` - value computed from other stores, subscribed lazily
//! - `Readable` / `Writable` - the traits any store can implement
//!
//! ## Two-way stores
//!
//! - `WritableDerived<O, V>` - derive forward, reflect backward
//! - `PathStore` - a `WritableDerived` over one member of a JSON document
//!
//! Everything is single-threaded: stores are `Rc`-based and callbacks may
//! freely write to other stores while being notified.

pub mod bidirectional;
pub mod error;
pub mod path;
pub mod runtime;
pub mod store;

// Re-export main types for convenience
pub use bidirectional::{
    create_bidirectional_store, OriginList, OriginSet, OriginSlot, Reflect, SingleOrigin, Upstream,
    WritableDerived,
};
pub use error::StoreError;
pub use path::{create_path_store, Path, PathKey, PathStore};
pub use store::{get, Cleanup, Derive, Derived, Readable, Setter, Store, Subscription, Writable};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        // Basic smoke test
        let origin = Store::new(2);
        let squared = create_bidirectional_store(
            SingleOrigin::new(origin.clone()),
            Derive::sync(|n: &i32| n * n),
            Reflect::sync(|n: &i32| (*n as f64).sqrt() as i32),
        )
        .unwrap();
        assert_eq!(squared.get(), 4);
        squared.set(81);
        assert_eq!(origin.get(), 9);
    }
}
