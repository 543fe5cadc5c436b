//! Two-way derived stores.
//!
//! A [`WritableDerived`] reads like a derived store and writes like a
//! writable one: values set on it are reflected back to its origins.
//! - [`SingleOrigin`] and [`OriginList`] pick the origins
//! - [`Derive`](crate::store::Derive) maps origin values forward
//! - [`Reflect`] maps new values back, optionally with the old origin values

mod engine;
mod origins;
mod reflect;

pub use engine::{create_bidirectional_store, WritableDerived};
pub use origins::{OriginList, OriginSet, OriginSlot, SingleOrigin};
pub use reflect::{Reflect, Upstream};
