//! Property path stores.
//!
//! A [`PathStore`] exposes one value nested inside a JSON document held
//! by another store. Reading it walks the path; setting it writes the
//! document back with only that member replaced.

mod path;

pub use path::{Path, PathKey};

use crate::bidirectional::{Reflect, SingleOrigin, WritableDerived};
use crate::error::{Result, StoreError};
use crate::store::{Derive, Writable};
use serde_json::Value;

/// A two-way store over the value at a path inside a JSON document.
pub type PathStore = WritableDerived<SingleOrigin<Value>, Value>;

/// Create a store for the value at `path` inside `origin`'s document.
///
/// The path is copied, so later changes to the caller's keys have no
/// effect. Missing members read as `null`.
///
/// # Examples
///
/// ```
/// use backflow::{create_path_store, Store};
/// use serde_json::json;
///
/// let form = Store::new(json!({ "user": { "name": "Ada" } }));
/// let name = create_path_store(form.clone(), ["user", "name"]).unwrap();
///
/// assert_eq!(name.get(), json!("Ada"));
/// name.set(json!("Grace"));
/// assert_eq!(form.get(), json!({ "user": { "name": "Grace" } }));
/// ```
pub fn create_path_store<S, P>(origin: S, path: P) -> Result<PathStore>
where
    S: Writable<Value = Value> + 'static,
    P: Into<Path>,
{
    let path = path.into();
    if path.is_empty() {
        return Err(StoreError::EmptyPath);
    }
    let read_path = path.clone();

    WritableDerived::new(
        SingleOrigin::new(origin),
        Derive::sync(move |root: &Value| read_path.lookup(root).cloned().unwrap_or(Value::Null)),
        Reflect::sync_with_old(move |leaf: &Value, old: &Value| {
            let mut root = old.clone();
            match path.assign(&mut root, leaf.clone()) {
                Some(()) => root,
                None => {
                    tracing::warn!(%path, "property path not reachable; document left unchanged");
                    old.clone()
                }
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use serde_json::json;

    #[test]
    fn single_key() {
        let origin = Store::new(json!({ "prop": 1 }));
        let store = create_path_store(origin.clone(), "prop").unwrap();

        assert_eq!(store.get(), json!(1));
        store.set(json!(2));
        assert_eq!(origin.get(), json!({ "prop": 2 }));
    }

    #[test]
    fn empty_path_rejected() {
        let origin = Store::new(json!({}));
        let keys: Vec<PathKey> = Vec::new();
        assert_eq!(create_path_store(origin, keys).err(), Some(StoreError::EmptyPath));
    }

    #[test]
    fn missing_member_reads_null() {
        let origin = Store::new(json!({ "a": {} }));
        let store = create_path_store(origin, ["a", "b"]).unwrap();
        assert_eq!(store.get(), Value::Null);
    }

    #[test]
    fn unreachable_path_leaves_document() {
        let origin = Store::new(json!({ "count": 4 }));
        let store = create_path_store(origin.clone(), ["count", "nested"]).unwrap();

        store.set(json!("x"));
        assert_eq!(origin.get(), json!({ "count": 4 }));
    }

    #[test]
    fn out_of_range_index_leaves_document() {
        let origin = Store::new(json!({ "a": [1] }));
        let store = create_path_store(origin.clone(), vec![PathKey::from("a"), PathKey::Index(usize::MAX)]).unwrap();

        store.set(json!(1));
        assert_eq!(origin.get(), json!({ "a": [1] }));
    }

    #[test]
    fn array_elements() {
        let origin = Store::new(json!({ "tags": ["a", "b"] }));
        let store = create_path_store(origin.clone(), vec![PathKey::from("tags"), PathKey::Index(1)]).unwrap();

        assert_eq!(store.get(), json!("b"));
        store.set(json!("c"));
        assert_eq!(origin.get(), json!({ "tags": ["a", "c"] }));
    }
}
