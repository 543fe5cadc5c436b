use serde_json::{Map, Value};
use std::fmt;

/// One step into a JSON value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathKey {
    /// Object member.
    Field(String),
    /// Array element.
    Index(usize),
}

impl From<&str> for PathKey {
    fn from(name: &str) -> Self {
        PathKey::Field(name.to_string())
    }
}

impl From<String> for PathKey {
    fn from(name: String) -> Self {
        PathKey::Field(name)
    }
}

impl From<usize> for PathKey {
    fn from(index: usize) -> Self {
        PathKey::Index(index)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Field(name) => write!(f, ".{name}"),
            PathKey::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// An owned sequence of keys from a root value to a leaf.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path {
    keys: Vec<PathKey>,
}

impl Path {
    pub fn new(keys: Vec<PathKey>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[PathKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The value at this path, if every step exists.
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.keys.iter().try_fold(root, |node, key| match key {
            PathKey::Field(name) => node.get(name.as_str()),
            PathKey::Index(index) => node.get(*index),
        })
    }

    /// Store `leaf` at this path inside `root`.
    ///
    /// Missing members and `null` parents become empty objects or arrays,
    /// and short arrays are padded with `null`. Returns `None`, leaving
    /// earlier steps possibly created, when a parent has the wrong kind or
    /// an index lies too far past the end of its array.
    pub fn assign(&self, root: &mut Value, leaf: Value) -> Option<()> {
        let mut node = root;
        for key in &self.keys {
            node = slot_mut(node, key)?;
        }
        *node = leaf;
        Some(())
    }
}

/// Most `null` elements one assignment may append before its index.
const MAX_PADDING: usize = 4096;

fn slot_mut<'a>(node: &'a mut Value, key: &PathKey) -> Option<&'a mut Value> {
    match key {
        PathKey::Field(name) => {
            if node.is_null() {
                *node = Value::Object(Map::new());
            }
            let map = node.as_object_mut()?;
            Some(map.entry(name.clone()).or_insert(Value::Null))
        }
        PathKey::Index(index) => {
            if node.is_null() {
                *node = Value::Array(Vec::new());
            }
            let array = node.as_array_mut()?;
            if array.len() <= *index {
                if *index - array.len() > MAX_PADDING {
                    return None;
                }
                array.resize(index.checked_add(1)?, Value::Null);
            }
            array.get_mut(*index)
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in &self.keys {
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

impl From<PathKey> for Path {
    fn from(key: PathKey) -> Self {
        Self::new(vec![key])
    }
}

impl From<&str> for Path {
    fn from(name: &str) -> Self {
        PathKey::from(name).into()
    }
}

impl From<String> for Path {
    fn from(name: String) -> Self {
        PathKey::from(name).into()
    }
}

impl From<usize> for Path {
    fn from(index: usize) -> Self {
        PathKey::from(index).into()
    }
}

impl<K: Into<PathKey>> From<Vec<K>> for Path {
    fn from(keys: Vec<K>) -> Self {
        Self::new(keys.into_iter().map(Into::into).collect())
    }
}

impl<K: Clone + Into<PathKey>> From<&[K]> for Path {
    fn from(keys: &[K]) -> Self {
        Self::new(keys.iter().cloned().map(Into::into).collect())
    }
}

impl<K: Into<PathKey>, const N: usize> From<[K; N]> for Path {
    fn from(keys: [K; N]) -> Self {
        Self::new(keys.into_iter().map(Into::into).collect())
    }
}
