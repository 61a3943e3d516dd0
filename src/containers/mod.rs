//! Small generic plumbing shared by the rest of the crate.

use std::collections::BTreeMap;
use std::fmt;

/// Error returned by [`MapStore::get`] when a key is absent.
#[derive(Debug, thiserror::Error)]
#[error("key {key:?}: not found")]
pub struct NotFoundError {
    key: String,
}

/// A map with an accessor that turns a missing key into a typed error instead
/// of `None`, mirroring the Go `containers.MapStore` the original crate used
/// to resolve definitions, controllers and bindings by name.
#[derive(Debug, Default, Clone)]
pub struct MapStore<K, V>(BTreeMap<K, V>);

impl<K, V> MapStore<K, V>
where
    K: Ord + fmt::Debug,
{
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, k: &K) -> Result<&V, NotFoundError> {
        self.0.get(k).ok_or_else(|| NotFoundError {
            key: format!("{k:?}"),
        })
    }

    pub fn insert(&mut self, k: K, v: V) -> Option<V> {
        self.0.insert(k, v)
    }

    pub fn contains_key(&self, k: &K) -> bool {
        self.0.contains_key(k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.0.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for MapStore<K, V>
where
    K: Ord + fmt::Debug,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(BTreeMap::from_iter(iter))
    }
}
