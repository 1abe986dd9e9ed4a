// Copyright 2015-2024 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Key-value stores backing the zone and server caches

use std::{collections::HashMap, marker::PhantomData};

use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::Mutex;

use crate::config::CacheBackend;

/// The operations every cache backend supports.
///
/// All operations take `&self` and are safe to call from many tasks at once.
/// Values are cloned out of the map; nothing borrowed from a backend outlives
/// the call.
pub trait Map<V: Clone>: Send + Sync {
    /// Store a value, replacing any previous one
    fn set(&self, key: &str, value: V);

    /// Fetch a copy of the value
    fn get(&self, key: &str) -> Option<V>;

    /// Remove the value, returning it
    fn remove(&self, key: &str) -> Option<V>;

    /// Returns true if the key has a value
    fn has(&self, key: &str) -> bool;

    /// All keys currently stored
    fn keys(&self) -> Vec<String>;

    /// A snapshot of every key and value
    fn iter(&self) -> Vec<(String, V)>;

    /// Number of stored values
    fn count(&self) -> usize;

    /// Remove everything
    fn clear(&self);

    /// Store the result of merging the new value with the existing one, if any
    fn upsert<F>(&self, key: &str, value: V, merge: F) -> V
    where
        F: FnOnce(Option<&V>, V) -> V;
}

/// Sharded map, safe for heavy concurrent use
pub struct ConcurrentMap<V>(DashMap<String, V>);

impl<V> Default for ConcurrentMap<V> {
    fn default() -> Self {
        Self(DashMap::new())
    }
}

impl<V: Clone + Send + Sync> Map<V> for ConcurrentMap<V> {
    fn set(&self, key: &str, value: V) {
        self.0.insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<V> {
        self.0.get(key).map(|entry| entry.value().clone())
    }

    fn remove(&self, key: &str) -> Option<V> {
        self.0.remove(key).map(|(_, value)| value)
    }

    fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        self.0.iter().map(|entry| entry.key().clone()).collect()
    }

    fn iter(&self) -> Vec<(String, V)> {
        self.0
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    fn count(&self) -> usize {
        self.0.len()
    }

    fn clear(&self) {
        self.0.clear();
    }

    fn upsert<F>(&self, key: &str, value: V, merge: F) -> V
    where
        F: FnOnce(Option<&V>, V) -> V,
    {
        match self.0.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let merged = merge(Some(entry.get()), value);
                entry.insert(merged.clone());
                merged
            }
            Entry::Vacant(entry) => {
                let merged = merge(None, value);
                entry.insert(merged.clone());
                merged
            }
        }
    }
}

/// A single map behind one lock
pub struct SimpleMap<V>(Mutex<HashMap<String, V>>);

impl<V> Default for SimpleMap<V> {
    fn default() -> Self {
        Self(Mutex::new(HashMap::new()))
    }
}

impl<V: Clone + Send> Map<V> for SimpleMap<V> {
    fn set(&self, key: &str, value: V) {
        self.0.lock().insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<V> {
        self.0.lock().get(key).cloned()
    }

    fn remove(&self, key: &str) -> Option<V> {
        self.0.lock().remove(key)
    }

    fn has(&self, key: &str) -> bool {
        self.0.lock().contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        self.0.lock().keys().cloned().collect()
    }

    fn iter(&self) -> Vec<(String, V)> {
        self.0
            .lock()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn count(&self) -> usize {
        self.0.lock().len()
    }

    fn clear(&self) {
        self.0.lock().clear();
    }

    fn upsert<F>(&self, key: &str, value: V, merge: F) -> V
    where
        F: FnOnce(Option<&V>, V) -> V,
    {
        let mut map = self.0.lock();
        let merged = merge(map.get(key), value);
        map.insert(key.to_string(), merged.clone());
        merged
    }
}

/// Stores nothing, every lookup is a miss.
///
/// Useful in tests to force every name to be resolved from the network.
pub struct NoopMap<V>(PhantomData<fn() -> V>);

impl<V> Default for NoopMap<V> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<V: Clone> Map<V> for NoopMap<V> {
    fn set(&self, _key: &str, _value: V) {}

    fn get(&self, _key: &str) -> Option<V> {
        None
    }

    fn remove(&self, _key: &str) -> Option<V> {
        None
    }

    fn has(&self, _key: &str) -> bool {
        false
    }

    fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn iter(&self) -> Vec<(String, V)> {
        Vec::new()
    }

    fn count(&self) -> usize {
        0
    }

    fn clear(&self) {}

    fn upsert<F>(&self, _key: &str, value: V, merge: F) -> V
    where
        F: FnOnce(Option<&V>, V) -> V,
    {
        merge(None, value)
    }
}

/// A cache with its backend chosen once, from configuration
pub enum CacheMap<V> {
    /// See [`ConcurrentMap`]
    Concurrent(ConcurrentMap<V>),
    /// See [`SimpleMap`]
    Simple(SimpleMap<V>),
    /// See [`NoopMap`]
    Noop(NoopMap<V>),
}

impl<V> CacheMap<V> {
    /// Construct an empty cache for the backend
    pub fn new(backend: CacheBackend) -> Self {
        match backend {
            CacheBackend::Concurrent => Self::Concurrent(ConcurrentMap::default()),
            CacheBackend::Simple => Self::Simple(SimpleMap::default()),
            CacheBackend::Noop => Self::Noop(NoopMap::default()),
        }
    }

    /// The backend in use
    pub fn backend(&self) -> CacheBackend {
        match self {
            Self::Concurrent(_) => CacheBackend::Concurrent,
            Self::Simple(_) => CacheBackend::Simple,
            Self::Noop(_) => CacheBackend::Noop,
        }
    }
}

impl<V> Default for CacheMap<V> {
    fn default() -> Self {
        Self::new(CacheBackend::default())
    }
}

macro_rules! dispatch {
    ($self:ident, $map:ident => $call:expr) => {
        match $self {
            CacheMap::Concurrent($map) => $call,
            CacheMap::Simple($map) => $call,
            CacheMap::Noop($map) => $call,
        }
    };
}

impl<V: Clone + Send + Sync> Map<V> for CacheMap<V> {
    fn set(&self, key: &str, value: V) {
        dispatch!(self, map => map.set(key, value))
    }

    fn get(&self, key: &str) -> Option<V> {
        dispatch!(self, map => map.get(key))
    }

    fn remove(&self, key: &str) -> Option<V> {
        dispatch!(self, map => map.remove(key))
    }

    fn has(&self, key: &str) -> bool {
        dispatch!(self, map => map.has(key))
    }

    fn keys(&self) -> Vec<String> {
        dispatch!(self, map => map.keys())
    }

    fn iter(&self) -> Vec<(String, V)> {
        dispatch!(self, map => map.iter())
    }

    fn count(&self) -> usize {
        dispatch!(self, map => map.count())
    }

    fn clear(&self) {
        dispatch!(self, map => map.clear())
    }

    fn upsert<F>(&self, key: &str, value: V, merge: F) -> V
    where
        F: FnOnce(Option<&V>, V) -> V,
    {
        dispatch!(self, map => map.upsert(key, value, merge))
    }
}
