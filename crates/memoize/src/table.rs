// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-partition entry storage.

use std::{
    any::Any,
    fmt::{self, Debug},
    hash::Hash,
    sync::Arc,
};

use hashbrown::{HashMap, hash_map::Entry};
use parking_lot::RwLock;

use crate::TypeTag;

/// A stored value together with the tag of the type it was stored as.
#[derive(Clone)]
pub(crate) struct Payload {
    tag: TypeTag,
    value: Arc<dyn Any + Send + Sync>,
}

impl Payload {
    pub(crate) fn new<V>(value: V) -> Self
    where
        V: Send + Sync + 'static,
    {
        Self {
            tag: TypeTag::of::<V>(),
            value: Arc::new(value),
        }
    }

    pub(crate) fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Returns a copy of the payload as `V`, or `None` if it was stored as another type.
    pub(crate) fn narrow<V>(&self) -> Option<V>
    where
        V: Clone + 'static,
    {
        if self.tag != TypeTag::of::<V>() {
            return None;
        }
        self.value.as_ref().downcast_ref::<V>().cloned()
    }
}

impl Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload").field("tag", &self.tag).finish_non_exhaustive()
    }
}

/// Key to payload map of one partition.
///
/// Lookups share a read lock. Insertion takes the write lock only for the map update and
/// never replaces an existing entry.
pub(crate) struct EntryTable<K> {
    entries: RwLock<HashMap<K, Payload>>,
}

impl<K> EntryTable<K> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}

impl<K> EntryTable<K>
where
    K: Eq + Hash,
{
    pub(crate) fn lookup(&self, key: &K) -> Option<Payload> {
        self.entries.read().get(key).cloned()
    }

    /// Stores `payload` under `key` unless the key is already present.
    ///
    /// Returns the payload that ends up stored and whether it is the one passed in.
    pub(crate) fn insert_if_absent(&self, key: K, payload: Payload) -> (Payload, bool) {
        match self.entries.write().entry(key) {
            Entry::Occupied(occupied) => (occupied.get().clone(), false),
            Entry::Vacant(vacant) => (vacant.insert(payload).clone(), true),
        }
    }

    #[cfg(any(feature = "test-util", test))]
    pub(crate) fn overwrite(&self, key: K, payload: Payload) {
        self.entries.write().insert(key, payload);
    }
}

impl<K> Debug for EntryTable<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryTable").field("len", &self.len()).finish()
    }
}
