// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Type partitions.
//!
//! Every (key type, value type) pair owns an isolated partition: its own entry table and its
//! own set of in-flight computations. Two callers resolving the same key value with different
//! result types therefore never observe each other's entries.

use std::{
    any::{Any, TypeId, type_name},
    fmt::{self, Debug, Display},
    hash::{Hash, Hasher},
    sync::Arc,
};

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::{Error, flight::Flights, table::EntryTable};

/// Runtime identity of a type, with its name kept for diagnostics.
///
/// Equality and hashing consider only the [`TypeId`].
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// Returns the tag of `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Returns the name of the tagged type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identifies the partition that holds entries for one (key type, value type) pair.
///
/// The identifier is derived from the declared types alone, so value types whose values
/// may be "empty" (`Option<Arc<T>>`, `Arc<dyn Trait>`, ...) keep their identity.
///
/// # Examples
///
/// ```
/// use memoize::PartitionId;
///
/// struct Meters(f64);
/// struct Feet(f64);
///
/// assert_ne!(PartitionId::of::<u32, Meters>(), PartitionId::of::<u32, Feet>());
/// assert_eq!(PartitionId::of::<u32, Meters>(), PartitionId::of::<u32, Meters>());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PartitionId {
    key: TypeTag,
    value: TypeTag,
}

impl PartitionId {
    /// Returns the partition identifier for keys of type `K` and values of type `V`.
    #[must_use]
    pub fn of<K: 'static, V: 'static>() -> Self {
        Self {
            key: TypeTag::of::<K>(),
            value: TypeTag::of::<V>(),
        }
    }

    /// Returns the tag of the partition's key type.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoize::{PartitionId, TypeTag};
    ///
    /// let id = PartitionId::of::<u64, String>();
    /// assert_eq!(id.key_type(), TypeTag::of::<u64>());
    /// assert_eq!(id.key_type().name(), "u64");
    /// ```
    #[must_use]
    pub fn key_type(&self) -> TypeTag {
        self.key
    }

    /// Returns the tag of the partition's value type.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoize::{PartitionId, TypeTag};
    ///
    /// let id = PartitionId::of::<u64, Option<String>>();
    /// assert_eq!(id.value_type(), TypeTag::of::<Option<String>>());
    /// assert_ne!(id.value_type(), TypeTag::of::<String>());
    /// ```
    #[must_use]
    pub fn value_type(&self) -> TypeTag {
        self.value
    }
}

impl Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", self.value.name, self.key.name)
    }
}

/// A single partition: the stored entries and the computations currently producing more.
pub(crate) struct Partition<K> {
    entries: EntryTable<K>,
    flights: Flights<K>,
}

impl<K> Partition<K> {
    fn new(entry_capacity: usize) -> Self {
        Self {
            entries: EntryTable::with_capacity(entry_capacity),
            flights: Flights::new(),
        }
    }

    pub(crate) fn entries(&self) -> &EntryTable<K> {
        &self.entries
    }

    pub(crate) fn flights(&self) -> &Flights<K> {
        &self.flights
    }
}

/// Object-safe view of a partition, used for store-wide introspection without knowing `K`.
trait ErasedPartition: Any + Send + Sync {
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn len(&self) -> usize;

    fn in_flight(&self) -> usize;
}

impl<K> ErasedPartition for Partition<K>
where
    K: Send + Sync + 'static,
{
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn in_flight(&self) -> usize {
        self.flights.len()
    }
}

/// Locates partitions by [`PartitionId`], creating them on first use.
pub(crate) struct PartitionIndex {
    partitions: RwLock<HashMap<PartitionId, Arc<dyn ErasedPartition>>>,
    entry_capacity: usize,
}

impl PartitionIndex {
    pub(crate) fn new(entry_capacity: usize) -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            entry_capacity,
        }
    }

    /// Returns the partition for `id` if it already exists.
    pub(crate) fn get<K>(&self, id: PartitionId) -> Result<Option<Arc<Partition<K>>>, Error>
    where
        K: Send + Sync + 'static,
    {
        let erased = self.partitions.read().get(&id).map(Arc::clone);
        erased.map(|partition| downcast(id, partition)).transpose()
    }

    /// Returns the partition for `id`, creating it if needed.
    ///
    /// The boolean is `true` when this call created the partition.
    pub(crate) fn get_or_create<K>(&self, id: PartitionId) -> Result<(Arc<Partition<K>>, bool), Error>
    where
        K: Send + Sync + 'static,
    {
        if let Some(partition) = self.get(id)? {
            return Ok((partition, false));
        }

        let mut partitions = self.partitions.write();

        // Another caller may have created it between the read and write locks.
        if let Some(existing) = partitions.get(&id) {
            let existing = Arc::clone(existing);
            drop(partitions);
            return downcast(id, existing).map(|partition| (partition, false));
        }

        let partition = Arc::new(Partition::<K>::new(self.entry_capacity));
        partitions.insert(id, Arc::clone(&partition) as Arc<dyn ErasedPartition>);
        Ok((partition, true))
    }

    pub(crate) fn partition_count(&self) -> usize {
        self.partitions.read().len()
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.snapshot().iter().map(|partition| partition.len()).sum()
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.snapshot().iter().map(|partition| partition.in_flight()).sum()
    }

    #[cfg(any(feature = "test-util", test))]
    pub(crate) fn clear(&self) {
        self.partitions.write().clear();
    }

    // Partition locks must not nest inside the index lock.
    fn snapshot(&self) -> Vec<Arc<dyn ErasedPartition>> {
        self.partitions.read().values().map(Arc::clone).collect()
    }
}

impl Debug for PartitionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionIndex")
            .field("partitions", &self.partition_count())
            .finish_non_exhaustive()
    }
}

fn downcast<K>(id: PartitionId, partition: Arc<dyn ErasedPartition>) -> Result<Arc<Partition<K>>, Error>
where
    K: Send + Sync + 'static,
{
    partition
        .as_any()
        .downcast::<Partition<K>>()
        .map_err(|_mismatch| Error::partition_mismatch(id))
}
