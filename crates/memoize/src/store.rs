// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The memoizing store.

use std::{
    error::Error as StdError,
    fmt::{self, Debug},
    hash::Hash,
    sync::LazyLock,
};

use crate::{
    Error, PartitionId, Result, StoreBuilder,
    error::SharedCause,
    flight::{Outcome, Role},
    partition::PartitionIndex,
    table::Payload,
    telemetry::{Activity, Telemetry},
};

static GLOBAL: LazyLock<Store> = LazyLock::new(Store::new);

/// A concurrent, type-partitioned memoization store.
///
/// [`resolve`](Self::resolve) returns the value stored for a key, or computes, stores and
/// returns it when there is none. Values are kept in a separate partition per
/// (key type, value type) pair, so the same key can be memoized for several result types
/// without collisions.
///
/// Concurrent calls for the same missing key are coalesced: the compute function runs once
/// and every caller receives its outcome. Failed computations are not stored; the next call
/// computes again.
///
/// Entries are never evicted, expired or replaced.
///
/// # Examples
///
/// ```
/// use memoize::Store;
///
/// let store = Store::new();
///
/// let name = store.resolve(42_u64, |id| Ok::<_, std::io::Error>(format!("user-{id}")))?;
/// assert_eq!(name, "user-42");
///
/// // Served from the store; the compute function is not called again.
/// let name = store.resolve(42_u64, |_| -> Result<String, std::io::Error> { unreachable!() })?;
/// assert_eq!(name, "user-42");
/// # Ok::<(), memoize::Error>(())
/// ```
pub struct Store {
    name: &'static str,
    partitions: PartitionIndex,
    telemetry: Telemetry,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates an empty store with default settings.
    #[must_use]
    pub fn new() -> Self {
        StoreBuilder::new().build()
    }

    /// Creates a builder for configuring a store.
    #[must_use]
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    pub(crate) fn from_parts(name: &'static str, partitions: PartitionIndex, telemetry: Telemetry) -> Self {
        Self {
            name,
            partitions,
            telemetry,
        }
    }

    /// Returns the process-wide store used by [`crate::resolve`].
    ///
    /// It is created with default settings on first use and lives until the process exits.
    /// Prefer an owned [`Store`] where isolation matters, such as in tests.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Returns the value stored for `key`, computing and storing it first if needed.
    ///
    /// `compute` is called at most once per missing key across all concurrent callers;
    /// callers that arrive while it runs block until it finishes and share its outcome.
    /// No store-wide lock is held while `compute` runs, so other keys stay available.
    ///
    /// Calling `resolve` for the same key and value type from inside `compute` deadlocks.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::ComputeFailed`](crate::ErrorKind::ComputeFailed) if `compute` returns an
    ///   error. Nothing is stored; the next call computes again.
    /// - [`ErrorKind::CacheCorruption`](crate::ErrorKind::CacheCorruption) if the stored value
    ///   is not a `V`.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoize::{ErrorKind, Store};
    ///
    /// let store = Store::new();
    ///
    /// let err = store
    ///     .resolve("port", |_| "eighty".parse::<u16>())
    ///     .unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::ComputeFailed);
    ///
    /// // The failure was not stored.
    /// let port = store.resolve("port", |_| "80".parse::<u16>())?;
    /// assert_eq!(port, 80);
    /// # Ok::<(), memoize::Error>(())
    /// ```
    pub fn resolve<K, V, E, F>(&self, key: K, compute: F) -> Result<V>
    where
        K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        E: StdError + Send + Sync + 'static,
        F: FnOnce(&K) -> std::result::Result<V, E>,
    {
        self.resolve_with(key, Some(compute))
    }

    /// Like [`resolve`](Self::resolve), for callers whose compute function is optional.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::ErrorKind::InvalidArgument) if `compute`
    /// is `None`, without touching the store. Otherwise fails as [`resolve`](Self::resolve)
    /// does.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoize::{ErrorKind, Store};
    ///
    /// type Loader = fn(&u32) -> Result<String, std::io::Error>;
    ///
    /// let store = Store::new();
    /// let err = store.resolve_with(1_u32, None::<Loader>).unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    /// assert!(store.is_empty());
    /// ```
    pub fn resolve_with<K, V, E, F>(&self, key: K, compute: Option<F>) -> Result<V>
    where
        K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        E: StdError + Send + Sync + 'static,
        F: FnOnce(&K) -> std::result::Result<V, E>,
    {
        let id = PartitionId::of::<K, V>();
        let Some(compute) = compute else {
            self.telemetry.record(id, Activity::InvalidArgument);
            return Err(Error::invalid_argument());
        };

        if let Some(partition) = self.partitions.get::<K>(id).inspect_err(|_| self.corrupted(id))?
            && let Some(payload) = partition.entries().lookup(&key)
        {
            self.telemetry.record(id, Activity::Hit);
            return self.narrow(&key, id, &payload);
        }
        self.telemetry.record(id, Activity::Miss);

        let (partition, created) = self.partitions.get_or_create::<K>(id).inspect_err(|_| self.corrupted(id))?;
        if created {
            self.telemetry.record(id, Activity::PartitionCreated);
        }

        let entries = partition.entries();
        let mut found_stored = false;
        let (outcome, role) = partition.flights().run(&key, || {
            // A previous flight may have stored the value after our lookup missed.
            if let Some(payload) = entries.lookup(&key) {
                found_stored = true;
                return Ok(payload);
            }
            match compute(&key) {
                Ok(value) => Ok(entries.insert_if_absent(key.clone(), Payload::new(value)).0),
                Err(error) => Err(SharedCause::new(error)),
            }
        });
        self.telemetry.record(id, settled_activity(role, &outcome, found_stored));

        match outcome {
            Ok(payload) => self.narrow(&key, id, &payload),
            Err(cause) => Err(Error::compute_failed(&key, id, cause)),
        }
    }

    /// Returns `true` if a value of type `V` is stored for `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoize::Store;
    ///
    /// let store = Store::new();
    /// store.resolve(1_u8, |_| Ok::<_, std::io::Error>('a'))?;
    ///
    /// assert!(store.contains::<u8, char>(&1));
    /// assert!(!store.contains::<u8, String>(&1));
    /// # Ok::<(), memoize::Error>(())
    /// ```
    #[must_use]
    pub fn contains<K, V>(&self, key: &K) -> bool
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: 'static,
    {
        match self.partitions.get::<K>(PartitionId::of::<K, V>()) {
            Ok(Some(partition)) => partition.entries().lookup(key).is_some(),
            Ok(None) | Err(_) => false,
        }
    }

    /// Returns the name of this store, as reported in log events.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the number of stored entries across all partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.entry_count()
    }

    /// Returns `true` if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of partitions, one per (key type, value type) pair seen so far.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partitions.partition_count()
    }

    /// Returns the number of computations currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.partitions.in_flight()
    }

    /// Overwrites the entry for `key` in the (`K`, `V`) partition with `value`, a value of
    /// some other type `W`, so tests can observe how corruption is reported.
    ///
    /// # Errors
    ///
    /// Fails only if the partition itself is already corrupted.
    #[cfg(any(feature = "test-util", test))]
    pub fn corrupt_entry<K, V, W>(&self, key: K, value: W) -> Result<()>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: 'static,
        W: Send + Sync + 'static,
    {
        let (partition, _) = self.partitions.get_or_create::<K>(PartitionId::of::<K, V>())?;
        partition.entries().overwrite(key, Payload::new(value));
        Ok(())
    }

    /// Drops every partition and entry.
    #[cfg(any(feature = "test-util", test))]
    pub fn clear(&self) {
        self.partitions.clear();
    }

    fn narrow<K, V>(&self, key: &K, id: PartitionId, payload: &Payload) -> Result<V>
    where
        K: Debug,
        V: Clone + 'static,
    {
        payload.narrow::<V>().ok_or_else(|| {
            self.corrupted(id);
            Error::corruption(key, id, payload.tag().name())
        })
    }

    fn corrupted(&self, id: PartitionId) {
        self.telemetry.record(id, Activity::Corrupted);
    }
}

/// Classifies how a miss was settled once its flight has landed.
fn settled_activity(role: Role, outcome: &Outcome, found_stored: bool) -> Activity {
    match (role, outcome) {
        (Role::Follower, _) => Activity::Coalesced,
        (Role::Leader, Ok(_)) if found_stored => Activity::Hit,
        (Role::Leader, Ok(_)) => Activity::Computed,
        (Role::Leader, Err(_)) => Activity::ComputeFailed,
    }
}

impl Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("partitions", &self.partition_count())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
