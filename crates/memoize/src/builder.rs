// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Store configuration.

use crate::{Store, partition::PartitionIndex, telemetry::Telemetry};

/// The name given to stores built without an explicit [`name`](StoreBuilder::name).
pub const DEFAULT_STORE_NAME: &str = "memoize";

/// Builder for a [`Store`].
///
/// Created by [`Store::builder`].
///
/// # Examples
///
/// ```
/// use memoize::Store;
///
/// let store = Store::builder()
///     .name("geo_lookups")
///     .logs(true)
///     .entry_capacity(1024)
///     .build();
///
/// assert_eq!(store.name(), "geo_lookups");
/// ```
#[derive(Debug, Clone)]
pub struct StoreBuilder {
    name: &'static str,
    logs: bool,
    entry_capacity: usize,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBuilder {
    /// Creates a builder with default settings.
    ///
    /// Defaults:
    /// - `name`: [`DEFAULT_STORE_NAME`]
    /// - `logs`: disabled
    /// - `entry_capacity`: 0
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: DEFAULT_STORE_NAME,
            logs: false,
            entry_capacity: 0,
        }
    }

    /// Sets the store name reported in log events.
    #[must_use]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Enables or disables log events through [`tracing`].
    ///
    /// Hits, misses, coalesced waits and completed computations are logged at `DEBUG`, failed
    /// computations at `INFO` and corrupted entries at `ERROR`. Errors are still returned to
    /// the caller either way.
    #[must_use]
    pub fn logs(mut self, enabled: bool) -> Self {
        self.logs = enabled;
        self
    }

    /// Sets the initial number of entries each new partition reserves room for.
    #[must_use]
    pub const fn entry_capacity(mut self, capacity: usize) -> Self {
        self.entry_capacity = capacity;
        self
    }

    /// Builds the store.
    #[must_use]
    pub fn build(self) -> Store {
        Store::from_parts(
            self.name,
            PartitionIndex::new(self.entry_capacity),
            Telemetry::new(self.name, self.logs),
        )
    }
}
