// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Compute once per key, reuse forever.
//!
//! This crate provides [`Store`], a concurrent memoization store. Given a key and a function
//! that computes a value for it, [`Store::resolve`] returns the stored value if there is one,
//! and otherwise computes it exactly once, stores it and returns it.
//!
//! - **Type partitions**: entries are grouped by (key type, value type), so resolving the same
//!   key for a `String` and for a `u64` yields two independent entries.
//! - **Stampede protection**: concurrent callers missing on the same key share a single
//!   execution of the compute function. Unrelated keys never wait for each other.
//! - **Errors are not cached**: a failed computation stores nothing; the next call for that
//!   key computes again.
//! - **Corruption is reported**: every stored value carries its type tag, and a mismatch is
//!   returned as [`ErrorKind::CacheCorruption`] instead of a wrongly typed value or a panic.
//!
//! Entries are never evicted, expired or invalidated.
//!
//! # Examples
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use memoize::Store;
//!
//! let store = Store::new();
//! let lookups = AtomicUsize::new(0);
//! let fetch_country = |code: &&str| {
//!     lookups.fetch_add(1, Ordering::Relaxed);
//!     Ok::<_, std::io::Error>(format!("country:{code}"))
//! };
//!
//! assert_eq!(store.resolve("NZ", fetch_country)?, "country:NZ");
//! assert_eq!(store.resolve("NZ", fetch_country)?, "country:NZ");
//! assert_eq!(lookups.load(Ordering::Relaxed), 1);
//! # Ok::<(), memoize::Error>(())
//! ```
//!
//! # Process-wide Store
//!
//! [`resolve`] and [`resolve_with`] use a store shared by the whole process, reachable from
//! anywhere without wiring. Libraries and tests that need isolation should own a [`Store`].
//!
//! ```
//! #[derive(Clone)]
//! struct Settings {
//!     retries: u32,
//! }
//!
//! let settings = memoize::resolve("service-a", |_| Ok::<_, std::io::Error>(Settings { retries: 3 }))?;
//! assert_eq!(settings.retries, 3);
//! # Ok::<(), memoize::Error>(())
//! ```

#![doc(html_logo_url = "https://media.githubusercontent.com/media/microsoft/oxidizer/refs/heads/main/crates/memoize/logo.png")]
#![doc(html_favicon_url = "https://media.githubusercontent.com/media/microsoft/oxidizer/refs/heads/main/crates/memoize/favicon.ico")]

use std::{error::Error as StdError, fmt::Debug, hash::Hash};

mod builder;
mod error;
mod flight;
mod partition;
mod store;
mod table;
mod telemetry;

#[cfg(test)]
mod testing;

pub use builder::{DEFAULT_STORE_NAME, StoreBuilder};
pub use error::{Error, ErrorKind, Result};
pub use partition::{PartitionId, TypeTag};
pub use store::Store;

/// Resolves `key` through the process-wide [`Store::global`] store.
///
/// See [`Store::resolve`].
///
/// # Errors
///
/// Fails as [`Store::resolve`] does.
pub fn resolve<K, V, E, F>(key: K, compute: F) -> Result<V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: StdError + Send + Sync + 'static,
    F: FnOnce(&K) -> std::result::Result<V, E>,
{
    Store::global().resolve(key, compute)
}

/// Resolves `key` through the process-wide [`Store::global`] store, with an optional
/// compute function.
///
/// See [`Store::resolve_with`].
///
/// # Errors
///
/// Fails as [`Store::resolve_with`] does.
pub fn resolve_with<K, V, E, F>(key: K, compute: Option<F>) -> Result<V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: StdError + Send + Sync + 'static,
    F: FnOnce(&K) -> std::result::Result<V, E>,
{
    Store::global().resolve_with(key, compute)
}
