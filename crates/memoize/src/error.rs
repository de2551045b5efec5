// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for memoization.

use std::{
    error::Error as StdError,
    fmt::{self, Debug, Display},
    sync::Arc,
};

use crate::PartitionId;

/// The category of a [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The caller did not supply a compute function.
    InvalidArgument,

    /// The compute function returned an error. Nothing was stored; the next call for the
    /// same key computes again.
    ComputeFailed,

    /// A stored value does not have the type its partition promises.
    CacheCorruption,
}

impl ErrorKind {
    /// Returns a short, stable description of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid argument",
            Self::ComputeFailed => "compute failed",
            Self::CacheCorruption => "cache corruption",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error from a memoized resolution.
///
/// Use [`kind`](Self::kind) to tell the categories apart. For
/// [`ErrorKind::ComputeFailed`], the error returned by the compute function is available
/// through [`compute_error`](Self::compute_error) and is the source of this error.
///
/// # Examples
///
/// ```
/// use memoize::{ErrorKind, Store};
///
/// let store = Store::new();
/// let err = store
///     .resolve(7_u32, |_| Err::<String, _>(std::io::Error::other("backend unavailable")))
///     .unwrap_err();
///
/// assert_eq!(err.kind(), ErrorKind::ComputeFailed);
/// assert!(err.compute_error().is_some());
/// ```
#[ohno::error]
#[display("{kind}: {context}")]
pub struct Error {
    kind: ErrorKind,
    context: String,
}

impl Error {
    pub(crate) fn invalid_argument() -> Self {
        Self::new(ErrorKind::InvalidArgument, "compute function cannot be absent")
    }

    pub(crate) fn compute_failed(key: &impl Debug, partition: PartitionId, cause: SharedCause) -> Self {
        Self::caused_by(
            ErrorKind::ComputeFailed,
            format!("key {key:?} in partition {partition}"),
            cause,
        )
    }

    pub(crate) fn corruption(key: &impl Debug, partition: PartitionId, found: &'static str) -> Self {
        Self::new(
            ErrorKind::CacheCorruption,
            format!(
                "stored value type mismatch for key {key:?} in partition {partition}: found {found}"
            ),
        )
    }

    pub(crate) fn partition_mismatch(partition: PartitionId) -> Self {
        Self::new(
            ErrorKind::CacheCorruption,
            format!("partition {partition} is registered with a different key type"),
        )
    }

    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` if this error reports a corrupted entry.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        self.kind == ErrorKind::CacheCorruption
    }

    /// Returns the error produced by the compute function, if this error wraps one.
    ///
    /// Every caller attached to the same failed computation observes the same underlying
    /// error instance.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoize::Store;
    ///
    /// let store = Store::new();
    /// let err = store
    ///     .resolve("config", |_| Err::<u64, _>(std::io::Error::other("disk on fire")))
    ///     .unwrap_err();
    ///
    /// let io = err
    ///     .compute_error()
    ///     .and_then(|e| e.downcast_ref::<std::io::Error>())
    ///     .expect("compute error should be an io::Error");
    /// assert_eq!(io.to_string(), "disk on fire");
    /// ```
    #[must_use]
    pub fn compute_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        StdError::source(self)?
            .downcast_ref::<SharedCause>()
            .map(|shared| &*shared.0)
    }
}

/// A specialized [`Result`] type for memoized resolutions.
pub type Result<T> = std::result::Result<T, Error>;

/// A compute error shared between the leader of a computation and its followers.
#[derive(Clone)]
pub(crate) struct SharedCause(pub(crate) Arc<dyn StdError + Send + Sync>);

impl SharedCause {
    pub(crate) fn new(error: impl StdError + Send + Sync + 'static) -> Self {
        Self(Arc::new(error))
    }
}

impl Debug for SharedCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&*self.0, f)
    }
}

impl Display for SharedCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&*self.0, f)
    }
}

// Displays as the inner error, so the chain continues with the inner error's own source.
impl StdError for SharedCause {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}
