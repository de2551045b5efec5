// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured log events for store activity.

use crate::PartitionId;

#[cfg(test)]
pub(crate) const STORE_NAME: &str = "memoize.store";

#[cfg(test)]
pub(crate) const PARTITION_NAME: &str = "memoize.partition";

#[cfg(test)]
pub(crate) const ACTIVITY_NAME: &str = "memoize.activity";

#[cfg(test)]
pub(crate) const EVENT_NAME: &str = "memoize.event";

/// Something that happened while resolving a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Activity {
    /// The value was already stored.
    Hit,
    /// The value was not stored and a computation was started or joined.
    Miss,
    /// The caller received the outcome of another caller's computation.
    Coalesced,
    /// The compute function succeeded and its value was stored.
    Computed,
    /// The compute function failed; nothing was stored.
    ComputeFailed,
    /// A stored value did not have the expected type.
    Corrupted,
    /// The first request for a type pair created its partition.
    PartitionCreated,
    /// The caller did not supply a compute function.
    InvalidArgument,
}

impl Activity {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Coalesced => "coalesced",
            Self::Computed => "computed",
            Self::ComputeFailed => "compute_failed",
            Self::Corrupted => "corrupted",
            Self::PartitionCreated => "partition_created",
            Self::InvalidArgument => "invalid_argument",
        }
    }

    const fn severity(self) -> Severity {
        match self {
            Self::Corrupted => Severity::Error,
            Self::ComputeFailed | Self::InvalidArgument => Severity::Info,
            Self::Hit | Self::Miss | Self::Coalesced | Self::Computed | Self::PartitionCreated => Severity::Debug,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Severity {
    Error,
    Info,
    Debug,
}

/// Emits store events when logging is enabled.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Telemetry {
    store_name: &'static str,
    logging_enabled: bool,
}

impl Telemetry {
    pub(crate) fn new(store_name: &'static str, logging_enabled: bool) -> Self {
        Self {
            store_name,
            logging_enabled,
        }
    }

    #[inline]
    pub(crate) fn record(&self, partition: PartitionId, activity: Activity) {
        if self.logging_enabled {
            Self::emit(self.store_name, partition, activity);
        }
    }

    fn emit(store_name: &'static str, partition: PartitionId, activity: Activity) {
        let activity_name = activity.as_str();

        // Field names must match the constants at the top of this module.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    memoize.store = store_name,
                    memoize.partition = %partition,
                    memoize.activity = activity_name,
                    "memoize.event"
                )
            };
        }

        // Tracing levels must be constant, so each severity gets its own macro call.
        match activity.severity() {
            Severity::Error => emit_event!(error),
            Severity::Info => emit_event!(info),
            Severity::Debug => emit_event!(debug),
        }
    }
}
