// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Captures `memoize.event` log lines so tests can assert on store activity.

use std::{io::Write, sync::Arc};

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

use crate::telemetry::Activity;

/// In-memory sink for the formatted events of a store built with `logs(true)`.
///
/// Install [`subscriber`](Self::subscriber) with `tracing::subscriber::set_default` on the
/// test thread; events emitted on other threads are not captured.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogCapture {
    lines: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn output(&self) -> String {
        String::from_utf8_lossy(&self.lines.lock()).into_owned()
    }

    pub(crate) fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(
            output.contains(expected),
            "captured events do not contain '{expected}', got:\n{output}"
        );
    }

    /// Number of captured events recording `activity`.
    pub(crate) fn count(&self, activity: Activity) -> usize {
        self.output()
            .lines()
            .filter_map(|line| line.split_whitespace().find_map(|field| field.strip_prefix("memoize.activity=")))
            .filter(|value| value.trim_matches('"') == activity.as_str())
            .count()
    }

    /// A plain-text fmt subscriber writing into this capture.
    pub(crate) fn subscriber(&self) -> impl tracing::Subscriber {
        use tracing_subscriber::layer::SubscriberExt;
        tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false))
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            lines: Arc::clone(&self.lines),
        }
    }
}

pub(crate) struct CaptureWriter {
    lines: Arc<Mutex<Vec<u8>>>,
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.lines.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
