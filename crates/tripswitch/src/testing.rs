// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::fmt::MakeWriter;

use crate::collector::{BreakerConfig, BreakerEvent, MetricCollector};
use crate::state::CircuitState;

/// Everything a [`RecordingCollector`] has observed, in emission order.
#[derive(Debug, Default)]
pub(crate) struct Recorded {
    configs: Mutex<Vec<BreakerConfig>>,
    states: Mutex<Vec<CircuitState>>,
    durations: Mutex<Vec<Duration>>,
    events: Mutex<Vec<BreakerEvent>>,
}

impl Recorded {
    pub fn configs(&self) -> Vec<BreakerConfig> {
        self.configs.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<CircuitState> {
        self.states.lock().unwrap().clone()
    }

    pub fn durations(&self) -> Vec<Duration> {
        self.durations.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<BreakerEvent> {
        self.events.lock().unwrap().clone()
    }
}

/// A collector that appends every signal to a shared [`Recorded`].
#[derive(Debug)]
pub(crate) struct RecordingCollector(pub Arc<Recorded>);

impl MetricCollector for RecordingCollector {
    fn report_created(&self, config: &BreakerConfig) {
        self.0.configs.lock().unwrap().push(config.clone());
    }

    fn report_state(&self, state: CircuitState) {
        self.0.states.lock().unwrap().push(state);
    }

    fn report_duration(&self, duration: Duration) {
        self.0.durations.lock().unwrap().push(duration);
    }

    fn report_event(&self, event: BreakerEvent) {
        self.0.events.lock().unwrap().push(event);
    }
}

/// Shared in-memory capture of formatted `tracing` output.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).to_string()
    }

    pub fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(
            output.contains(expected),
            "log output does not contain '{expected}', got:\n{output}"
        );
    }

    /// Creates a subscriber that writes to this capture buffer. Use with
    /// `tracing::subscriber::set_default()`.
    #[must_use]
    pub fn subscriber(&self) -> impl tracing::Subscriber {
        use tracing_subscriber::layer::SubscriberExt;
        tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false))
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

pub(crate) struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
