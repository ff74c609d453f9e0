//! Shared utilities for integration tests.

use std::io;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use logwire::observability::{build_logger_with_writer, LoggerHandle};
use logwire::LoggingConfiguration;

/// In-memory console sink collecting every entry the logger writes.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Capture {
    /// All entries written so far, parsed.
    pub fn entries(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Entries emitted by the request logging middleware.
    #[allow(dead_code)]
    pub fn request_entries(&self) -> Vec<Value> {
        self.entries()
            .into_iter()
            .filter(|e| {
                e["logger"]
                    .as_str()
                    .is_some_and(|target| target.ends_with("request_log"))
            })
            .collect()
    }
}

/// Build a logger whose console output is captured.
pub fn capturing_logger(config: &LoggingConfiguration) -> (LoggerHandle, Capture) {
    let capture = Capture::default();
    let writer = capture.clone();
    let handle = build_logger_with_writer(config, move || writer.clone()).unwrap();
    (handle, capture)
}
