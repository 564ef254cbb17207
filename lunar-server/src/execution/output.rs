//! Output buffers
//!
//! Append-only byte buffers a running script writes its console output into.
//! A buffer can be read at any time, including while the job is still
//! running, in which case the caller sees the partial output.

use lunar_lua::OutputSink;
use std::sync::{Arc, Mutex, PoisonError};

/// Shared, append-only output buffer
///
/// Cloning is cheap and every clone writes into the same storage, so the
/// job keeps one clone for reading while the engine owns another for writing.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything written so far
    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl OutputSink for OutputBuffer {
    fn write(&mut self, text: &str) {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(text.as_bytes());
    }
}
