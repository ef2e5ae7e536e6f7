//! Hardware-free backend for session tests

use super::backend::{AudioBackend, DuplexStream, StreamConfig};
use super::device::DeviceDescriptor;
use super::passthrough::StreamDiagnostics;
use crate::error::SessionError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Records opens and tracks how many streams are alive at once.
#[derive(Default)]
pub struct MockBackend {
    devices: Vec<DeviceDescriptor>,
    fail_open: AtomicBool,
    fail_close: AtomicBool,
    opened: AtomicUsize,
    live: Arc<AtomicUsize>,
    last_config: Mutex<Option<StreamConfig>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            devices,
            ..Self::default()
        }
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Successful opens so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Streams currently open
    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn last_config(&self) -> Option<StreamConfig> {
        *self.last_config.lock().unwrap()
    }
}

impl AudioBackend for MockBackend {
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, String> {
        Ok(self.devices.clone())
    }

    fn open_duplex(&self, config: &StreamConfig) -> Result<Box<dyn DuplexStream>, SessionError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(SessionError::StreamOpenFailed("device busy".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        *self.last_config.lock().unwrap() = Some(*config);
        Ok(Box::new(MockStream {
            live: self.live.clone(),
            fail_close: self.fail_close.load(Ordering::SeqCst),
        }))
    }
}

struct MockStream {
    live: Arc<AtomicUsize>,
    fail_close: bool,
}

impl DuplexStream for MockStream {
    fn close(self: Box<Self>) -> Result<StreamDiagnostics, SessionError> {
        if self.fail_close {
            return Err(SessionError::StreamCloseFailed("device vanished".to_string()));
        }
        Ok(StreamDiagnostics::default())
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
