//! Audio passthrough
//!
//! This module provides:
//! - Device enumeration and filtering
//! - The realtime mic-to-speaker bridge on top of CPAL
//! - The session state machine with its auto-stop timer

mod backend;
mod device;
#[cfg(test)]
mod mock;
mod passthrough;
mod scheduler;
mod session;

pub use backend::{AudioBackend, CpalBackend, StreamConfig};
pub use device::{list_devices, DeviceDescriptor, DeviceId, DeviceLists};
pub use session::{AudioSession, EngineState};

#[cfg(test)]
pub use device::filter_devices;
#[cfg(test)]
pub use mock::MockBackend;
