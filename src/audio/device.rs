//! Device catalog
//!
//! Turns the raw backend enumeration into the input and output lists shown
//! to the user.

use super::backend::AudioBackend;
use log::{debug, error};
use std::collections::HashSet;

/// Index of a device in backend enumeration order
pub type DeviceId = usize;

/// Snapshot of one device from a single enumeration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub name: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
}

/// Name fragments of virtual, loopback and mixer devices hidden from the lists.
/// Matched as case-sensitive substrings.
pub const DENYLIST: &[&str] = &[
    "Microsoft Sound Mapper",
    "Primary Sound",
    "Loopback",
    "VoiceMeeter",
    "VB-Audio",
    "Monitor of",
    "sysdefault",
    "dmix",
    "dsnoop",
    "surround",
    "null",
];

/// Filtered device lists
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceLists {
    pub inputs: Vec<DeviceDescriptor>,
    pub outputs: Vec<DeviceDescriptor>,
}

impl DeviceLists {
    pub fn input(&self, id: DeviceId) -> Option<&DeviceDescriptor> {
        self.inputs.iter().find(|d| d.id == id)
    }

    pub fn output(&self, id: DeviceId) -> Option<&DeviceDescriptor> {
        self.outputs.iter().find(|d| d.id == id)
    }
}

fn is_denied(name: &str) -> bool {
    DENYLIST.iter().any(|fragment| name.contains(fragment))
}

/// Apply the denylist, channel filters and name deduplication.
///
/// Deduplication keeps the first occurrence and runs separately per
/// direction, so a duplex device can appear in both lists.
pub fn filter_devices(devices: &[DeviceDescriptor]) -> DeviceLists {
    let mut lists = DeviceLists::default();
    let mut seen_inputs = HashSet::new();
    let mut seen_outputs = HashSet::new();

    for device in devices {
        let name = device.name.trim();
        if name.is_empty() || is_denied(name) {
            continue;
        }
        if device.max_input_channels > 0 && seen_inputs.insert(name.to_string()) {
            lists.inputs.push(device.clone());
        }
        if device.max_output_channels > 0 && seen_outputs.insert(name.to_string()) {
            lists.outputs.push(device.clone());
        }
    }

    lists
}

/// Query the backend once and filter the result
pub fn list_devices(backend: &dyn AudioBackend) -> DeviceLists {
    match backend.devices() {
        Ok(devices) => {
            let lists = filter_devices(&devices);
            debug!(
                "Enumerated {} devices: {} inputs, {} outputs after filtering",
                devices.len(),
                lists.inputs.len(),
                lists.outputs.len()
            );
            lists
        }
        Err(e) => {
            error!("Failed to enumerate audio devices: {}", e);
            DeviceLists::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: DeviceId, name: &str, inputs: u16, outputs: u16) -> DeviceDescriptor {
        DeviceDescriptor {
            id,
            name: name.to_string(),
            max_input_channels: inputs,
            max_output_channels: outputs,
        }
    }

    #[test]
    fn test_denylisted_device_excluded_from_both_lists() {
        let lists = filter_devices(&[
            device(0, "Microsoft Sound Mapper - Input", 2, 2),
            device(1, "Stereo Mix (VB-Audio Cable)", 2, 2),
            device(2, "USB Microphone", 1, 0),
        ]);
        assert_eq!(lists.inputs.len(), 1);
        assert_eq!(lists.inputs[0].id, 2);
        assert!(lists.outputs.is_empty());
    }

    #[test]
    fn test_input_only_device_listed_only_as_input() {
        let lists = filter_devices(&[device(0, "Headset Mic", 2, 0)]);
        assert_eq!(lists.inputs, vec![device(0, "Headset Mic", 2, 0)]);
        assert!(lists.outputs.is_empty());
    }

    #[test]
    fn test_duplex_device_in_both_lists() {
        let lists = filter_devices(&[device(3, "USB Audio CODEC", 2, 2)]);
        assert_eq!(lists.input(3).map(|d| d.id), Some(3));
        assert_eq!(lists.output(3).map(|d| d.id), Some(3));
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let lists = filter_devices(&[
            device(0, "Speakers", 0, 2),
            device(1, "Speakers", 0, 8),
            device(2, "Speakers ", 0, 2),
        ]);
        assert_eq!(lists.outputs.len(), 1);
        assert_eq!(lists.outputs[0].id, 0);
    }

    #[test]
    fn test_empty_names_skipped() {
        let lists = filter_devices(&[device(0, "   ", 2, 2)]);
        assert_eq!(lists, DeviceLists::default());
    }
}
