//! Application settings persistence
//!
//! Settings are a flat JSON document stored at
//! `~/.config/micpass/audio_config.json`. Loading never fails: a missing or
//! unreadable file yields defaults, and each field falls back to its default
//! on its own when it is absent or has the wrong type.

use crate::audio::{DeviceId, StreamConfig};
use crate::error::SessionError;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Keys of the persisted document
mod keys {
    pub const INPUT_DEVICE: &[&str] = &["inputDevice", "input_device"];
    pub const OUTPUT_DEVICE: &[&str] = &["outputDevice", "output_device"];
    pub const BLOCKSIZE: &[&str] = &["blocksize"];
    pub const SAMPLERATE: &[&str] = &["samplerate"];
    pub const AUTOSTART: &[&str] = &["autostart"];
    pub const HOTKEY: &[&str] = &["hotkey"];
    pub const AUTO_STOP_MINUTES: &[&str] = &["auto_stop_minutes"];
}

pub const DEFAULT_BLOCKSIZE: u32 = 256;
pub const DEFAULT_SAMPLERATE: u32 = 44100;
pub const DEFAULT_HOTKEY: &str = "ctrl+m";

/// Largest block size a stream is opened with; the ring is sized from it.
pub const MAX_BLOCKSIZE: u32 = 8192;

/// The persisted user settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "inputDevice")]
    pub input_device: Option<DeviceId>,
    #[serde(rename = "outputDevice")]
    pub output_device: Option<DeviceId>,
    pub blocksize: u32,
    pub samplerate: u32,
    pub autostart: bool,
    pub hotkey: String,
    /// 0 disables auto-stop
    pub auto_stop_minutes: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            blocksize: DEFAULT_BLOCKSIZE,
            samplerate: DEFAULT_SAMPLERATE,
            autostart: false,
            hotkey: DEFAULT_HOTKEY.to_string(),
            auto_stop_minutes: 0.0,
        }
    }
}

impl AppConfig {
    /// Build a config from an arbitrary JSON value, field by field.
    pub fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(map) = value.as_object() else {
            return defaults;
        };

        Self {
            input_device: field(map, keys::INPUT_DEVICE).unwrap_or(defaults.input_device),
            output_device: field(map, keys::OUTPUT_DEVICE).unwrap_or(defaults.output_device),
            blocksize: field(map, keys::BLOCKSIZE).unwrap_or(defaults.blocksize),
            samplerate: field(map, keys::SAMPLERATE).unwrap_or(defaults.samplerate),
            autostart: field(map, keys::AUTOSTART).unwrap_or(defaults.autostart),
            hotkey: field(map, keys::HOTKEY).unwrap_or(defaults.hotkey),
            auto_stop_minutes: field(map, keys::AUTO_STOP_MINUTES)
                .unwrap_or(defaults.auto_stop_minutes),
        }
    }

    /// Both devices are chosen
    pub fn has_devices(&self) -> bool {
        self.input_device.is_some() && self.output_device.is_some()
    }

    /// Stream parameters for the persisted devices. Hand-edited block sizes
    /// and rates outside what a stream can be opened with are refused here.
    pub fn stream_config(&self) -> Result<StreamConfig, SessionError> {
        let (Some(input_device), Some(output_device)) = (self.input_device, self.output_device)
        else {
            return Err(SessionError::ConfigurationIncomplete);
        };
        if self.blocksize == 0 || self.blocksize > MAX_BLOCKSIZE {
            return Err(SessionError::StreamOpenFailed(format!(
                "Block size {} is outside 1..={}",
                self.blocksize, MAX_BLOCKSIZE
            )));
        }
        if self.samplerate == 0 {
            return Err(SessionError::StreamOpenFailed(
                "Sample rate must be positive".to_string(),
            ));
        }

        Ok(StreamConfig {
            input_device,
            output_device,
            sample_rate: self.samplerate,
            block_size: self.blocksize,
        })
    }

    /// Auto-stop delay, `None` when the feature is disabled
    pub fn auto_stop_duration(&self) -> Option<Duration> {
        minutes_to_duration(self.auto_stop_minutes)
    }
}

/// Convert a minutes value to a timer duration; zero, negative and
/// non-finite values disable the timer.
pub fn minutes_to_duration(minutes: f64) -> Option<Duration> {
    if !minutes.is_finite() || minutes <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(minutes * 60.0).ok()
}

fn field<T: DeserializeOwned>(map: &Map<String, Value>, names: &[&str]) -> Option<T> {
    names.iter().find_map(|name| {
        let value = map.get(*name)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Ignoring invalid config value for '{}': {}", name, e);
                None
            }
        }
    })
}

/// Reads and writes the settings document
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store at the default location
    pub fn new() -> Self {
        Self {
            path: Self::default_path(),
        }
    }

    /// Create a store backed by a specific file
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("micpass")
            .join("audio_config.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the config directory exists
    fn ensure_dir(&self) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }
        Ok(())
    }

    /// Load settings, falling back to defaults
    pub fn load(&self) -> AppConfig {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("No config at {:?} ({}), using defaults", self.path, e);
                return AppConfig::default();
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(value) => AppConfig::from_value(&value),
            Err(e) => {
                warn!("Failed to parse config {:?}: {}", self.path, e);
                AppConfig::default()
            }
        }
    }

    /// Overwrite the whole document
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        self.ensure_dir()?;

        let contents = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&self.path, contents).map_err(|e| format!("Failed to write config: {}", e))?;

        Ok(())
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("nope.json"));
        assert_eq!(store.load(), AppConfig::default());
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.blocksize, 256);
        assert_eq!(config.samplerate, 44100);
        assert_eq!(config.hotkey, "ctrl+m");
        assert!(!config.autostart);
        assert_eq!(config.auto_stop_minutes, 0.0);
        assert!(!config.has_devices());
        assert!(matches!(
            config.stream_config(),
            Err(SessionError::ConfigurationIncomplete)
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("sub").join("audio_config.json"));
        let config = AppConfig {
            input_device: Some(1),
            output_device: Some(2),
            hotkey: "ctrl+shift+f5".to_string(),
            auto_stop_minutes: 2.5,
            ..AppConfig::default()
        };

        store.save(&config).unwrap();
        assert_eq!(store.load(), config);

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["inputDevice"], json!(1));
        assert_eq!(raw["outputDevice"], json!(2));
    }

    #[test]
    fn test_bad_fields_fall_back_individually() {
        let config = AppConfig::from_value(&json!({
            "inputDevice": 3,
            "blocksize": "large",
            "samplerate": 48000,
            "hotkey": null,
            "something_else": true
        }));
        assert_eq!(config.input_device, Some(3));
        assert_eq!(config.blocksize, DEFAULT_BLOCKSIZE);
        assert_eq!(config.samplerate, 48000);
        assert_eq!(config.hotkey, DEFAULT_HOTKEY);
    }

    #[test]
    fn test_snake_case_device_keys_accepted() {
        let config = AppConfig::from_value(&json!({
            "input_device": 4,
            "output_device": 5
        }));
        let stream = config.stream_config().unwrap();
        assert_eq!(stream.input_device, 4);
        assert_eq!(stream.output_device, 5);
    }

    #[test]
    fn test_out_of_range_blocksize_is_refused() {
        let huge = AppConfig::from_value(&json!({
            "inputDevice": 1,
            "outputDevice": 2,
            "blocksize": 4_000_000_000u32
        }));
        assert!(huge.has_devices());
        match huge.stream_config() {
            Err(SessionError::StreamOpenFailed(msg)) => assert!(msg.contains("4000000000")),
            other => panic!("unexpected: {:?}", other),
        }

        let zero = AppConfig {
            blocksize: 0,
            ..huge.clone()
        };
        assert!(matches!(
            zero.stream_config(),
            Err(SessionError::StreamOpenFailed(_))
        ));

        let largest = AppConfig {
            blocksize: MAX_BLOCKSIZE,
            ..huge
        };
        assert_eq!(largest.stream_config().unwrap().block_size, MAX_BLOCKSIZE);
    }

    #[test]
    fn test_corrupt_document_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio_config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(ConfigStore::with_path(&path).load(), AppConfig::default());
    }

    #[test]
    fn test_auto_stop_duration() {
        assert_eq!(minutes_to_duration(0.0), None);
        assert_eq!(minutes_to_duration(-1.0), None);
        assert_eq!(minutes_to_duration(f64::NAN), None);
        assert_eq!(minutes_to_duration(0.01), Some(Duration::from_millis(600)));
        assert_eq!(minutes_to_duration(2.0), Some(Duration::from_secs(120)));
    }
}
