use crate::audio::{DeviceId, DeviceLists, EngineState};
use crate::control::hotkey::{self, CaptureOutcome, KeyModifiers};
use crate::control::SettingsDraft;
use crate::settings::AppConfig;

/// Block sizes offered in the settings view
pub const BLOCK_SIZES: &[u32] = &[64, 128, 256, 512, 1024, 2048, 4096];

/// Sample rates offered in the settings view
pub const SAMPLE_RATES: &[u32] = &[22050, 32000, 44100, 48000, 88200, 96000];

/// Below this many minutes the auto-stop stepper moves by whole minutes
const FINE_STEP_LIMIT: f64 = 10.0;

/// Stepper increment above `FINE_STEP_LIMIT`
const COARSE_STEP: f64 = 5.0;

/// Next stepper value from `minutes`. Values between grid points, such as a
/// hand-edited 0.01, move to the neighbouring grid point.
fn next_auto_stop(minutes: f64, up: bool) -> f64 {
    let minutes = minutes.max(0.0);
    if up {
        let step = if minutes < FINE_STEP_LIMIT { 1.0 } else { COARSE_STEP };
        ((minutes / step).floor() + 1.0) * step
    } else {
        let step = if minutes <= FINE_STEP_LIMIT { 1.0 } else { COARSE_STEP };
        (((minutes / step).ceil() - 1.0) * step).max(0.0)
    }
}

/// The currently active view/screen
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ActiveView {
    #[default]
    Main,
    Settings,
}

/// Status line under the controls
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub text: String,
    pub is_error: bool,
}

/// State of the "Record Hotkey" capture
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HotkeyCapture {
    #[default]
    Inactive,
    Waiting,
    /// Last press had no usable key
    Unrecognized,
}

/// Root application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub active_view: ActiveView,
    pub devices: DeviceLists,
    pub selected_input: Option<DeviceId>,
    pub selected_output: Option<DeviceId>,
    /// Last engine state seen by the window
    pub engine_state: EngineState,
    pub draft: SettingsDraft,
    pub hotkey_capture: HotkeyCapture,
    pub status: Option<StatusLine>,
    /// Set when the window should get out of the way at the next render
    minimize_requested: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            active_view: ActiveView::Main,
            devices: DeviceLists::default(),
            selected_input: None,
            selected_output: None,
            engine_state: EngineState::Idle,
            draft: SettingsDraft::from_config(&AppConfig::default()),
            hotkey_capture: HotkeyCapture::Inactive,
            status: None,
            minimize_requested: false,
        }
    }
}

impl AppState {
    pub fn new(config: &AppConfig, devices: DeviceLists) -> Self {
        let mut state = Self {
            draft: SettingsDraft::from_config(config),
            ..Self::default()
        };
        state.set_devices(devices, config);
        state
    }

    /// Navigate to a specific view
    pub fn navigate_to(&mut self, view: ActiveView) {
        if view != ActiveView::Settings {
            self.hotkey_capture = HotkeyCapture::Inactive;
        }
        self.active_view = view;
    }

    /// Replace the device lists, keeping stored choices that still exist
    pub fn set_devices(&mut self, devices: DeviceLists, config: &AppConfig) {
        self.selected_input = config
            .input_device
            .filter(|id| devices.input(*id).is_some())
            .or_else(|| devices.inputs.first().map(|d| d.id));
        self.selected_output = config
            .output_device
            .filter(|id| devices.output(*id).is_some())
            .or_else(|| devices.outputs.first().map(|d| d.id));
        self.devices = devices;
    }

    pub fn select_input(&mut self, id: DeviceId) {
        if self.devices.input(id).is_some() {
            self.selected_input = Some(id);
        }
    }

    pub fn select_output(&mut self, id: DeviceId) {
        if self.devices.output(id).is_some() {
            self.selected_output = Some(id);
        }
    }

    /// Reset the settings draft to what is stored
    pub fn open_settings(&mut self, config: &AppConfig) {
        self.draft = SettingsDraft::from_config(config);
        self.navigate_to(ActiveView::Settings);
    }

    pub fn begin_hotkey_capture(&mut self) {
        self.hotkey_capture = HotkeyCapture::Waiting;
    }

    pub fn is_capturing_hotkey(&self) -> bool {
        self.hotkey_capture != HotkeyCapture::Inactive
    }

    /// Feed a key press to an active capture. Returns true if it was consumed.
    pub fn capture_key(&mut self, mods: KeyModifiers, key: &str) -> bool {
        if !self.is_capturing_hotkey() {
            return false;
        }
        match hotkey::capture(mods, key) {
            CaptureOutcome::Captured(combo) => {
                self.draft.hotkey = combo;
                self.hotkey_capture = HotkeyCapture::Inactive;
            }
            CaptureOutcome::Cancelled => self.hotkey_capture = HotkeyCapture::Inactive,
            CaptureOutcome::Unrecognized => self.hotkey_capture = HotkeyCapture::Unrecognized,
        }
        true
    }

    /// Move the auto-stop stepper by `steps`, never below zero
    pub fn step_auto_stop(&mut self, steps: i32) {
        for _ in 0..steps.unsigned_abs() {
            self.draft.auto_stop_minutes = next_auto_stop(self.draft.auto_stop_minutes, steps > 0);
        }
    }

    pub fn set_status(&mut self, text: impl Into<String>) {
        self.status = Some(StatusLine {
            text: text.into(),
            is_error: false,
        });
    }

    pub fn set_error(&mut self, text: impl Into<String>) {
        self.status = Some(StatusLine {
            text: text.into(),
            is_error: true,
        });
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// With a tray to come back through, a fully configured app starts
    /// out of the way.
    pub fn starts_minimized(config: &AppConfig, tray_available: bool) -> bool {
        tray_available && config.has_devices()
    }

    pub fn request_minimize(&mut self) {
        self.minimize_requested = true;
    }

    /// Returns a pending minimize request once
    pub fn take_minimize_request(&mut self) -> bool {
        std::mem::take(&mut self.minimize_requested)
    }
}
