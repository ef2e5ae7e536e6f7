//! Control surfaces: tray, global hotkey and the settings save flow
//!
//! The tray and hotkey run on their own threads. They drive the session
//! directly and hand window-level requests to the GUI thread as
//! `ControlCommand`s.

pub mod hotkey;
pub mod tray;

use crate::audio::AudioSession;
use crate::autostart::{self, Autostart};
use crate::error::SessionError;
use crate::settings::{AppConfig, MAX_BLOCKSIZE};
use crossbeam_channel::{unbounded, Receiver, Sender};
use hotkey::HotkeyRegistrar;
use log::{info, warn};

/// Requests that must be handled on the GUI thread
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    OpenSettings,
    Exit,
}

pub fn channel() -> (Sender<ControlCommand>, Receiver<ControlCommand>) {
    unbounded()
}

/// Editable copy of the settings shown in the settings view
#[derive(Clone, Debug, PartialEq)]
pub struct SettingsDraft {
    pub hotkey: String,
    pub blocksize: u32,
    pub samplerate: u32,
    pub auto_stop_minutes: f64,
    pub autostart: bool,
}

impl SettingsDraft {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            hotkey: config.hotkey.clone(),
            blocksize: config.blocksize,
            samplerate: config.samplerate,
            auto_stop_minutes: config.auto_stop_minutes,
            autostart: config.autostart,
        }
    }

    /// Check the draft before anything is written
    pub fn validate(&self) -> Result<(), String> {
        if self.hotkey.trim().is_empty() {
            return Err("Hotkey cannot be empty.".to_string());
        }
        if self.blocksize == 0 || self.samplerate == 0 {
            return Err("Block size and sample rate must be positive.".to_string());
        }
        if self.blocksize > MAX_BLOCKSIZE {
            return Err(format!("Block size cannot exceed {}.", MAX_BLOCKSIZE));
        }
        if !self.auto_stop_minutes.is_finite() || self.auto_stop_minutes < 0.0 {
            return Err("Auto-stop minutes must be zero or more.".to_string());
        }
        Ok(())
    }

    fn apply_to(&self, config: &mut AppConfig) {
        config.hotkey = self.hotkey.trim().to_string();
        config.blocksize = self.blocksize;
        config.samplerate = self.samplerate;
        config.auto_stop_minutes = self.auto_stop_minutes;
        config.autostart = self.autostart;
    }
}

/// What happened on save, for the status line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveReport {
    pub message: String,
    /// Saved, but a collaborator failed
    pub degraded: bool,
}

/// Persist the draft and apply it.
///
/// Fails only on validation or write errors; autostart and hotkey failures
/// are reported in the returned message.
pub fn save_settings(
    session: &AudioSession,
    draft: &SettingsDraft,
    registrar: &mut dyn HotkeyRegistrar,
    autostart: &dyn Autostart,
) -> Result<SaveReport, String> {
    draft.validate()?;

    let store = session.store();
    let mut config = store.load();
    draft.apply_to(&mut config);
    store.save(&config)?;
    info!("Settings saved to {}", store.path().display());

    let mut notes = Vec::new();

    if let Err(e) = autostart::apply(autostart, config.autostart) {
        warn!("{}", e);
        notes.push(e.user_message());
    }

    let hotkey_result = registrar.register(&config.hotkey);
    if let Err(e) = &hotkey_result {
        warn!("{}", e);
    }

    session.rearm_auto_stop();

    let mut message = match &hotkey_result {
        Ok(()) => format!("Settings saved. Hotkey: {}", config.hotkey),
        Err(e) => format!("Settings saved. {}", e.user_message()),
    };
    for note in &notes {
        message.push(' ');
        message.push_str(note);
    }

    Ok(SaveReport {
        message,
        degraded: hotkey_result.is_err() || !notes.is_empty(),
    })
}

/// Register the configured hotkey at startup, logging failures.
pub fn register_initial(registrar: &mut dyn HotkeyRegistrar, combo: &str) -> Option<SessionError> {
    match registrar.register(combo) {
        Ok(()) => None,
        Err(e) => {
            warn!("{}", e);
            Some(e)
        }
    }
}
