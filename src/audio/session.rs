//! The passthrough session
//!
//! One `AudioSession` exists per process and is shared (`Arc`) with every
//! trigger: the window, the tray thread, the hotkey listener and the
//! auto-stop timer. A single mutex serializes all transitions; the audio
//! callbacks never touch it.

use super::backend::{AudioBackend, DuplexStream};
use super::device::{list_devices, DeviceLists};
use super::scheduler::AutoStopScheduler;
use crate::error::SessionError;
use crate::settings::ConfigStore;
use log::{info, warn};
use std::sync::{Arc, Mutex, Weak};
use tokio::runtime::Handle;

/// Current state of the passthrough
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// No stream open
    Idle,
    /// Stream open and copying audio
    Running,
    /// Stream closed on user request; no start until unmuted
    Muted,
}

impl EngineState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Stopped",
            Self::Running => "Live",
            Self::Muted => "Muted",
        }
    }
}

struct SessionInner {
    state: EngineState,
    /// Whether unmuting should reopen the stream
    resume_on_unmute: bool,
    stream: Option<Box<dyn DuplexStream>>,
}

pub struct AudioSession {
    backend: Arc<dyn AudioBackend>,
    store: ConfigStore,
    auto_stop: AutoStopScheduler,
    inner: Mutex<SessionInner>,
    this: Weak<AudioSession>,
}

impl AudioSession {
    /// Create the session. Auto-stop timers run on `runtime`.
    pub fn new(backend: Arc<dyn AudioBackend>, store: ConfigStore, runtime: Handle) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            backend,
            store,
            auto_stop: AutoStopScheduler::new(runtime),
            inner: Mutex::new(SessionInner {
                state: EngineState::Idle,
                resume_on_unmute: false,
                stream: None,
            }),
            this: this.clone(),
        })
    }

    pub fn state(&self) -> EngineState {
        self.inner.lock().unwrap().state
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Query the device catalog
    pub fn devices(&self) -> DeviceLists {
        list_devices(self.backend.as_ref())
    }

    /// Open the configured stream. No-op while Running or Muted.
    pub fn start(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != EngineState::Idle {
            return Ok(());
        }
        self.start_locked(&mut inner)
    }

    /// Close the stream. Never fails; close errors are only logged.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        self.stop_locked(&mut inner);
    }

    /// Flip the latched mute flag, closing or reopening the stream.
    ///
    /// Returns the state the session settled in. When the reopen fails the
    /// session settles Idle and the error is returned.
    pub fn toggle_mute(&self) -> Result<EngineState, SessionError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.state == EngineState::Muted {
            inner.state = EngineState::Idle;
            if inner.resume_on_unmute {
                inner.resume_on_unmute = false;
                self.start_locked(&mut inner)?;
            }
            info!("Unmuted ({:?})", inner.state);
        } else {
            inner.resume_on_unmute = inner.state == EngineState::Running;
            self.stop_locked(&mut inner);
            inner.state = EngineState::Muted;
            info!("Muted");
        }

        Ok(inner.state)
    }

    /// Start-or-stop, as offered by the tray and window.
    /// Does nothing while muted.
    pub fn toggle(&self) -> Result<EngineState, SessionError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            EngineState::Running => self.stop_locked(&mut inner),
            EngineState::Idle => self.start_locked(&mut inner)?,
            EngineState::Muted => {}
        }
        Ok(inner.state)
    }

    /// Re-read the auto-stop setting and restart the timer if running
    pub fn rearm_auto_stop(&self) {
        let inner = self.inner.lock().unwrap();
        if inner.state == EngineState::Running {
            let config = self.store.load();
            self.arm_auto_stop(config.auto_stop_duration());
        }
    }

    /// Whether an auto-stop timer is pending
    pub fn auto_stop_armed(&self) -> bool {
        self.auto_stop.is_armed()
    }

    fn start_locked(&self, inner: &mut SessionInner) -> Result<(), SessionError> {
        let config = self.store.load();
        let stream_config = config.stream_config()?;

        let stream = self.backend.open_duplex(&stream_config)?;
        inner.stream = Some(stream);
        inner.state = EngineState::Running;
        info!("Passthrough started");

        self.arm_auto_stop(config.auto_stop_duration());
        Ok(())
    }

    fn stop_locked(&self, inner: &mut SessionInner) {
        self.auto_stop.cancel();

        if let Some(stream) = inner.stream.take() {
            match stream.close() {
                Ok(diagnostics) if !diagnostics.is_clean() => {
                    warn!("Stream closed with glitches: {:?}", diagnostics);
                }
                Ok(_) => {}
                Err(e) => warn!("{}", e),
            }
            info!("Passthrough stopped");
        }

        if inner.state == EngineState::Running {
            inner.state = EngineState::Idle;
        }
    }

    fn arm_auto_stop(&self, duration: Option<std::time::Duration>) {
        let this = self.this.clone();
        self.auto_stop.arm(duration, move |generation| {
            if let Some(session) = this.upgrade() {
                session.auto_stop(generation);
            }
        });
    }

    fn auto_stop(&self, generation: u64) {
        let mut inner = self.inner.lock().unwrap();
        if !self.auto_stop.is_current(generation) {
            return;
        }
        info!("Auto-stop time reached");
        self.stop_locked(&mut inner);
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(stream) = inner.stream.take() {
                if let Err(e) = stream.close() {
                    warn!("{}", e);
                }
            }
        }
    }
}
