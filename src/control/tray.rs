//! System tray icon
//!
//! The tray lives on its own GTK thread. Its menu offers the start/stop
//! toggle, the settings view and exit; the icon is red while no audio is
//! flowing and green while the passthrough is live.

use super::ControlCommand;
use crate::audio::{AudioSession, EngineState};
use crossbeam_channel::Sender;
use log::warn;
use std::sync::Arc;

const ICON_SIZE: u32 = 32;

/// Whether a tray icon is offered on this platform
pub const AVAILABLE: bool = cfg!(target_os = "linux");

/// Solid square icon pixels
fn square_rgba(r: u8, g: u8, b: u8) -> Vec<u8> {
    let mut pixels = vec![0u8; (ICON_SIZE * ICON_SIZE * 4) as usize];
    for px in pixels.chunks_exact_mut(4) {
        px.copy_from_slice(&[r, g, b, 255]);
    }
    pixels
}

fn state_rgba(state: EngineState) -> Vec<u8> {
    match state {
        EngineState::Running => square_rgba(0, 200, 0),
        EngineState::Idle | EngineState::Muted => square_rgba(200, 0, 0),
    }
}

fn tooltip(state: EngineState) -> String {
    format!("Live Mic to Speaker: {}", state.label())
}

/// Hand a menu request to the window; false once the window is gone
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn forward(commands: &Sender<ControlCommand>, command: ControlCommand) -> bool {
    match commands.send(command) {
        Ok(()) => true,
        Err(e) => {
            warn!("Dropping tray request {:?}: window is gone", e.into_inner());
            false
        }
    }
}

/// Start the tray thread. Failures are logged; the app runs without a tray.
#[cfg(target_os = "linux")]
pub fn spawn(session: Arc<AudioSession>, commands: Sender<ControlCommand>) {
    use log::error;

    let result = std::thread::Builder::new()
        .name("micpass-tray".to_string())
        .spawn(move || {
            if let Err(e) = linux::run(session, commands) {
                error!("Tray unavailable: {:#}", e);
            }
        });

    if let Err(e) = result {
        error!("Failed to spawn tray thread: {}", e);
    }
}

#[cfg(not(target_os = "linux"))]
pub fn spawn(_session: Arc<AudioSession>, _commands: Sender<ControlCommand>) {
    log::warn!("Tray icon is only available on Linux; use the window instead");
}

#[cfg(target_os = "linux")]
mod linux {
    use super::*;
    use anyhow::{Context as _, Result};
    use gtk::glib;
    use log::{debug, error, info, warn};
    use std::time::Duration;
    use tray_icon::menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem};
    use tray_icon::{Icon, TrayIconBuilder};

    fn icon(state: EngineState) -> Result<Icon> {
        Icon::from_rgba(state_rgba(state), ICON_SIZE, ICON_SIZE).context("Failed to build tray icon")
    }

    pub(super) fn run(session: Arc<AudioSession>, commands: Sender<ControlCommand>) -> Result<()> {
        gtk::init().context("Failed to initialize GTK")?;

        let toggle = MenuItem::new("Toggle Mic", true, None);
        let settings = MenuItem::new("Settings", true, None);
        let exit = MenuItem::new("Exit", true, None);
        let menu = Menu::with_items(&[
            &toggle,
            &settings,
            &PredefinedMenuItem::separator(),
            &exit,
        ])
        .context("Failed to build tray menu")?;

        let mut shown = session.state();
        let tray = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_tooltip(tooltip(shown))
            .with_icon(icon(shown)?)
            .build()
            .context("Failed to create tray icon")?;
        info!("Tray icon ready");

        let toggle_id = toggle.id().clone();
        let settings_id = settings.id().clone();
        let exit_id = exit.id().clone();

        glib::timeout_add_local(Duration::from_millis(200), move || {
            while let Ok(event) = MenuEvent::receiver().try_recv() {
                if event.id == toggle_id {
                    match session.toggle() {
                        Ok(state) => debug!("Tray toggle: {:?}", state),
                        Err(e) => error!("Tray toggle failed: {}", e),
                    }
                } else if event.id == settings_id {
                    forward(&commands, ControlCommand::OpenSettings);
                } else if event.id == exit_id {
                    forward(&commands, ControlCommand::Exit);
                }
            }

            let state = session.state();
            if state != shown {
                shown = state;
                match icon(state) {
                    Ok(icon) => {
                        if let Err(e) = tray.set_icon(Some(icon)) {
                            error!("Failed to update tray icon: {}", e);
                        }
                    }
                    Err(e) => error!("{:#}", e),
                }
                if let Err(e) = tray.set_tooltip(Some(tooltip(state))) {
                    warn!("Failed to update tray tooltip: {}", e);
                }
            }

            glib::ControlFlow::Continue
        });

        gtk::main();
        Ok(())
    }
}
