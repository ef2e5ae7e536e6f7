//! micpass - route a live microphone to a speaker
//!
//! This is the main entry point for the micpass application.

mod app;
mod assets;
mod audio;
mod autostart;
mod cli;
mod control;
mod error;
mod settings;
mod state;
mod tokio_runtime;

use app::MicPass;
use assets::Assets;
use audio::{AudioBackend, AudioSession, CpalBackend};
use autostart::XdgAutostart;
use clap::Parser;
use gpui::prelude::*;
use gpui::*;
use log::{info, warn};
use settings::ConfigStore;
use std::sync::Arc;

/// App ID for Wayland/GNOME desktop integration
const APP_ID: &str = "com.micpass.LiveMicToSpeaker";

fn print_devices(backend: &dyn AudioBackend) {
    let lists = audio::list_devices(backend);
    println!("Inputs:");
    for device in &lists.inputs {
        println!("  [{}] {} ({} ch)", device.id, device.name, device.max_input_channels);
    }
    println!("Outputs:");
    for device in &lists.outputs {
        println!("  [{}] {} ({} ch)", device.id, device.name, device.max_output_channels);
    }
}

fn main() {
    // Parse command-line arguments and initialize logging
    let args = cli::Args::parse();
    cli::init_logging(&args);

    let store = match &args.config {
        Some(path) => ConfigStore::with_path(path),
        None => ConfigStore::new(),
    };
    let backend: Arc<dyn AudioBackend> = Arc::new(CpalBackend::new());

    if args.list_devices {
        print_devices(backend.as_ref());
        return;
    }

    info!("Starting micpass (config: {})", store.path().display());

    // Auto-stop timers run on the global Tokio runtime
    tokio_runtime::init();

    let config = store.load();
    let session = AudioSession::new(backend, store, tokio_runtime::handle());

    if config.autostart {
        if let Err(e) = autostart::apply(&XdgAutostart::new(), true) {
            warn!("{}", e);
        }
    }

    let (commands_tx, commands_rx) = control::channel();
    control::tray::spawn(session.clone(), commands_tx);

    if args.start {
        if let Err(e) = session.start() {
            warn!("{}", e.user_message());
        }
    }

    Application::new().with_assets(Assets).run(move |cx: &mut App| {
        let bounds = Bounds::centered(None, size(px(720.0), px(600.0)), cx);
        cx.open_window(
            WindowOptions {
                window_bounds: Some(WindowBounds::Windowed(bounds)),
                // No titlebar - we'll draw our own
                titlebar: None,
                window_decorations: Some(WindowDecorations::Client),
                app_id: Some(APP_ID.to_string()),
                ..Default::default()
            },
            |window, cx| {
                window.set_app_id(APP_ID);
                cx.new(|cx| MicPass::new(session, commands_rx, cx))
            },
        )
        .expect("Failed to open window");
    });
}
