//! Main window for micpass

use crate::audio::{AudioSession, DeviceDescriptor, DeviceId, EngineState};
use crate::autostart::XdgAutostart;
use crate::control::hotkey::{self, GlobalHotkeys, HotkeyRegistrar, KeyModifiers, UnavailableHotkeys};
use crate::control::{self, tray, ControlCommand};
use crate::state::{ActiveView, AppState, HotkeyCapture, BLOCK_SIZES, SAMPLE_RATES};
use crossbeam_channel::Receiver;
use gpui::prelude::*;
use gpui::{InteractiveElement, *};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

/// How often the window picks up tray/hotkey changes
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Delay before a configured app minimizes itself after launch
const LAUNCH_MINIMIZE_DELAY: Duration = Duration::from_millis(400);

/// The root application view
pub struct MicPass {
    state: AppState,
    session: Arc<AudioSession>,
    hotkeys: Box<dyn HotkeyRegistrar>,
    autostart: XdgAutostart,
    /// Requests from the tray thread
    commands: Receiver<ControlCommand>,
    _poll_task: Option<Task<()>>,
}

impl MicPass {
    pub fn new(
        session: Arc<AudioSession>,
        commands: Receiver<ControlCommand>,
        cx: &mut Context<Self>,
    ) -> Self {
        let config = session.store().load();
        let mut state = AppState::new(&config, session.devices());
        state.engine_state = session.state();

        // The hotkey manager must live on the event loop thread
        let mut hotkeys: Box<dyn HotkeyRegistrar> = match GlobalHotkeys::new() {
            Ok(global) => {
                if let Err(e) = hotkey::spawn_listener(session.clone(), global.active_id()) {
                    error!("Failed to spawn hotkey listener: {}", e);
                }
                Box::new(global)
            }
            Err(e) => {
                error!("{}", e);
                Box::new(UnavailableHotkeys::new(e.to_string()))
            }
        };

        if let Some(e) = control::register_initial(hotkeys.as_mut(), &config.hotkey) {
            state.set_error(e.user_message());
        }

        let mut this = Self {
            state,
            session,
            hotkeys,
            autostart: XdgAutostart::new(),
            commands,
            _poll_task: None,
        };
        this.start_polling(cx);
        if AppState::starts_minimized(&config, tray::AVAILABLE) {
            this.minimize_after_launch(cx);
        }
        this
    }

    fn minimize_after_launch(&mut self, cx: &mut Context<Self>) {
        cx.spawn(async move |this: WeakEntity<Self>, cx: &mut AsyncApp| {
            cx.background_executor().timer(LAUNCH_MINIMIZE_DELAY).await;
            if let Some(this) = this.upgrade() {
                let _ = cx.update_entity(&this, |this, cx| {
                    this.state.request_minimize();
                    cx.notify();
                });
            }
        })
        .detach();
    }

    /// Poll for engine changes made by the tray, hotkey or auto-stop timer
    fn start_polling(&mut self, cx: &mut Context<Self>) {
        self._poll_task = Some(cx.spawn({
            async move |this: WeakEntity<Self>, cx: &mut AsyncApp| loop {
                cx.background_executor().timer(POLL_INTERVAL).await;

                let Some(this) = this.upgrade() else {
                    break;
                };
                let result = cx.update_entity(&this, |this, cx| this.poll(cx));
                if result.is_err() {
                    break;
                }
            }
        }));
    }

    fn poll(&mut self, cx: &mut Context<Self>) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                ControlCommand::OpenSettings => {
                    self.open_settings();
                    cx.activate(true);
                    cx.notify();
                }
                ControlCommand::Exit => {
                    self.exit(cx);
                    return;
                }
            }
        }

        let engine_state = self.session.state();
        if engine_state != self.state.engine_state {
            self.state.engine_state = engine_state;
            cx.notify();
        }
    }

    fn refresh_devices(&mut self) {
        let config = self.session.store().load();
        self.state.set_devices(self.session.devices(), &config);
    }

    /// Store the devices picked in the lists
    fn save_devices(&self) -> Result<(), String> {
        let store = self.session.store();
        let mut config = store.load();
        config.input_device = self.state.selected_input;
        config.output_device = self.state.selected_output;
        store.save(&config)
    }

    fn start_stop(&mut self) {
        match self.session.state() {
            EngineState::Running => {
                self.session.stop();
                self.state.set_status("Stopped");
            }
            EngineState::Muted => {
                self.state
                    .set_error("Muted. Unmute first to start the passthrough.");
            }
            EngineState::Idle => {
                if let Err(e) = self.save_devices() {
                    self.state.set_error(e);
                } else {
                    match self.session.start() {
                        Ok(()) => {
                            self.state.set_status("Mic is live");
                            if tray::AVAILABLE {
                                self.state.request_minimize();
                            }
                        }
                        Err(e) => {
                            error!("{}", e);
                            self.state.set_error(e.user_message());
                        }
                    }
                }
            }
        }
        self.state.engine_state = self.session.state();
    }

    fn toggle_mute(&mut self) {
        match self.session.toggle_mute() {
            Ok(EngineState::Muted) => self.state.set_status("Muted"),
            Ok(_) => self.state.set_status("Unmuted"),
            Err(e) => {
                error!("{}", e);
                self.state.set_error(e.user_message());
            }
        }
        self.state.engine_state = self.session.state();
    }

    fn open_settings(&mut self) {
        let config = self.session.store().load();
        self.state.open_settings(&config);
        self.state.clear_status();
    }

    fn save_settings(&mut self) {
        let result = control::save_settings(
            &self.session,
            &self.state.draft,
            self.hotkeys.as_mut(),
            &self.autostart,
        );
        match result {
            Ok(report) if report.degraded => self.state.set_error(report.message),
            Ok(report) => self.state.set_status(report.message),
            Err(e) => self.state.set_error(e),
        }
    }

    /// Unregister the hotkey, stop audio and quit
    fn exit(&mut self, cx: &mut Context<Self>) {
        info!("Exiting");
        self.hotkeys.unregister();
        self.session.stop();
        cx.quit();
    }
}

impl Render for MicPass {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        if self.state.take_minimize_request() {
            window.minimize_window();
        }
        let active_view = self.state.active_view.clone();

        div()
            .size_full()
            .flex()
            .flex_col()
            .bg(rgb(0x0f0f1a))
            .key_context("MicPass")
            .on_key_down(cx.listener(|this, event: &KeyDownEvent, _window, cx| {
                let keystroke = &event.keystroke;
                let mods = KeyModifiers {
                    ctrl: keystroke.modifiers.control,
                    alt: keystroke.modifiers.alt,
                    shift: keystroke.modifiers.shift,
                    win: keystroke.modifiers.platform,
                };
                if this.state.capture_key(mods, &keystroke.key) {
                    cx.notify();
                    return;
                }
                match keystroke.key.as_str() {
                    "q" if keystroke.modifiers.control => this.exit(cx),
                    "escape" if this.state.active_view == ActiveView::Settings => {
                        this.state.navigate_to(ActiveView::Main);
                        cx.notify();
                    }
                    _ => {}
                }
            }))
            // Custom titlebar
            .child(
                div()
                    .id("titlebar")
                    .flex()
                    .items_center()
                    .justify_between()
                    .w_full()
                    .h(px(36.0))
                    .bg(rgb(0x12121f))
                    .border_b_1()
                    .border_color(rgb(0x2d2d44))
                    .child(
                        // Window title (left side) - draggable area
                        div()
                            .id("titlebar-drag-area")
                            .flex()
                            .flex_grow()
                            .items_center()
                            .h_full()
                            .gap_2()
                            .px_4()
                            .on_mouse_down(
                                MouseButton::Left,
                                cx.listener(|_this, _event: &MouseDownEvent, window, _cx| {
                                    window.start_window_move();
                                }),
                            )
                            .child(
                                svg()
                                    .path("icons/mic.svg")
                                    .w(px(16.0))
                                    .h(px(16.0))
                                    .text_color(rgb(0xe94560)),
                            )
                            .child(
                                div()
                                    .text_sm()
                                    .font_weight(FontWeight::SEMIBOLD)
                                    .text_color(rgb(0xcccccc))
                                    .child("Live Mic to Speaker"),
                            ),
                    )
                    .child(
                        // Close hides to the tray; the passthrough keeps running
                        div()
                            .id("close-button")
                            .w(px(46.0))
                            .h(px(36.0))
                            .flex()
                            .items_center()
                            .justify_center()
                            .cursor_pointer()
                            .hover(|style| style.bg(rgb(0xe81123)))
                            .on_click(cx.listener(|_this, _, window, _cx| {
                                window.minimize_window();
                            }))
                            .child(div().text_lg().text_color(rgb(0xcccccc)).child("×")),
                    ),
            )
            .child(
                div()
                    .id("content")
                    .flex()
                    .flex_col()
                    .flex_grow()
                    .overflow_y_scroll()
                    .child(match active_view {
                        ActiveView::Main => self.render_main(cx).into_any_element(),
                        ActiveView::Settings => self.render_settings(cx).into_any_element(),
                    }),
            )
            .child(self.render_status_bar())
    }
}

impl MicPass {
    fn render_main(&mut self, cx: &mut Context<Self>) -> impl IntoElement {
        let engine_state = self.state.engine_state;
        let is_running = engine_state == EngineState::Running;
        let is_muted = engine_state == EngineState::Muted;

        let inputs: Vec<_> = self
            .state
            .devices
            .inputs
            .iter()
            .map(|device| {
                let selected = self.state.selected_input == Some(device.id);
                self.render_device_row(device, selected, true, cx)
            })
            .collect();
        let outputs: Vec<_> = self
            .state
            .devices
            .outputs
            .iter()
            .map(|device| {
                let selected = self.state.selected_output == Some(device.id);
                self.render_device_row(device, selected, false, cx)
            })
            .collect();

        div()
            .flex()
            .flex_col()
            .gap_6()
            .p_6()
            .child(settings_section(
                "Mic Input",
                device_list(inputs, "No microphones found"),
            ))
            .child(settings_section(
                "Speaker Output",
                device_list(outputs, "No speakers found"),
            ))
            .child(
                div()
                    .flex()
                    .items_center()
                    .gap_3()
                    .child(
                        div()
                            .id("start-stop")
                            .px_4()
                            .py_2()
                            .rounded_md()
                            .bg(if is_running { rgb(0xf44336) } else { rgb(0x4CAF50) })
                            .text_color(rgb(0xffffff))
                            .font_weight(FontWeight::SEMIBOLD)
                            .cursor_pointer()
                            .hover(|s| s.opacity(0.8))
                            .on_click(cx.listener(|this, _, _w, cx| {
                                this.start_stop();
                                cx.notify();
                            }))
                            .child(if is_running { "Stop" } else { "Start" }),
                    )
                    .child(
                        div()
                            .id("mute")
                            .flex()
                            .items_center()
                            .gap_2()
                            .px_4()
                            .py_2()
                            .rounded_md()
                            .bg(if is_muted { rgb(0xe94560) } else { rgb(0x2d2d44) })
                            .text_color(rgb(0xffffff))
                            .cursor_pointer()
                            .hover(|s| s.opacity(0.8))
                            .on_click(cx.listener(|this, _, _w, cx| {
                                this.toggle_mute();
                                cx.notify();
                            }))
                            .child(
                                svg()
                                    .path(if is_muted {
                                        "icons/mic-off.svg"
                                    } else {
                                        "icons/mic.svg"
                                    })
                                    .w(px(14.0))
                                    .h(px(14.0))
                                    .text_color(rgb(0xffffff)),
                            )
                            .child(if is_muted { "Unmute" } else { "Mute" }),
                    )
                    .child(
                        div()
                            .id("refresh-devices")
                            .px_4()
                            .py_2()
                            .rounded_md()
                            .bg(rgb(0x2d2d44))
                            .text_color(rgb(0xcccccc))
                            .cursor_pointer()
                            .hover(|s| s.bg(rgb(0x3d3d54)))
                            .on_click(cx.listener(|this, _, _w, cx| {
                                this.refresh_devices();
                                cx.notify();
                            }))
                            .child("Refresh"),
                    )
                    .child(div().flex_grow())
                    .child(
                        div()
                            .id("open-settings")
                            .flex()
                            .items_center()
                            .gap_2()
                            .px_4()
                            .py_2()
                            .rounded_md()
                            .bg(rgb(0x2d2d44))
                            .text_color(rgb(0xcccccc))
                            .cursor_pointer()
                            .hover(|s| s.bg(rgb(0x3d3d54)))
                            .on_click(cx.listener(|this, _, _w, cx| {
                                this.open_settings();
                                cx.notify();
                            }))
                            .child(
                                svg()
                                    .path("icons/settings.svg")
                                    .w(px(14.0))
                                    .h(px(14.0))
                                    .text_color(rgb(0xcccccc)),
                            )
                            .child("Settings"),
                    ),
            )
    }

    fn render_device_row(
        &self,
        device: &DeviceDescriptor,
        is_selected: bool,
        is_input: bool,
        cx: &mut Context<Self>,
    ) -> impl IntoElement {
        let id: DeviceId = device.id;
        let channels = if is_input {
            device.max_input_channels
        } else {
            device.max_output_channels
        };
        let prefix = if is_input { "in" } else { "out" };

        div()
            .id(SharedString::from(format!("{}-{}", prefix, id)))
            .flex()
            .items_center()
            .justify_between()
            .px_4()
            .py_2()
            .rounded_md()
            .bg(if is_selected { rgb(0x2d2d44) } else { rgb(0x1a1a2e) })
            .cursor_pointer()
            .hover(|s| s.bg(rgb(0x2d2d44)))
            .on_click(cx.listener(move |this, _, _w, cx| {
                if is_input {
                    this.state.select_input(id);
                } else {
                    this.state.select_output(id);
                }
                cx.notify();
            }))
            .child(
                div()
                    .text_sm()
                    .text_color(if is_selected {
                        rgb(0xe94560)
                    } else {
                        rgb(0xcccccc)
                    })
                    .child(device.name.clone()),
            )
            .child(
                div()
                    .text_xs()
                    .text_color(rgb(0x666666))
                    .child(format!("{} ch", channels)),
            )
    }

    fn render_settings(&mut self, cx: &mut Context<Self>) -> impl IntoElement {
        let draft = self.state.draft.clone();
        let capture = self.state.hotkey_capture.clone();

        let hotkey_label = match capture {
            HotkeyCapture::Inactive => draft.hotkey.clone(),
            HotkeyCapture::Waiting => "Press a key combination...".to_string(),
            HotkeyCapture::Unrecognized => "Unrecognized key, try again...".to_string(),
        };

        let block_chips: Vec<_> = BLOCK_SIZES
            .iter()
            .map(|&size| {
                choice_chip(format!("block-{}", size), size.to_string(), size == draft.blocksize)
                    .on_click(cx.listener(move |this, _, _w, cx| {
                        this.state.draft.blocksize = size;
                        cx.notify();
                    }))
            })
            .collect();

        let rate_chips: Vec<_> = SAMPLE_RATES
            .iter()
            .map(|&rate| {
                choice_chip(format!("rate-{}", rate), rate.to_string(), rate == draft.samplerate)
                    .on_click(cx.listener(move |this, _, _w, cx| {
                        this.state.draft.samplerate = rate;
                        cx.notify();
                    }))
            })
            .collect();

        let auto_stop_label = if draft.auto_stop_minutes > 0.0 {
            format!("{} min", draft.auto_stop_minutes)
        } else {
            "Off".to_string()
        };

        div()
            .flex()
            .flex_col()
            .gap_6()
            .p_6()
            .child(
                div()
                    .text_xl()
                    .font_weight(FontWeight::BOLD)
                    .text_color(rgb(0xffffff))
                    .child("Settings"),
            )
            .child(settings_section(
                "Hotkey",
                setting_row(
                    "Mute Toggle",
                    "Works while the window is hidden",
                    div()
                        .flex()
                        .items_center()
                        .gap_2()
                        .child(
                            div()
                                .px_3()
                                .py_2()
                                .rounded_md()
                                .bg(rgb(0x2d2d44))
                                .text_sm()
                                .text_color(rgb(0xcccccc))
                                .child(hotkey_label),
                        )
                        .child(
                            div()
                                .id("record-hotkey")
                                .px_3()
                                .py_2()
                                .rounded_md()
                                .bg(rgb(0x4a9eff))
                                .text_sm()
                                .text_color(rgb(0xffffff))
                                .cursor_pointer()
                                .hover(|s| s.opacity(0.8))
                                .on_click(cx.listener(|this, _, _w, cx| {
                                    this.state.begin_hotkey_capture();
                                    cx.notify();
                                }))
                                .child("Record Hotkey"),
                        ),
                ),
            ))
            .child(settings_section(
                "Audio",
                div()
                    .flex()
                    .flex_col()
                    .gap_4()
                    .child(setting_row(
                        "Block Size",
                        "Frames per callback; smaller is lower latency",
                        div().flex().flex_wrap().gap_1().children(block_chips),
                    ))
                    .child(setting_row(
                        "Sample Rate",
                        "Both devices must support it",
                        div().flex().flex_wrap().gap_1().children(rate_chips),
                    ))
                    .child(setting_row(
                        "Auto-Stop",
                        "Stop the passthrough after this long",
                        div()
                            .flex()
                            .items_center()
                            .gap_2()
                            .child(stepper_button("auto-stop-less", "-").on_click(cx.listener(
                                |this, _, _w, cx| {
                                    this.state.step_auto_stop(-1);
                                    cx.notify();
                                },
                            )))
                            .child(
                                div()
                                    .w(px(64.0))
                                    .text_sm()
                                    .text_color(rgb(0xcccccc))
                                    .child(auto_stop_label),
                            )
                            .child(stepper_button("auto-stop-more", "+").on_click(cx.listener(
                                |this, _, _w, cx| {
                                    this.state.step_auto_stop(1);
                                    cx.notify();
                                },
                            ))),
                    )),
            ))
            .child(settings_section(
                "System",
                setting_row(
                    "Start on Login",
                    "Launch micpass when you log in",
                    div()
                        .id("autostart-toggle")
                        .on_click(cx.listener(|this, _, _w, cx| {
                            this.state.draft.autostart = !this.state.draft.autostart;
                            cx.notify();
                        }))
                        .child(toggle_switch(draft.autostart)),
                ),
            ))
            .child(
                div()
                    .flex()
                    .gap_3()
                    .child(
                        div()
                            .id("save-settings")
                            .px_4()
                            .py_2()
                            .rounded_md()
                            .bg(rgb(0x4CAF50))
                            .text_color(rgb(0xffffff))
                            .font_weight(FontWeight::SEMIBOLD)
                            .cursor_pointer()
                            .hover(|s| s.opacity(0.8))
                            .on_click(cx.listener(|this, _, _w, cx| {
                                this.save_settings();
                                cx.notify();
                            }))
                            .child("Save"),
                    )
                    .child(
                        div()
                            .id("back")
                            .px_4()
                            .py_2()
                            .rounded_md()
                            .bg(rgb(0x2d2d44))
                            .text_color(rgb(0xcccccc))
                            .cursor_pointer()
                            .hover(|s| s.bg(rgb(0x3d3d54)))
                            .on_click(cx.listener(|this, _, _w, cx| {
                                this.state.navigate_to(ActiveView::Main);
                                cx.notify();
                            }))
                            .child("Back"),
                    ),
            )
    }

    fn render_status_bar(&self) -> impl IntoElement {
        let engine_state = self.state.engine_state;
        let dot = match engine_state {
            EngineState::Running => rgb(0x4CAF50),
            EngineState::Muted => rgb(0xFF9800),
            EngineState::Idle => rgb(0xf44336),
        };
        let status = self.state.status.clone();

        div()
            .flex()
            .items_center()
            .gap_3()
            .px_4()
            .py_2()
            .border_t_1()
            .border_color(rgb(0x2d2d44))
            .bg(rgb(0x12121f))
            .child(div().w(px(8.0)).h(px(8.0)).rounded_full().bg(dot))
            .child(
                div()
                    .text_xs()
                    .text_color(rgb(0xcccccc))
                    .child(engine_state.label()),
            )
            .when_some(status, |el, status| {
                el.child(
                    div()
                        .text_xs()
                        .text_color(if status.is_error {
                            rgb(0xf44336)
                        } else {
                            rgb(0x888888)
                        })
                        .child(status.text),
                )
            })
    }
}

fn device_list(rows: Vec<impl IntoElement>, empty: &str) -> impl IntoElement {
    div()
        .flex()
        .flex_col()
        .gap_1()
        .when(rows.is_empty(), |el| {
            el.child(
                div()
                    .text_sm()
                    .text_color(rgb(0x888888))
                    .child(empty.to_string()),
            )
        })
        .children(rows)
}

fn settings_section(title: &str, content: impl IntoElement) -> impl IntoElement {
    div()
        .flex()
        .flex_col()
        .gap_3()
        .child(
            div()
                .text_lg()
                .font_weight(FontWeight::SEMIBOLD)
                .text_color(rgb(0xe94560))
                .child(title.to_string()),
        )
        .child(
            div()
                .p_4()
                .rounded_lg()
                .bg(rgb(0x1a1a2e))
                .border_1()
                .border_color(rgb(0x2d2d44))
                .child(content),
        )
}

fn setting_row(label: &str, description: &str, control: impl IntoElement) -> impl IntoElement {
    div()
        .flex()
        .justify_between()
        .items_center()
        .gap_4()
        .child(
            div()
                .flex()
                .flex_col()
                .flex_grow()
                .child(
                    div()
                        .text_base()
                        .text_color(rgb(0xcccccc))
                        .child(label.to_string()),
                )
                .child(
                    div()
                        .text_sm()
                        .text_color(rgb(0x666666))
                        .child(description.to_string()),
                ),
        )
        .child(control)
}

fn choice_chip(id: String, label: String, is_selected: bool) -> Stateful<Div> {
    div()
        .id(SharedString::from(id))
        .px_2()
        .py_1()
        .rounded_md()
        .bg(if is_selected {
            rgb(0xe94560)
        } else {
            rgb(0x2d2d44)
        })
        .text_xs()
        .text_color(if is_selected {
            rgb(0xffffff)
        } else {
            rgb(0x888888)
        })
        .cursor_pointer()
        .hover(|style| style.opacity(0.9))
        .child(label)
}

fn stepper_button(id: &'static str, label: &'static str) -> Stateful<Div> {
    div()
        .id(id)
        .w(px(28.0))
        .h(px(28.0))
        .flex()
        .items_center()
        .justify_center()
        .rounded_md()
        .bg(rgb(0x2d2d44))
        .text_color(rgb(0xcccccc))
        .cursor_pointer()
        .hover(|s| s.bg(rgb(0x3d3d54)))
        .child(label)
}

fn toggle_switch(is_on: bool) -> impl IntoElement {
    let bg = if is_on { rgb(0x4CAF50) } else { rgb(0x2d2d44) };
    let dot_position = if is_on { px(22.0) } else { px(2.0) };

    div()
        .w(px(44.0))
        .h(px(24.0))
        .rounded_full()
        .bg(bg)
        .cursor_pointer()
        .relative()
        .child(
            div()
                .absolute()
                .top(px(2.0))
                .left(dot_position)
                .w(px(20.0))
                .h(px(20.0))
                .rounded_full()
                .bg(rgb(0xffffff)),
        )
}
