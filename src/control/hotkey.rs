//! Global hotkey: capture, parsing and registration
//!
//! Combos are stored in a small canonical form, `ctrl+shift+f5`, and
//! translated to global-hotkey accelerators only when registering.

use crate::audio::AudioSession;
use crate::error::SessionError;
use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

/// Modifiers held during a captured key press
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyModifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub win: bool,
}

/// Result of feeding one key press to the recorder
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured(String),
    /// Escape: stop recording, keep the previous combo
    Cancelled,
    /// No usable base key (e.g. a bare modifier); keep waiting
    Unrecognized,
}

const NAMED_KEYS: &[(&str, &str)] = &[
    ("space", "space"),
    ("tab", "tab"),
    ("backspace", "backspace"),
    ("enter", "enter"),
    ("return", "enter"),
    ("left", "left"),
    ("right", "right"),
    ("up", "up"),
    ("down", "down"),
    ("insert", "insert"),
    ("delete", "delete"),
    ("home", "home"),
    ("end", "end"),
    ("pageup", "pageup"),
    ("pagedown", "pagedown"),
    ("+", "plus"),
    ("-", "minus"),
    (",", "comma"),
    (".", "dot"),
    ("/", "slash"),
    ("\\", "backslash"),
    (";", "semicolon"),
    ("`", "grave"),
];

const MODIFIER_KEYS: &[&str] = &["shift", "control", "ctrl", "alt", "platform", "super", "cmd", "fn"];

fn base_token(key: &str) -> Option<String> {
    let lower = key.to_lowercase();

    if let Some((_, token)) = NAMED_KEYS.iter().find(|(name, _)| *name == lower) {
        return Some(token.to_string());
    }

    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        if (1..=35).contains(&n) {
            return Some(format!("f{}", n));
        }
    }

    if MODIFIER_KEYS.contains(&lower.as_str()) {
        return None;
    }

    // Any other single printable character, lowercased
    let mut chars = lower.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_whitespace() && !c.is_control() => Some(c.to_string()),
        _ => None,
    }
}

/// Turn one key press into a canonical combo.
///
/// `key` is the platform key name of the press (`"a"`, `"f5"`, `"pageup"`,
/// `"-"`). Modifiers are emitted in the fixed order ctrl, alt, shift, win.
pub fn capture(mods: KeyModifiers, key: &str) -> CaptureOutcome {
    if key.eq_ignore_ascii_case("escape") {
        return CaptureOutcome::Cancelled;
    }

    let Some(token) = base_token(key) else {
        return CaptureOutcome::Unrecognized;
    };

    let mut parts = Vec::with_capacity(5);
    if mods.ctrl {
        parts.push("ctrl".to_string());
    }
    if mods.alt {
        parts.push("alt".to_string());
    }
    if mods.shift {
        parts.push("shift".to_string());
    }
    if mods.win {
        parts.push("win".to_string());
    }
    parts.push(token);

    CaptureOutcome::Captured(parts.join("+"))
}

fn accelerator_key(token: &str) -> Option<String> {
    let named = match token {
        "space" => "Space",
        "tab" => "Tab",
        "backspace" => "Backspace",
        "enter" => "Enter",
        "left" => "ArrowLeft",
        "right" => "ArrowRight",
        "up" => "ArrowUp",
        "down" => "ArrowDown",
        "insert" => "Insert",
        "delete" => "Delete",
        "home" => "Home",
        "end" => "End",
        "pageup" => "PageUp",
        "pagedown" => "PageDown",
        "plus" | "=" => "Equal",
        "minus" => "Minus",
        "comma" => "Comma",
        "dot" => "Period",
        "slash" => "Slash",
        "backslash" => "Backslash",
        "semicolon" => "Semicolon",
        "grave" => "Backquote",
        _ => "",
    };
    if !named.is_empty() {
        return Some(named.to_string());
    }

    if token.len() > 1 && token.starts_with('f') && token[1..].parse::<u8>().is_ok() {
        return Some(token.to_uppercase());
    }

    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_lowercase() => Some(format!("Key{}", c.to_ascii_uppercase())),
        (Some(c), None) if c.is_ascii_digit() => Some(format!("Digit{}", c)),
        (Some(c), None) if c.is_ascii_punctuation() => Some(c.to_string()),
        _ => None,
    }
}

/// Translate a canonical combo into a global-hotkey accelerator string.
pub fn to_accelerator(combo: &str) -> Result<String, SessionError> {
    let combo = combo.trim().to_lowercase();
    if combo.is_empty() {
        return Err(SessionError::hotkey(combo, "empty hotkey"));
    }

    // "ctrl++" style combos spell the plus key as the last part
    let (mods, key) = match combo.strip_suffix("++") {
        Some(rest) => (rest, "plus"),
        None => combo.rsplit_once('+').unwrap_or(("", combo.as_str())),
    };

    let mut parts = Vec::new();
    for modifier in mods.split('+').filter(|m| !m.is_empty()) {
        let name = match modifier {
            "ctrl" | "control" => "control",
            "alt" | "option" => "alt",
            "shift" => "shift",
            "win" | "super" | "meta" | "cmd" => "super",
            other => {
                return Err(SessionError::hotkey(
                    &combo,
                    format!("unknown modifier '{}'", other),
                ))
            }
        };
        parts.push(name.to_string());
    }

    let key = accelerator_key(key)
        .ok_or_else(|| SessionError::hotkey(&combo, format!("unknown key '{}'", key)))?;
    parts.push(key);

    Ok(parts.join("+"))
}

/// Binds one combo at a time to the mute toggle
pub trait HotkeyRegistrar {
    /// Replace the current binding. On failure nothing remains registered.
    fn register(&mut self, combo: &str) -> Result<(), SessionError>;

    fn unregister(&mut self);
}

/// System-wide hotkey registration
///
/// Must be created on the thread running the GUI event loop.
pub struct GlobalHotkeys {
    manager: GlobalHotKeyManager,
    current: Option<HotKey>,
    active_id: Arc<AtomicU32>,
}

impl GlobalHotkeys {
    pub fn new() -> Result<Self, SessionError> {
        let manager = GlobalHotKeyManager::new()
            .map_err(|e| SessionError::hotkey("", format!("hotkey manager unavailable: {}", e)))?;
        Ok(Self {
            manager,
            current: None,
            active_id: Arc::new(AtomicU32::new(0)),
        })
    }

    /// Id of the registered hotkey, shared with the listener thread
    pub fn active_id(&self) -> Arc<AtomicU32> {
        self.active_id.clone()
    }
}

impl HotkeyRegistrar for GlobalHotkeys {
    fn register(&mut self, combo: &str) -> Result<(), SessionError> {
        self.unregister();

        let accelerator = to_accelerator(combo)?;
        let hotkey: HotKey = accelerator
            .parse()
            .map_err(|e| SessionError::hotkey(combo, format!("{}", e)))?;

        self.manager
            .register(hotkey)
            .map_err(|e| SessionError::hotkey(combo, e.to_string()))?;

        self.active_id.store(hotkey.id(), Ordering::SeqCst);
        self.current = Some(hotkey);
        info!("Hotkey registered: {} ({})", combo, accelerator);
        Ok(())
    }

    fn unregister(&mut self) {
        self.active_id.store(0, Ordering::SeqCst);
        if let Some(hotkey) = self.current.take() {
            if let Err(e) = self.manager.unregister(hotkey) {
                warn!("Failed to unregister hotkey: {}", e);
            }
        }
    }
}

impl Drop for GlobalHotkeys {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// Stand-in when no hotkey manager could be created; every register fails.
pub struct UnavailableHotkeys {
    reason: String,
}

impl UnavailableHotkeys {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl HotkeyRegistrar for UnavailableHotkeys {
    fn register(&mut self, combo: &str) -> Result<(), SessionError> {
        Err(SessionError::hotkey(combo, self.reason.clone()))
    }

    fn unregister(&mut self) {}
}

/// Forward presses of the registered hotkey to `toggle_mute`.
pub fn spawn_listener(session: Arc<AudioSession>, active_id: Arc<AtomicU32>) -> std::io::Result<()> {
    thread::Builder::new()
        .name("micpass-hotkey".to_string())
        .spawn(move || {
            let receiver = GlobalHotKeyEvent::receiver();
            while let Ok(event) = receiver.recv() {
                if event.state != HotKeyState::Pressed {
                    continue;
                }
                if event.id != active_id.load(Ordering::SeqCst) {
                    debug!("Ignoring stale hotkey event {}", event.id);
                    continue;
                }
                match session.toggle_mute() {
                    Ok(state) => info!("Hotkey pressed, now {:?}", state),
                    Err(e) => error!("Hotkey toggle failed: {}", e),
                }
            }
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mods(ctrl: bool, alt: bool, shift: bool, win: bool) -> KeyModifiers {
        KeyModifiers { ctrl, alt, shift, win }
    }

    #[test]
    fn test_capture_fixed_modifier_order() {
        assert_eq!(
            capture(mods(true, false, true, false), "f5"),
            CaptureOutcome::Captured("ctrl+shift+f5".to_string())
        );
        assert_eq!(
            capture(mods(true, true, true, true), "M"),
            CaptureOutcome::Captured("ctrl+alt+shift+win+m".to_string())
        );
    }

    #[test]
    fn test_capture_named_and_punctuation() {
        let none = KeyModifiers::default();
        assert_eq!(capture(none, "pageup"), CaptureOutcome::Captured("pageup".to_string()));
        assert_eq!(capture(none, "-"), CaptureOutcome::Captured("minus".to_string()));
        assert_eq!(capture(none, "."), CaptureOutcome::Captured("dot".to_string()));
        assert_eq!(capture(none, "`"), CaptureOutcome::Captured("grave".to_string()));
        assert_eq!(capture(none, "f35"), CaptureOutcome::Captured("f35".to_string()));
        assert_eq!(capture(none, "="), CaptureOutcome::Captured("=".to_string()));
    }

    #[test]
    fn test_capture_escape_cancels() {
        assert_eq!(
            capture(mods(true, false, false, false), "escape"),
            CaptureOutcome::Cancelled
        );
    }

    #[test]
    fn test_capture_bare_modifier_is_unrecognized() {
        assert_eq!(capture(mods(true, false, false, false), "control"), CaptureOutcome::Unrecognized);
        assert_eq!(capture(KeyModifiers::default(), "capslock"), CaptureOutcome::Unrecognized);
        assert_eq!(capture(KeyModifiers::default(), "f36"), CaptureOutcome::Unrecognized);
    }

    #[test]
    fn test_accelerator_translation() {
        assert_eq!(to_accelerator("ctrl+m").unwrap(), "control+KeyM");
        assert_eq!(to_accelerator("ctrl+shift+f5").unwrap(), "control+shift+F5");
        assert_eq!(to_accelerator("alt+win+5").unwrap(), "alt+super+Digit5");
        assert_eq!(to_accelerator("ctrl+plus").unwrap(), "control+Equal");
        assert_eq!(to_accelerator("ctrl++").unwrap(), "control+Equal");
        assert_eq!(to_accelerator("left").unwrap(), "ArrowLeft");
        assert_eq!(to_accelerator("shift+grave").unwrap(), "shift+Backquote");
    }

    #[test]
    fn test_accelerator_rejects_garbage() {
        assert!(matches!(
            to_accelerator(""),
            Err(SessionError::HotkeyRegistrationFailed { .. })
        ));
        assert!(to_accelerator("hyper+m").is_err());
        assert!(to_accelerator("ctrl+capslock").is_err());
    }

    #[test]
    fn test_unavailable_registrar_always_fails() {
        let mut registrar = UnavailableHotkeys::new("no display");
        let err = registrar.register("ctrl+m").unwrap_err();
        assert!(err.to_string().contains("no display"));
        registrar.unregister();
    }

    #[test]
    fn test_accelerators_parse() {
        for combo in ["ctrl+m", "ctrl+alt+shift+f12", "win+space", "ctrl+dot", "alt+pagedown"] {
            let accelerator = to_accelerator(combo).unwrap();
            assert!(accelerator.parse::<HotKey>().is_ok(), "{}", accelerator);
        }
    }
}
