//! Error types for the passthrough session and its collaborators.

/// Errors surfaced by session operations and the settings flow.
///
/// Only `StreamOpenFailed`, `ConfigurationIncomplete` and the two
/// collaborator errors ever reach the user. `StreamCloseFailed` is logged by
/// the session and never escalates.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No input or output device has been chosen yet.
    #[error("no input/output device configured")]
    ConfigurationIncomplete,

    /// The backend rejected the stream parameters or a device is unavailable.
    #[error("failed to open audio stream: {0}")]
    StreamOpenFailed(String),

    /// Tearing the stream down reported an error.
    #[error("failed to close audio stream: {0}")]
    StreamCloseFailed(String),

    /// The global hotkey could not be bound.
    #[error("could not register hotkey '{combo}': {reason}")]
    HotkeyRegistrationFailed {
        /// Canonical combination that was requested.
        combo: String,
        /// What the registrar reported.
        reason: String,
    },

    /// Enabling or disabling start-on-login failed.
    #[error("failed to update autostart: {0}")]
    AutostartToggleFailed(String),
}

impl SessionError {
    pub fn hotkey(combo: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::HotkeyRegistrationFailed {
            combo: combo.into(),
            reason: reason.into(),
        }
    }

    /// Text shown in the window status line.
    pub fn user_message(&self) -> String {
        match self {
            Self::ConfigurationIncomplete => {
                "Choose a mic input and a speaker output first.".to_string()
            }
            Self::HotkeyRegistrationFailed { .. } => {
                "Could not register hotkey. Try running with elevated privileges or choose a different combo."
                    .to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_open_display() {
        let err = SessionError::StreamOpenFailed("device busy".to_string());
        assert_eq!(err.to_string(), "failed to open audio stream: device busy");
    }

    #[test]
    fn test_hotkey_user_message_gives_guidance() {
        let err = SessionError::hotkey("ctrl+alt+delete", "already grabbed");
        assert!(err.to_string().contains("ctrl+alt+delete"));
        assert!(err.user_message().contains("elevated privileges"));
    }
}
