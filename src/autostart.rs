//! Start on login
//!
//! On Linux this is an XDG autostart entry at
//! ~/.config/autostart/micpass.desktop pointing at the running executable.

use crate::error::SessionError;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

pub trait Autostart {
    /// Launch `executable` on login. Idempotent.
    fn enable(&self, executable: &Path) -> Result<(), SessionError>;

    /// Stop launching on login. Idempotent.
    fn disable(&self) -> Result<(), SessionError>;
}

/// XDG autostart desktop entry
pub struct XdgAutostart {
    path: PathBuf,
}

impl XdgAutostart {
    pub fn new() -> Self {
        Self {
            path: Self::default_path(),
        }
    }

    /// Use a custom entry path
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("autostart")
            .join("micpass.desktop")
    }

    fn entry(executable: &Path) -> String {
        format!(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name=Live Mic to Speaker\n\
             Comment=Route a microphone to a speaker\n\
             Exec={}\n\
             Icon=audio-input-microphone\n\
             Terminal=false\n\
             X-GNOME-Autostart-enabled=true\n",
            exec_argument(executable)
        )
    }
}

/// Quote a path as a single `Exec` argument. The quoting escapes are
/// applied first and the desktop-entry string escapes on top, so a literal
/// backslash in the path is written as four.
fn exec_argument(executable: &Path) -> String {
    let raw = executable.to_string_lossy();
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('"');
    for c in raw.chars() {
        match c {
            '"' | '`' | '$' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            // Field codes
            '%' => quoted.push_str("%%"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted.replace('\\', "\\\\").replace('\n', "\\n")
}

impl Default for XdgAutostart {
    fn default() -> Self {
        Self::new()
    }
}

impl Autostart for XdgAutostart {
    fn enable(&self, executable: &Path) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SessionError::AutostartToggleFailed(format!(
                    "Failed to create autostart directory: {}",
                    e
                ))
            })?;
        }

        fs::write(&self.path, Self::entry(executable)).map_err(|e| {
            SessionError::AutostartToggleFailed(format!("Failed to write autostart entry: {}", e))
        })?;

        info!("Autostart enabled: {}", self.path.display());
        Ok(())
    }

    fn disable(&self) -> Result<(), SessionError> {
        if !self.path.exists() {
            return Ok(());
        }

        fs::remove_file(&self.path).map_err(|e| {
            SessionError::AutostartToggleFailed(format!("Failed to remove autostart entry: {}", e))
        })?;

        info!("Autostart disabled");
        Ok(())
    }
}

/// Enable or disable autostart for the current executable
pub fn apply(autostart: &dyn Autostart, enabled: bool) -> Result<(), SessionError> {
    if enabled {
        let exe = std::env::current_exe().map_err(|e| {
            SessionError::AutostartToggleFailed(format!("Cannot locate executable: {}", e))
        })?;
        autostart.enable(&exe)
    } else {
        autostart.disable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_writes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autostart").join("micpass.desktop");
        let autostart = XdgAutostart::with_path(&path);

        autostart.enable(Path::new("/opt/micpass/bin/micpass")).unwrap();
        autostart.enable(Path::new("/opt/micpass/bin/micpass")).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("[Desktop Entry]"));
        assert!(contents.contains("Exec=\"/opt/micpass/bin/micpass\""));
    }

    #[test]
    fn test_exec_path_is_escaped() {
        assert_eq!(
            exec_argument(Path::new("/home/sam/My Apps/micpass")),
            r#""/home/sam/My Apps/micpass""#
        );
        assert_eq!(
            exec_argument(Path::new("/opt/$HOME/mic\"pass`x`")),
            r#""/opt/\\$HOME/mic\\"pass\\`x\\`""#
        );
        assert_eq!(
            exec_argument(Path::new("/opt/back\\slash/100%")),
            r#""/opt/back\\\\slash/100%%""#
        );
    }

    #[test]
    fn test_disable_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("micpass.desktop");
        let autostart = XdgAutostart::with_path(&path);

        autostart.disable().unwrap();
        autostart.enable(Path::new("/usr/bin/micpass")).unwrap();
        autostart.disable().unwrap();
        autostart.disable().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_apply_uses_current_exe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("micpass.desktop");
        let autostart = XdgAutostart::with_path(&path);

        apply(&autostart, true).unwrap();
        let exe = std::env::current_exe().unwrap();
        assert!(fs::read_to_string(&path)
            .unwrap()
            .contains(&exe.display().to_string()));

        apply(&autostart, false).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_enable_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the directory should be
        let blocker = dir.path().join("autostart");
        fs::write(&blocker, "").unwrap();
        let autostart = XdgAutostart::with_path(blocker.join("micpass.desktop"));

        let result = autostart.enable(Path::new("/usr/bin/micpass"));
        assert!(matches!(result, Err(SessionError::AutostartToggleFailed(_))));
    }
}
