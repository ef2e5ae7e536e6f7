//! Embedded icons for the window
//!
//! SVGs under assets/icons are compiled into the binary with rust_embed.

use gpui::AssetSource;
use rust_embed::RustEmbed;
use std::borrow::Cow;

#[derive(RustEmbed)]
#[folder = "assets"]
#[include = "icons/*.svg"]
pub struct Assets;

impl AssetSource for Assets {
    fn load(&self, path: &str) -> anyhow::Result<Option<Cow<'static, [u8]>>> {
        if path.is_empty() {
            return Ok(None);
        }
        Ok(Self::get(path).map(|f| f.data))
    }

    fn list(&self, path: &str) -> anyhow::Result<Vec<gpui::SharedString>> {
        Ok(Self::iter()
            .filter(|p| p.starts_with(path))
            .map(|p| p.into())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icons_are_embedded() {
        for icon in ["icons/mic.svg", "icons/mic-off.svg", "icons/settings.svg"] {
            assert!(Assets.load(icon).unwrap().is_some(), "{}", icon);
        }
        assert!(Assets.load("").unwrap().is_none());
        assert_eq!(Assets.list("icons/").unwrap().len(), 3);
    }
}
