//! # Configuration
//!
//! A small, hand-editable `key = value` file next to the save file
//! (`Mod_IndependentStash/IndependentStash.cfg`). `key: value` lines are
//! read as well.
//!
//! - Blank lines and lines starting with `#` or `//` are ignored.
//! - Keys are matched case-insensitively; unknown keys are ignored.
//! - A missing file is replaced by a commented default.
//! - Any problem falls back to defaults with a log line; loading never fails.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `OpenStashKey` | `BackQuote` | Key that toggles the stash view |

use crate::error::{Result, StashError};
use log::{error, info, warn};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

macro_rules! key_codes {
    ($($name:ident),* $(,)?) => {
        /// Keyboard keys, named as the host's input system names them.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum KeyCode {
            $($name),*
        }

        impl KeyCode {
            pub const ALL: &'static [KeyCode] = &[$(KeyCode::$name),*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(KeyCode::$name => stringify!($name)),*
                }
            }
        }
    };
}

key_codes!(
    BackQuote, Tab, CapsLock, Space, Return, Escape, Backspace, Insert, Delete, Home, End,
    PageUp, PageDown, Minus, Equals, LeftBracket, RightBracket, Backslash, Semicolon, Quote,
    Comma, Period, Slash, Alpha0, Alpha1, Alpha2, Alpha3, Alpha4, Alpha5, Alpha6, Alpha7,
    Alpha8, Alpha9, A, B, C, D, E, F, G, H, I, J, K, L, M, N, O, P, Q, R, S, T, U, V, W, X, Y,
    Z, F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12, Keypad0, Keypad1, Keypad2, Keypad3,
    Keypad4, Keypad5, Keypad6, Keypad7, Keypad8, Keypad9,
);

impl FromStr for KeyCode {
    type Err = StashError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        KeyCode::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| StashError::Config(format!("unknown key '{}'", s)))
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const OPEN_STASH_KEY: &str = "OpenStashKey";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModConfig {
    pub open_stash_key: KeyCode,
}

impl Default for ModConfig {
    fn default() -> Self {
        Self {
            open_stash_key: KeyCode::BackQuote,
        }
    }
}

impl ModConfig {
    /// Load from `path`, writing a commented default file if it is missing.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            let config = Self::default();
            match config.write_default(path) {
                Ok(()) => info!("Created default config at {}", path.display()),
                Err(e) => error!("Failed to create default config: {}", e),
            }
            return config;
        }

        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) => {
                error!("Failed to load config: {}", e);
                Self::default()
            }
        }
    }

    /// Parse config text; bad lines are skipped, bad values keep the default.
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            let Some((key, value)) = line.split_once('=').or_else(|| line.split_once(':')) else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            if key.eq_ignore_ascii_case(OPEN_STASH_KEY) {
                match value.parse::<KeyCode>() {
                    Ok(parsed) => {
                        config.open_stash_key = parsed;
                        info!("Config loaded: OpenStashKey = {}", parsed);
                    }
                    Err(_) => warn!(
                        "Invalid key in config: {}. Using default {}",
                        value, config.open_stash_key
                    ),
                }
            }
        }
        config
    }

    pub fn render_default(&self) -> String {
        format!(
            "# Independent Stash configuration\n\
             \n\
             # Key that opens and closes the stash.\n\
             # Common keys: BackQuote (`), Tab, I, O, P, F1, F2...\n\
             {} = {}\n",
            OPEN_STASH_KEY, self.open_stash_key
        )
    }

    pub fn write_default(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| StashError::Config(e.to_string()))?;
        }
        fs::write(path, self.render_default()).map_err(|e| StashError::Config(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert_eq!(ModConfig::default().open_stash_key, KeyCode::BackQuote);
    }

    #[test]
    fn test_parse_ignores_comments_and_unknown_keys() {
        let text = "# comment\n// another = thing\n\nColor = red\nopenstashkey = f5\n";
        assert_eq!(ModConfig::parse(text).open_stash_key, KeyCode::F5);
    }

    #[test]
    fn test_invalid_value_keeps_default() {
        let config = ModConfig::parse("OpenStashKey = NotAKey");
        assert_eq!(config.open_stash_key, KeyCode::BackQuote);
    }

    #[test]
    fn test_lines_without_equals_are_skipped() {
        let config = ModConfig::parse("OpenStashKey Tab\nOpenStashKey=Tab");
        assert_eq!(config.open_stash_key, KeyCode::Tab);
    }

    #[test]
    fn test_colon_separator_is_accepted() {
        let config = ModConfig::parse("OpenStashKey: F2");
        assert_eq!(config.open_stash_key, KeyCode::F2);
    }

    #[test]
    fn test_key_code_round_trips_through_text() {
        for key in KeyCode::ALL {
            assert_eq!(key.as_str().parse::<KeyCode>().unwrap(), *key);
        }
    }

    #[test]
    fn test_rendered_default_parses_back() {
        let config = ModConfig {
            open_stash_key: KeyCode::I,
        };
        assert_eq!(ModConfig::parse(&config.render_default()), config);
    }

    #[test]
    fn test_load_missing_config_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("IndependentStash.cfg");

        let config = ModConfig::load(&path);
        assert_eq!(config, ModConfig::default());
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("OpenStashKey = BackQuote"));
    }

    #[test]
    fn test_load_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IndependentStash.cfg");
        fs::write(&path, "OpenStashKey = Tab\n").unwrap();
        assert_eq!(ModConfig::load(&path).open_stash_key, KeyCode::Tab);
    }
}
