//! Load/store of the persisted configuration: the three-octet subnet AOG
//! announced last, kept under the user's config directory.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::{env, fs};

pub const DEFAULT_SUBNET: [u8; 3] = [192, 168, 1];

const PRODUCT_NAME: &str = "AOG-TaskController";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub subnet: [u8; 3],
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            subnet: DEFAULT_SUBNET,
        }
    }
}

impl Settings {
    /// The settings file location: `$XDG_CONFIG_HOME` (or `~/.config`)
    /// under the product directory.
    pub fn default_path() -> Option<PathBuf> {
        let base = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join(PRODUCT_NAME).join(SETTINGS_FILE))
    }

    /// Loads the settings, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                warn!("No config directory available, using default settings");
                Settings::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No settings file at {}, using defaults", path.display());
                return Settings::default();
            }
            Err(e) => {
                warn!("Could not read {}: {}, using defaults", path.display(), e);
                return Settings::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Could not parse {}: {}, using defaults", path.display(), e);
                Settings::default()
            }
        }
    }

    pub fn save(&self) -> io::Result<()> {
        let path = Self::default_path().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no config directory available")
        })?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)
    }

    pub fn subnet_string(&self) -> String {
        format!("{}.{}.{}.0", self.subnet[0], self.subnet[1], self.subnet[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PRODUCT_NAME).join(SETTINGS_FILE);
        let settings = Settings { subnet: [16, 32, 48] };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["subnet"], serde_json::json!([16, 32, 48]));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("nope.json"));
        assert_eq!(settings.subnet, DEFAULT_SUBNET);
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{ \"subnet\": \"oops\" }").unwrap();
        assert_eq!(Settings::load_from(&path).subnet, DEFAULT_SUBNET);
    }

    #[test]
    fn subnet_string_formats_prefix() {
        let settings = Settings { subnet: [10, 0, 7] };
        assert_eq!(settings.subnet_string(), "10.0.7.0");
    }
}
