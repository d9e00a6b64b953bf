use std::{env, fs, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Saved CLI settings, stored as TOML in `<config dir>/roomdrop/config.toml`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub default_out_dir: Option<PathBuf>,
}

impl AppConfig {
    fn config_dir() -> Result<PathBuf> {
        config_dir_from(|key| env::var(key).ok())
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Loads the configuration, or the default one when no file exists yet.
    pub fn load() -> Result<Self> {
        let config_file = Self::config_file()?;
        if !config_file.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_file).with_context(|| {
            format!("Failed to read config file: {}", config_file.display())
        })?;
        toml::from_str(&content).with_context(|| {
            format!("Failed to parse config file: {}", config_file.display())
        })
    }

    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir()?;
        fs::create_dir_all(&config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        let config_file = Self::config_file()?;
        fs::write(&config_file, content).with_context(|| {
            format!("Failed to write config file: {}", config_file.display())
        })
    }

    pub fn set_default_out_dir(&mut self, dir: PathBuf) -> Result<()> {
        self.default_out_dir = Some(dir);
        self.save()
    }

    pub fn clear_default_out_dir(&mut self) -> Result<()> {
        self.default_out_dir = None;
        self.save()
    }

    /// Output directory for a transfer: the explicit one, then the saved
    /// default, then [`fallback_out_dir`].
    pub fn resolve_out_dir(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| self.default_out_dir.clone())
            .unwrap_or_else(fallback_out_dir)
    }
}

/// `%APPDATA%` on Windows, `~/Library/Application Support` on macOS,
/// `$XDG_CONFIG_HOME` or `~/.config` elsewhere.
fn config_dir_from(lookup: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    let base = if cfg!(target_os = "windows") {
        lookup("APPDATA").map(PathBuf::from)
    } else if cfg!(target_os = "macos") {
        lookup("HOME").map(|home| {
            PathBuf::from(home).join("Library").join("Application Support")
        })
    } else {
        lookup("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| lookup("HOME").map(|h| PathBuf::from(h).join(".config")))
    };
    base.map(|dir| dir.join("roomdrop"))
        .ok_or_else(|| anyhow!("Unable to determine config directory"))
}

/// `~/Downloads/Roomdrop`, or the current directory when no home is known.
pub fn fallback_out_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    let home = env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = env::var("HOME");

    match home {
        Ok(home) => PathBuf::from(home).join("Downloads").join("Roomdrop"),
        Err(_) => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
