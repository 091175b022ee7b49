//! Code for loading program settings.
use crate::engine::DEFAULT_MAX_ATTEMPTS;
use crate::evaluate::Weights;
use crate::get_capmatch_config_dir;
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Default log level for program
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Default bound on the number of models examined per search run
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    let mut path = get_capmatch_config_dir();
    path.push(SETTINGS_FILE_NAME);

    path
}

/// Program settings from config file
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Bound on the number of models examined per search run
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Default weights for the weighted evaluator
    #[serde(default)]
    pub weights: Weights,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            max_attempts: default_max_attempts(),
            weights: Weights::default(),
        }
    }
}

impl Settings {
    /// Read the settings file from the program config directory.
    ///
    /// If the file is not present, default values for settings will be used
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    /// Read the settings file from the specified path
    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        read_toml(file_path)
    }
}
