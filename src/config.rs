//! Runtime settings for the joystick driver.
//!
//! Settings live in `<config dir>/analog-joystick/settings.toml`. A missing file is not an
//! error: every field has a default, and partially filled files are completed from those
//! defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "analog-joystick";
const SETTINGS_FILE: &str = "settings.toml";

/// First line identifying a calibration file.
pub const CALIBRATION_HEADER: &str = "# Calibration (will be automatically written)";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct JoystickSettings {
    /// Raw reads averaged per axis sample
    pub samples: usize,
    /// Deadzone around the measured center, in percent
    pub deadzone: f64,
    /// Delay between polls while waiting for input
    pub poll_interval_ms: u64,
    pub calibration: CalibrationSettings,
    pub hardware: HardwareSettings,
}

impl Default for JoystickSettings {
    fn default() -> Self {
        Self {
            samples: 3,
            deadzone: 3.0,
            poll_interval_ms: 10,
            calibration: CalibrationSettings::default(),
            hardware: HardwareSettings::default(),
        }
    }
}

/// Where and how the calibration file is searched for.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CalibrationSettings {
    pub search_root: PathBuf,
    pub extension: String,
    pub header: String,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            search_root: PathBuf::from("."),
            extension: ".cal".to_string(),
            header: CALIBRATION_HEADER.to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HardwareSettings {
    pub spi_bus: u8,
    pub slave_select: u8,
    pub clock_hz: u32,
}

impl Default for HardwareSettings {
    fn default() -> Self {
        Self {
            spi_bus: 0,
            slave_select: 0,
            clock_hz: 1_000_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("sample count must be at least 1")]
    ZeroSamples,

    #[error("deadzone must be within 0..100 percent, got {0}")]
    DeadzoneOutOfRange(f64),

    #[error("calibration file header must not be empty")]
    EmptyHeader,
}

impl JoystickSettings {
    /// Default location of the settings file, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(SETTINGS_FILE))
    }

    /// Loads settings from [`Self::default_path`], falling back to defaults.
    pub fn load() -> Result<Self, SettingsError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                warn!("No config directory on this platform, using default settings");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            info!(
                "Settings file {} does not exist, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;

        debug!("Loaded settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.samples == 0 {
            return Err(SettingsError::ZeroSamples);
        }
        if !(0.0..100.0).contains(&self.deadzone) {
            return Err(SettingsError::DeadzoneOutOfRange(self.deadzone));
        }
        if self.calibration.header.trim().is_empty() {
            return Err(SettingsError::EmptyHeader);
        }
        Ok(())
    }
}
