use std::path::{Path, PathBuf};

use anyhow::{Context, Ok};
use occtax_core::AppSettings;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROFILE: &str = "default";

/// Per-profile settings, stored as TOML under the config directory.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Profile {
    /// Directory holding the local records.
    pub inputs_dir: Option<String>,
    /// JSON file with the nomenclature values, used for labels and taxon defaults.
    pub nomenclatures: Option<String>,
    /// GeoNature server, required to synchronize.
    pub server: Option<AppSettings>,
}

impl Profile {
    pub fn from_path(profile: &Path) -> anyhow::Result<Option<Self>> {
        if !profile.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(profile).context("Failed to read profile file")?;

        let profile: Self = toml::from_str(&contents).context("Failed to deserialize profile")?;

        Ok(Some(profile))
    }

    pub fn save(&self, profile_path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string(self).context("Failed to serialize profile")?;

        if let Some(parent) = profile_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create profile directory")?;
        }

        std::fs::write(profile_path, content).context("Failed to write profile")?;

        Ok(())
    }
}

/// Get the XDG config directory, respecting XDG_CONFIG_HOME
fn get_config_dir() -> PathBuf {
    if let std::result::Result::Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("occtax")
    } else {
        directories::ProjectDirs::from("fr", "geonature", "occtax")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Get the XDG data directory, respecting XDG_DATA_HOME
fn get_data_dir() -> PathBuf {
    if let std::result::Result::Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join("occtax")
    } else {
        directories::ProjectDirs::from("fr", "geonature", "occtax")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Get path to a profile's config file
pub fn get_profile_config_path(profile_name: &str) -> PathBuf {
    get_config_dir()
        .join("profiles")
        .join(format!("{}.toml", profile_name))
}

/// Get the default directory of a profile's records
pub fn get_profile_inputs_dir(profile_name: &str) -> PathBuf {
    get_data_dir()
        .join("profiles")
        .join(profile_name)
        .join("inputs")
}

pub fn get_profile_name(arg_profile: &Option<String>) -> String {
    arg_profile
        .clone()
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
}
