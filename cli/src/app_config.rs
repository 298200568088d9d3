use std::path::{Path, PathBuf};

use anyhow::Context;
use occtax_core::{AppSettings, InMemoryNomenclatures, LocalStore};
use serde::Serialize;

use crate::profile::{get_profile_inputs_dir, Profile};

/// Configuration resolved from the profile name, the profile file and the
/// default directories.
#[derive(Debug, Serialize)]
pub struct AppConfig {
    pub profile_name: String,
    pub profile_path: String,
    pub profile_exists: bool,
    pub inputs_dir: String,
    pub nomenclatures: Option<String>,
    pub server: Option<AppSettings>,
}

impl AppConfig {
    pub fn from_profile(profile_name: &str, profile_path: &Path, profile: Option<Profile>) -> Self {
        let profile_exists = profile.is_some();
        let profile = profile.unwrap_or_default();

        let inputs_dir = profile.inputs_dir.unwrap_or_else(|| {
            get_profile_inputs_dir(profile_name)
                .to_string_lossy()
                .into_owned()
        });

        AppConfig {
            profile_name: profile_name.to_string(),
            profile_path: profile_path.to_string_lossy().into_owned(),
            profile_exists,
            inputs_dir,
            nomenclatures: profile.nomenclatures,
            server: profile.server,
        }
    }

    pub fn store(&self) -> LocalStore {
        LocalStore::new(PathBuf::from(&self.inputs_dir))
    }

    pub fn server(&self) -> anyhow::Result<&AppSettings> {
        self.server.as_ref().with_context(|| {
            format!(
                "No server configured, add a [server] table to {}",
                self.profile_path
            )
        })
    }

    pub async fn nomenclatures(&self) -> anyhow::Result<Option<InMemoryNomenclatures>> {
        let Some(path) = &self.nomenclatures else {
            return Ok(None);
        };

        let nomenclatures = InMemoryNomenclatures::load(Path::new(path))
            .await
            .with_context(|| format!("Failed to load nomenclatures from {path}"))?;

        Ok(Some(nomenclatures))
    }
}
