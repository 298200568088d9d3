//! Application settings consumed by the core: server location, date format
//! policy and synchronization tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::remote::RetryConfig;

pub const DEFAULT_MODULE: &str = "occtax";

/// Granularity of one end of the observation period on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateSetting {
    #[default]
    Date,
    DateTime,
}

/// How `date_min`/`date_max` are written when producing a real export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateSettings {
    #[serde(default)]
    pub start: DateSetting,
    #[serde(default)]
    pub end: DateSetting,
}

impl DateSettings {
    pub fn new(start: DateSetting, end: DateSetting) -> Self {
        DateSettings { start, end }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Pause between two records of a synchronization batch.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl SyncSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            delay_ms: default_delay_ms(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_delay_ms() -> u64 {
    500
}

fn default_module() -> String {
    DEFAULT_MODULE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Base URL of the GeoNature instance, e.g. `https://demo.geonature.fr/geonature/api`.
    pub server_url: String,
    #[serde(default = "default_module")]
    pub module: String,
    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default)]
    pub date: DateSettings,
    #[serde(default)]
    pub sync: SyncSettings,
}

impl AppSettings {
    pub fn new(server_url: impl Into<String>) -> Self {
        AppSettings {
            server_url: server_url.into(),
            module: default_module(),
            token: None,
            date: DateSettings::default(),
            sync: SyncSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let settings: AppSettings =
            serde_json::from_str(r#"{ "server_url": "https://demo.geonature.fr/api" }"#).unwrap();

        assert_eq!(settings.module, "occtax");
        assert_eq!(settings.date, DateSettings::default());
        assert_eq!(settings.sync.delay(), Duration::from_millis(500));
        assert!(settings.token.is_none());
    }

    #[test]
    fn test_date_settings_names() {
        let settings: DateSettings =
            serde_json::from_str(r#"{ "start": "datetime", "end": "date" }"#).unwrap();

        assert_eq!(
            settings,
            DateSettings::new(DateSetting::DateTime, DateSetting::Date)
        );
    }
}
