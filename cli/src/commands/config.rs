use anyhow::Context;

use crate::app_config::AppConfig;

const MASKED: &str = "********";

pub fn config_cmd(config: &AppConfig) -> anyhow::Result<()> {
    let mut value = serde_json::to_value(config).context("Failed to serialize configuration")?;

    if let Some(token) = value.pointer_mut("/server/token") {
        *token = MASKED.into();
    }

    println!("{}", serde_json::to_string_pretty(&value)?);

    Ok(())
}
