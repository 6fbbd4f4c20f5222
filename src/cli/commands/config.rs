//! `mimic config`: inspect the effective configuration.

use anyhow::Result;
use serde::Serialize;

use crate::cli::display::{output, CommandOutput};
use crate::cli::types::ConfigCommands;
use crate::domain::models::Config;

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfigOutput {
    pub config: Config,
}

impl ConfigOutput {
    /// Copy of `config` with the API key masked.
    pub fn redacted(mut config: Config) -> Self {
        if config.oracle.api_key.is_some() {
            config.oracle.api_key = Some("********".to_string());
        }
        Self { config }
    }
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config).unwrap_or_default()
    }
}

pub fn execute(command: &ConfigCommands, config: Config, json_mode: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => output(&ConfigOutput::redacted(config), json_mode),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_is_masked() {
        let mut config = Config::default();
        config.oracle.api_key = Some("sk-secret".to_string());
        let shown = ConfigOutput::redacted(config);
        let yaml = shown.to_human();
        assert!(!yaml.contains("sk-secret"));
        assert!(yaml.contains("max_steps: 8"));
    }
}
