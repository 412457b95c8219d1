use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::types::Config;

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        debug!(path = %path.display(), "loading configuration");

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(yaml).context("failed to parse YAML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;

        let mut user_names = HashSet::new();
        for account in &self.accounts {
            if account.user_name.is_empty() {
                anyhow::bail!("account with empty user_name");
            }
            if !user_names.insert(&account.user_name) {
                anyhow::bail!("duplicate account: {}", account.user_name);
            }
        }

        info!(accounts = self.accounts.len(), "configuration validated successfully");
        Ok(())
    }
}
