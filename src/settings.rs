//! Settings for the admin tool: connection parameters plus the engine config.
//!
//! Sources, lowest precedence first: defaults, an optional YAML file,
//! `TAXON_*` environment variables. Command-line flags override all of them.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use taxon_core::config::TaxonomyConfig;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub taxonomy: TaxonomyConfig,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            taxonomy: TaxonomyConfig::default(),
        }
    }
}

impl AdminSettings {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(raw).context("parsing admin settings YAML")?;
        settings.taxonomy.validate()?;
        Ok(settings)
    }

    /// Layer environment-style values over `self`.
    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup("TAXON_DATABASE_URL").or_else(|| lookup("DATABASE_URL")) {
            self.database_url = Some(url);
        }
        if let Some(raw) = lookup("TAXON_MAX_CONNECTIONS") {
            self.max_connections = raw
                .trim()
                .parse()
                .with_context(|| format!("TAXON_MAX_CONNECTIONS={raw:?} is not a number"))?;
        }
        if self.max_connections == 0 {
            bail!("max_connections must be at least 1");
        }
        self.taxonomy = self.taxonomy.with_lookup(&lookup)?;
        Ok(self)
    }

    pub fn from_env() -> Result<Self> {
        Self::default().with_lookup(|key| std::env::var(key).ok())
    }

    pub fn require_database_url(&self) -> Result<&str> {
        match self.database_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => bail!("no database URL: set TAXON_DATABASE_URL or pass --database-url"),
        }
    }
}
