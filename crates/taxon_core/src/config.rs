//! Engine configuration.
//!
//! Reads from env vars (all optional):
//!   TAXON_CATEGORY_URL_PREFIX       — default `/category/`
//!   TAXON_TAG_URL_PREFIX            — default `/tag/`
//!   TAXON_LINK_CATEGORY_URL_PREFIX  — default `/links/`
//!   TAXON_ADMIN_STATUSES            — default `published,private`
//!   TAXON_PUBLIC_STATUSES           — default `published`
//!
//! or from a YAML document with the same fields in snake_case.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TaxonomyError};
use crate::status_filter::{Audience, StatusFilter};
use crate::types::TaxonomyKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    pub category_url_prefix: String,
    pub tag_url_prefix: String,
    pub link_category_url_prefix: String,
    pub admin_statuses: StatusFilter,
    pub public_statuses: StatusFilter,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            category_url_prefix: "/category/".into(),
            tag_url_prefix: "/tag/".into(),
            link_category_url_prefix: "/links/".into(),
            admin_statuses: StatusFilter::visible(),
            public_statuses: StatusFilter::published_only(),
        }
    }
}

impl TaxonomyConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Environment-style lookup, split out so tests don't touch process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Self::default().with_lookup(lookup)
    }

    /// Overlay environment-style values on `self`; unset keys keep their value.
    pub fn with_lookup(self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = self;
        if let Some(v) = lookup("TAXON_CATEGORY_URL_PREFIX") {
            config.category_url_prefix = v;
        }
        if let Some(v) = lookup("TAXON_TAG_URL_PREFIX") {
            config.tag_url_prefix = v;
        }
        if let Some(v) = lookup("TAXON_LINK_CATEGORY_URL_PREFIX") {
            config.link_category_url_prefix = v;
        }
        if let Some(v) = lookup("TAXON_ADMIN_STATUSES") {
            config.admin_statuses = StatusFilter::parse_list(&v)?;
        }
        if let Some(v) = lookup("TAXON_PUBLIC_STATUSES") {
            config.public_statuses = StatusFilter::parse_list(&v)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw).context("parsing taxonomy config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.admin_statuses.is_empty() || self.public_statuses.is_empty() {
            return Err(TaxonomyError::InvalidInput(
                "status filters in config must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn url_prefix(&self, kind: TaxonomyKind) -> &str {
        match kind {
            TaxonomyKind::Category => &self.category_url_prefix,
            TaxonomyKind::Tag => &self.tag_url_prefix,
            TaxonomyKind::LinkCategory => &self.link_category_url_prefix,
        }
    }

    pub fn url_for(&self, kind: TaxonomyKind, slug: &str) -> String {
        format!("{}{}", self.url_prefix(kind), slug)
    }

    pub fn filter_for(&self, audience: Audience) -> StatusFilter {
        match audience {
            Audience::Anonymous => self.public_statuses.clone(),
            Audience::Admin => self.admin_statuses.clone(),
        }
    }
}
