//! Status filters applied when a taxonomy snapshot is fetched.
//!
//! Callers historically passed a bare status code, a list of codes, or
//! nothing at all. `StatusFilter::from_loose` is the single adapter that turns
//! those shapes into a typed set; everything past the boundary takes a
//! `StatusFilter`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TaxonomyError};
use crate::types::TaxonomyStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusFilter(BTreeSet<TaxonomyStatus>);

impl StatusFilter {
    pub fn new(statuses: impl IntoIterator<Item = TaxonomyStatus>) -> Self {
        Self(statuses.into_iter().collect())
    }

    /// What anonymous visitors see.
    pub fn published_only() -> Self {
        Self::new([TaxonomyStatus::Published])
    }

    /// What administrators see in listings.
    pub fn visible() -> Self {
        Self::new([TaxonomyStatus::Published, TaxonomyStatus::Private])
    }

    pub fn all() -> Self {
        Self::new(TaxonomyStatus::ALL)
    }

    pub fn allows(&self, status: TaxonomyStatus) -> bool {
        self.0.contains(&status)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn statuses(&self) -> impl Iterator<Item = TaxonomyStatus> + '_ {
        self.0.iter().copied()
    }

    pub fn codes(&self) -> Vec<i16> {
        self.0.iter().map(TaxonomyStatus::code).collect()
    }

    /// Normalize a loosely-typed filter. `null` maps to `default`; otherwise
    /// accepts an integer code, a status name, a comma-separated list of names,
    /// or an array of any of those.
    pub fn from_loose(value: &Value, default: StatusFilter) -> Result<Self> {
        match value {
            Value::Null => Ok(default),
            Value::Array(items) => {
                let mut set = BTreeSet::new();
                for item in items {
                    set.extend(Self::from_loose(item, StatusFilter::new([]))?.0);
                }
                if set.is_empty() {
                    return Ok(default);
                }
                Ok(Self(set))
            }
            Value::Number(n) => {
                let status = n
                    .as_i64()
                    .and_then(TaxonomyStatus::from_code)
                    .ok_or_else(|| TaxonomyError::InvalidInput(format!("unknown status code {}", n)))?;
                Ok(Self::new([status]))
            }
            Value::String(s) => Self::parse_list(s).map(|f| if f.is_empty() { default } else { f }),
            other => Err(TaxonomyError::InvalidInput(format!(
                "unsupported status filter {}",
                other
            ))),
        }
    }

    /// Parse `"published,private"` or `"1,2"`.
    pub fn parse_list(raw: &str) -> Result<Self> {
        let mut set = BTreeSet::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let status = match part.parse::<i64>() {
                Ok(code) => TaxonomyStatus::from_code(code),
                Err(_) => TaxonomyStatus::from_str(&part.to_ascii_lowercase()),
            }
            .ok_or_else(|| TaxonomyError::InvalidInput(format!("unknown status {:?}", part)))?;
            set.insert(status);
        }
        Ok(Self(set))
    }
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self::published_only()
    }
}

/// Who is looking at the tree. Decides the default status filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Anonymous,
    Admin,
}

impl Audience {
    pub fn default_filter(&self) -> StatusFilter {
        match self {
            Self::Anonymous => StatusFilter::published_only(),
            Self::Admin => StatusFilter::visible(),
        }
    }
}
