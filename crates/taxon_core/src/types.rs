//! Core domain types for the taxonomy engine.
//! Pure value types. No sqlx, no DB dependencies.

// Enums use `from_str() -> Option<Self>` rather than `FromStr` because unknown
// values map to None and the caller picks the error.
#![allow(clippy::should_implement_trait)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaxonomyError};

const TAXONOMY_ID_LEN: usize = 16;

// ── Identifiers ───────────────────────────────────────────────

/// Opaque 16-hex-digit taxonomy identifier. Stable, never reused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaxonomyId(String);

impl TaxonomyId {
    pub fn generate() -> Self {
        Self(format!("{:016x}", rand::random::<u64>()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.len() != TAXONOMY_ID_LEN || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TaxonomyError::InvalidInput(format!(
                "taxonomy id must be {} hex digits, got {:?}",
                TAXONOMY_ID_LEN, raw
            )));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaxonomyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TaxonomyId {
    type Error = TaxonomyError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TaxonomyId> for String {
    fn from(value: TaxonomyId) -> Self {
        value.0
    }
}

/// Identifier of a content object (post or link). Owned by the content module,
/// so no format is imposed beyond being non-empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(TaxonomyError::InvalidInput("object id is empty".into()));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Enums ─────────────────────────────────────────────────────

/// Namespace of a taxonomy node. Slugs are unique per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaxonomyKind {
    Category,
    Tag,
    LinkCategory,
}

impl TaxonomyKind {
    pub const ALL: [TaxonomyKind; 3] = [Self::Category, Self::Tag, Self::LinkCategory];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Tag => "tag",
            Self::LinkCategory => "link-category",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "category" => Some(Self::Category),
            "tag" => Some(Self::Tag),
            "link-category" | "link_category" => Some(Self::LinkCategory),
            _ => None,
        }
    }

    /// Status changes propagate through parent/child links only for categories.
    pub fn cascades(&self) -> bool {
        matches!(self, Self::Category)
    }

    pub fn allows_parent(&self) -> bool {
        !matches!(self, Self::Tag)
    }
}

impl fmt::Display for TaxonomyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility status of a taxonomy node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyStatus {
    Published,
    Private,
    Trashed,
}

impl TaxonomyStatus {
    pub const ALL: [TaxonomyStatus; 3] = [Self::Published, Self::Private, Self::Trashed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Private => "private",
            Self::Trashed => "trashed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "published" => Some(Self::Published),
            "private" => Some(Self::Private),
            "trashed" => Some(Self::Trashed),
            _ => None,
        }
    }

    /// Persisted integer code.
    pub fn code(&self) -> i16 {
        match self {
            Self::Published => 1,
            Self::Private => 2,
            Self::Trashed => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Published),
            2 => Some(Self::Private),
            3 => Some(Self::Trashed),
            _ => None,
        }
    }
}

impl fmt::Display for TaxonomyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of content object that can be attached to taxonomy nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Post,
    Link,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Link => "link",
        }
    }

    pub fn accepts(&self, kind: TaxonomyKind) -> bool {
        match self {
            Self::Post => matches!(kind, TaxonomyKind::Category | TaxonomyKind::Tag),
            Self::Link => matches!(kind, TaxonomyKind::LinkCategory),
        }
    }
}

// ── Rows ──────────────────────────────────────────────────────

/// One row of the `taxonomy` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyNode {
    pub id: TaxonomyId,
    pub kind: TaxonomyKind,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<TaxonomyId>,
    #[serde(default)]
    pub order: i32,
    pub status: TaxonomyStatus,
    /// Denormalized count of ledger rows. Never trusted for correctness decisions.
    #[serde(default)]
    pub content_count: i64,
}

impl TaxonomyNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// One row of the `taxonomy_relationship` ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub object_id: ObjectId,
    pub taxonomy_id: TaxonomyId,
    #[serde(default)]
    pub order: i32,
}

/// Input to `save_taxonomy`. `id = None` creates a new node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyDraft {
    #[serde(default)]
    pub id: Option<TaxonomyId>,
    pub kind: TaxonomyKind,
    pub name: String,
    /// Empty means derive from `name`.
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<TaxonomyId>,
    #[serde(default)]
    pub order: i32,
    pub status: TaxonomyStatus,
}

impl TaxonomyDraft {
    pub fn new(kind: TaxonomyKind, name: impl Into<String>, status: TaxonomyStatus) -> Self {
        Self {
            id: None,
            kind,
            name: name.into(),
            slug: String::new(),
            description: String::new(),
            parent_id: None,
            order: 0,
            status,
        }
    }

    pub fn with_parent(mut self, parent_id: TaxonomyId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    /// Draft pre-filled from an existing row, for updates.
    pub fn from_node(node: &TaxonomyNode) -> Self {
        Self {
            id: Some(node.id.clone()),
            kind: node.kind,
            name: node.name.clone(),
            slug: node.slug.clone(),
            description: node.description.clone(),
            parent_id: node.parent_id.clone(),
            order: node.order,
            status: node.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_sixteen_hex_digits() {
        let id = TaxonomyId::generate();
        assert_eq!(id.as_str().len(), 16);
        assert!(TaxonomyId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn id_parse_normalises_case() {
        let id = TaxonomyId::parse("00000000DEADBEEF").unwrap();
        assert_eq!(id.as_str(), "00000000deadbeef");
    }

    #[test]
    fn id_parse_rejects_bad_input() {
        assert!(TaxonomyId::parse("").is_err());
        assert!(TaxonomyId::parse("123").is_err());
        assert!(TaxonomyId::parse("zzzzzzzzzzzzzzzz").is_err());
    }

    #[test]
    fn id_serde_rejects_malformed() {
        let ok: TaxonomyId = serde_json::from_str("\"00000000000000ab\"").unwrap();
        assert_eq!(ok.as_str(), "00000000000000ab");
        assert!(serde_json::from_str::<TaxonomyId>("\"nope\"").is_err());
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in TaxonomyKind::ALL {
            assert_eq!(TaxonomyKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(
            serde_json::to_string(&TaxonomyKind::LinkCategory).unwrap(),
            "\"link-category\""
        );
    }

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(TaxonomyStatus::Published.code(), 1);
        assert_eq!(TaxonomyStatus::Private.code(), 2);
        assert_eq!(TaxonomyStatus::Trashed.code(), 3);
        assert_eq!(TaxonomyStatus::from_code(4), None);
    }

    #[test]
    fn only_categories_cascade() {
        assert!(TaxonomyKind::Category.cascades());
        assert!(!TaxonomyKind::Tag.cascades());
        assert!(!TaxonomyKind::LinkCategory.cascades());
        assert!(!TaxonomyKind::Tag.allows_parent());
    }

    #[test]
    fn content_kind_acceptance() {
        assert!(ContentKind::Post.accepts(TaxonomyKind::Category));
        assert!(ContentKind::Post.accepts(TaxonomyKind::Tag));
        assert!(!ContentKind::Post.accepts(TaxonomyKind::LinkCategory));
        assert!(ContentKind::Link.accepts(TaxonomyKind::LinkCategory));
        assert!(!ContentKind::Link.accepts(TaxonomyKind::Tag));
    }
}
