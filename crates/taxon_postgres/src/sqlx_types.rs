//! Row structs for runtime-checked queries, converted into core types.

use taxon_core::{ObjectId, Relationship, TaxonomyId, TaxonomyKind, TaxonomyNode, TaxonomyStatus};

pub(crate) const NODE_COLUMNS: &str =
    "id, kind, name, slug, description, parent_id, sort_order, status, content_count";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PgTaxonomyRow {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub parent_id: Option<String>,
    pub sort_order: i32,
    pub status: i16,
    pub content_count: i64,
}

impl TryFrom<PgTaxonomyRow> for TaxonomyNode {
    type Error = String;

    fn try_from(row: PgTaxonomyRow) -> Result<Self, Self::Error> {
        let kind = TaxonomyKind::from_str(&row.kind)
            .ok_or_else(|| format!("unknown taxonomy kind {:?} on {}", row.kind, row.id))?;
        let status = TaxonomyStatus::from_code(i64::from(row.status))
            .ok_or_else(|| format!("unknown taxonomy status {} on {}", row.status, row.id))?;
        let parent_id = match row.parent_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(TaxonomyId::parse(raw).map_err(|e| e.to_string())?),
        };
        Ok(TaxonomyNode {
            id: TaxonomyId::parse(&row.id).map_err(|e| e.to_string())?,
            kind,
            name: row.name,
            slug: row.slug,
            description: row.description,
            parent_id,
            order: row.sort_order,
            status,
            content_count: row.content_count,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PgRelationshipRow {
    pub object_id: String,
    pub taxonomy_id: String,
    pub sort_order: i32,
}

impl TryFrom<PgRelationshipRow> for Relationship {
    type Error = String;

    fn try_from(row: PgRelationshipRow) -> Result<Self, Self::Error> {
        Ok(Relationship {
            object_id: ObjectId::new(row.object_id).map_err(|e| e.to_string())?,
            taxonomy_id: TaxonomyId::parse(&row.taxonomy_id).map_err(|e| e.to_string())?,
            order: row.sort_order,
        })
    }
}
