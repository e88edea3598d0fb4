//! Postgres implementation of the taxonomy ports.
//!
//! All SQL is runtime-checked (sqlx::query, not sqlx::query!) so the crate
//! builds without a live database.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use taxon_core::ports::{TaxonomyStore, TaxonomyTx};
use taxon_core::{
    ObjectId, Relationship, Result, StatusFilter, TaxonomyError, TaxonomyId, TaxonomyKind,
    TaxonomyNode, TaxonomyStatus,
};

use crate::errors::map_sqlx;
use crate::sqlx_types::{PgRelationshipRow, PgTaxonomyRow, NODE_COLUMNS};

fn into_nodes(rows: Vec<PgTaxonomyRow>) -> Result<Vec<TaxonomyNode>> {
    rows.into_iter()
        .map(|r| TaxonomyNode::try_from(r).map_err(|e| TaxonomyError::Internal(anyhow::anyhow!(e))))
        .collect()
}

fn into_relationships(rows: Vec<PgRelationshipRow>) -> Result<Vec<Relationship>> {
    rows.into_iter()
        .map(|r| Relationship::try_from(r).map_err(|e| TaxonomyError::Internal(anyhow::anyhow!(e))))
        .collect()
}

fn id_strings(ids: &[TaxonomyId]) -> Vec<String> {
    ids.iter().map(|id| id.as_str().to_string()).collect()
}

fn rows_sql(lock: bool) -> String {
    format!(
        "SELECT {NODE_COLUMNS} FROM taxonomy \
         WHERE kind = $1 AND status = ANY($2) \
         ORDER BY sort_order, name, id{}",
        if lock { " FOR UPDATE" } else { "" }
    )
}

const RELATIONSHIPS_FOR_OBJECT_SQL: &str = "SELECT object_id, taxonomy_id, sort_order \
     FROM taxonomy_relationship WHERE object_id = $1 ORDER BY sort_order, taxonomy_id";

// ── PgTaxonomyStore ───────────────────────────────────────────

/// Postgres-backed taxonomy store.
#[derive(Clone)]
pub struct PgTaxonomyStore {
    pool: PgPool,
}

impl PgTaxonomyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Concrete transaction, for callers that also write content rows and
    /// need them in the same unit of work.
    pub async fn begin_pg(&self) -> Result<PgTaxonomyTx> {
        let tx = self.pool.begin().await.map_err(map_sqlx)?;
        Ok(PgTaxonomyTx { tx })
    }
}

#[async_trait]
impl TaxonomyStore for PgTaxonomyStore {
    async fn fetch_rows(
        &self,
        kind: TaxonomyKind,
        filter: &StatusFilter,
    ) -> Result<Vec<TaxonomyNode>> {
        let rows = sqlx::query_as::<_, PgTaxonomyRow>(&rows_sql(false))
            .bind(kind.as_str())
            .bind(filter.codes())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        into_nodes(rows)
    }

    async fn relationships_for_object(&self, object_id: &ObjectId) -> Result<Vec<Relationship>> {
        let rows = sqlx::query_as::<_, PgRelationshipRow>(RELATIONSHIPS_FOR_OBJECT_SQL)
            .bind(object_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        into_relationships(rows)
    }

    async fn begin(&self) -> Result<Box<dyn TaxonomyTx>> {
        Ok(Box::new(self.begin_pg().await?))
    }
}

// ── PgTaxonomyTx ──────────────────────────────────────────────

pub struct PgTaxonomyTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTaxonomyTx {
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

#[async_trait]
impl TaxonomyTx for PgTaxonomyTx {
    async fn read_rows(&mut self, kind: TaxonomyKind, filter: &StatusFilter) -> Result<Vec<TaxonomyNode>> {
        let rows = sqlx::query_as::<_, PgTaxonomyRow>(&rows_sql(false))
            .bind(kind.as_str())
            .bind(filter.codes())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        into_nodes(rows)
    }

    async fn fetch_rows_for_update(
        &mut self,
        kind: TaxonomyKind,
        filter: &StatusFilter,
    ) -> Result<Vec<TaxonomyNode>> {
        let rows = sqlx::query_as::<_, PgTaxonomyRow>(&rows_sql(true))
            .bind(kind.as_str())
            .bind(filter.codes())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        into_nodes(rows)
    }

    async fn get_node(&mut self, id: &TaxonomyId) -> Result<Option<TaxonomyNode>> {
        let row = sqlx::query_as::<_, PgTaxonomyRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM taxonomy WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        match row {
            Some(r) => Ok(into_nodes(vec![r])?.pop()),
            None => Ok(None),
        }
    }

    async fn insert_node(&mut self, node: &TaxonomyNode) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO taxonomy
                (id, kind, name, slug, description, parent_id, sort_order, status, content_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(node.id.as_str())
        .bind(node.kind.as_str())
        .bind(&node.name)
        .bind(&node.slug)
        .bind(&node.description)
        .bind(node.parent_id.as_ref().map(|p| p.as_str()))
        .bind(node.order)
        .bind(node.status.code())
        .bind(node.content_count)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update_node(&mut self, node: &TaxonomyNode) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE taxonomy
            SET name = $2, slug = $3, description = $4, parent_id = $5,
                sort_order = $6, status = $7, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(node.id.as_str())
        .bind(&node.name)
        .bind(&node.slug)
        .bind(&node.description)
        .bind(node.parent_id.as_ref().map(|p| p.as_str()))
        .bind(node.order)
        .bind(node.status.code())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(TaxonomyError::NotFound(format!("taxonomy {}", node.id)));
        }
        Ok(())
    }

    async fn set_status(&mut self, ids: &[TaxonomyId], status: TaxonomyStatus) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE taxonomy SET status = $2, updated_at = now() \
             WHERE id = ANY($1) AND status <> $2",
        )
        .bind(id_strings(ids))
        .bind(status.code())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn delete_nodes(&mut self, ids: &[TaxonomyId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM taxonomy WHERE id = ANY($1)")
            .bind(id_strings(ids))
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn relationships_for_object(&mut self, object_id: &ObjectId) -> Result<Vec<Relationship>> {
        let rows = sqlx::query_as::<_, PgRelationshipRow>(RELATIONSHIPS_FOR_OBJECT_SQL)
            .bind(object_id.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        into_relationships(rows)
    }

    async fn insert_relationship(&mut self, rel: &Relationship) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO taxonomy_relationship (object_id, taxonomy_id, sort_order) \
             VALUES ($1, $2, $3) ON CONFLICT (object_id, taxonomy_id) DO NOTHING",
        )
        .bind(rel.object_id.as_str())
        .bind(rel.taxonomy_id.as_str())
        .bind(rel.order)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_relationship(
        &mut self,
        object_id: &ObjectId,
        taxonomy_id: &TaxonomyId,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM taxonomy_relationship WHERE object_id = $1 AND taxonomy_id = $2",
        )
        .bind(object_id.as_str())
        .bind(taxonomy_id.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() == 1)
    }

    async fn count_relationships(&mut self, ids: &[TaxonomyId]) -> Result<i64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let count: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM taxonomy_relationship WHERE taxonomy_id = ANY($1)",
        )
        .bind(id_strings(ids))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(count)
    }

    async fn relationship_counts(
        &mut self,
        kind: TaxonomyKind,
    ) -> Result<HashMap<TaxonomyId, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT r.taxonomy_id, count(*)
            FROM taxonomy_relationship r
            JOIN taxonomy t ON t.id = r.taxonomy_id
            WHERE t.kind = $1
            GROUP BY r.taxonomy_id
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter()
            .map(|(id, count)| Ok((TaxonomyId::parse(&id)?, count)))
            .collect()
    }

    async fn adjust_count(&mut self, id: &TaxonomyId, delta: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE taxonomy SET content_count = GREATEST(content_count + $2, 0) WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(delta)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(TaxonomyError::NotFound(format!("taxonomy {}", id)));
        }
        Ok(())
    }

    async fn recount(&mut self, id: &TaxonomyId) -> Result<i64> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE taxonomy t
            SET content_count = (
                SELECT count(*) FROM taxonomy_relationship r WHERE r.taxonomy_id = t.id
            )
            WHERE t.id = $1
            RETURNING t.content_count
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        count.ok_or_else(|| TaxonomyError::NotFound(format!("taxonomy {}", id)))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx)
    }
}
