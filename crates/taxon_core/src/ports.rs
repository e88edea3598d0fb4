//! Storage port traits.
//! Implemented by taxon_postgres (and `memory` for tests). Core logic depends
//! only on these traits.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::status_filter::StatusFilter;
use crate::types::{ObjectId, Relationship, TaxonomyId, TaxonomyKind, TaxonomyNode, TaxonomyStatus};

/// Entry point to the taxonomy tables.
#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    /// Snapshot of one kind's rows, restricted to `filter`. Order is the
    /// store's natural order and must be stable for a fixed table state.
    async fn fetch_rows(&self, kind: TaxonomyKind, filter: &StatusFilter)
        -> Result<Vec<TaxonomyNode>>;

    /// Ledger rows for one content object.
    async fn relationships_for_object(&self, object_id: &ObjectId) -> Result<Vec<Relationship>>;

    /// Open a unit of work. Dropping the handle without `commit` rolls back.
    async fn begin(&self) -> Result<Box<dyn TaxonomyTx>>;
}

/// A transactional handle. Every mutating call of the cascade engine, the
/// ledger ops and the reconciler goes through one of these.
#[async_trait]
pub trait TaxonomyTx: Send {
    // ── Taxonomy rows ──────────────────────────────────────────

    /// Plain read inside the transaction. Takes no row locks.
    async fn read_rows(&mut self, kind: TaxonomyKind, filter: &StatusFilter) -> Result<Vec<TaxonomyNode>>;

    /// Like `TaxonomyStore::fetch_rows`, but rows are locked for the rest of
    /// the transaction where the store supports it.
    async fn fetch_rows_for_update(
        &mut self,
        kind: TaxonomyKind,
        filter: &StatusFilter,
    ) -> Result<Vec<TaxonomyNode>>;

    async fn get_node(&mut self, id: &TaxonomyId) -> Result<Option<TaxonomyNode>>;

    async fn insert_node(&mut self, node: &TaxonomyNode) -> Result<()>;

    /// Update every column except `content_count`, which only the ledger
    /// ops and the reconciler touch.
    async fn update_node(&mut self, node: &TaxonomyNode) -> Result<()>;

    /// Returns the number of rows changed.
    async fn set_status(&mut self, ids: &[TaxonomyId], status: TaxonomyStatus) -> Result<u64>;

    /// Permanently delete rows. Returns the number deleted.
    async fn delete_nodes(&mut self, ids: &[TaxonomyId]) -> Result<u64>;

    // ── Ledger ─────────────────────────────────────────────────

    async fn relationships_for_object(&mut self, object_id: &ObjectId) -> Result<Vec<Relationship>>;

    /// Returns false when the `(object, taxonomy)` row already existed.
    async fn insert_relationship(&mut self, rel: &Relationship) -> Result<bool>;

    /// Returns false when there was no such row.
    async fn delete_relationship(
        &mut self,
        object_id: &ObjectId,
        taxonomy_id: &TaxonomyId,
    ) -> Result<bool>;

    /// Number of ledger rows referencing any of `ids`.
    async fn count_relationships(&mut self, ids: &[TaxonomyId]) -> Result<i64>;

    /// Ledger row count per taxonomy id, for rows of `kind`. Ids with no
    /// rows may be absent.
    async fn relationship_counts(&mut self, kind: TaxonomyKind) -> Result<HashMap<TaxonomyId, i64>>;

    // ── Denormalized counters ──────────────────────────────────

    /// Add `delta` to `content_count`, flooring at zero. `NotFound` when the
    /// row does not exist.
    async fn adjust_count(&mut self, id: &TaxonomyId, delta: i64) -> Result<()>;

    /// Overwrite `content_count` with the ledger count, computed inside the
    /// same statement. Returns the new value.
    async fn recount(&mut self, id: &TaxonomyId) -> Result<i64>;

    // ── Completion ─────────────────────────────────────────────

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
