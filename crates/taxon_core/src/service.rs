//! TaxonomyService — the operations controllers call.
//!
//! Holds the store as `Arc<dyn TaxonomyStore>` so the same logic runs against
//! Postgres or the in-memory store. Every write opens one transaction, does
//! all of its reads and writes through it, and commits once; any error drops
//! the transaction and nothing is applied.
//!
//! Content modules that already hold a transaction for their own row write
//! should call `crate::ledger` and the `*_in` functions here directly with
//! that transaction instead of the service methods.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;

use crate::cascade::{apply_plan, plan_status_change, plan_trash_subtrees, CascadePlan};
use crate::config::TaxonomyConfig;
use crate::error::{Result, TaxonomyError};
use crate::ledger::{self, LedgerDiff};
use crate::path::{ancestor_ids, resolve_path, Breadcrumb, PathQuery};
use crate::ports::{TaxonomyStore, TaxonomyTx};
use crate::reconcile::{self, CountDrift, ReconcileReport};
use crate::status_filter::StatusFilter;
use crate::subtree::{select_descendants, SubtreeQuery};
use crate::tree::TaxonomyTree;
use crate::types::{
    ContentKind, ObjectId, Relationship, TaxonomyDraft, TaxonomyId, TaxonomyKind, TaxonomyNode,
    TaxonomyStatus,
};
use crate::validate::prepare_node;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub node: TaxonomyNode,
    pub created: bool,
    pub previous_status: Option<TaxonomyStatus>,
    pub cascade: CascadePlan,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusChangeOutcome {
    /// Every id whose status is now the target status, requested roots included.
    pub affected: Vec<TaxonomyId>,
    pub changed_rows: u64,
}

// ── TaxonomyService trait ─────────────────────────────────────

#[async_trait]
pub trait TaxonomyService: Send + Sync {
    // ── Reads ──────────────────────────────────────────────────

    async fn get_tree(&self, kind: TaxonomyKind, filter: &StatusFilter) -> Result<TaxonomyTree>;

    async fn get_path(
        &self,
        kind: TaxonomyKind,
        filter: &StatusFilter,
        query: &PathQuery,
    ) -> Result<Vec<Breadcrumb>>;

    async fn get_subtree_ids(
        &self,
        kind: TaxonomyKind,
        filter: &StatusFilter,
        query: &SubtreeQuery,
        include_self: bool,
    ) -> Result<BTreeSet<TaxonomyId>>;

    async fn content_taxonomies(&self, object_id: &ObjectId) -> Result<Vec<Relationship>>;

    // ── Taxonomy writes ────────────────────────────────────────

    /// Create (`draft.id = None`) or update a node, cascading status changes.
    async fn save_taxonomy(&self, draft: TaxonomyDraft) -> Result<SaveOutcome>;

    /// Trash the subtrees rooted at `ids`. Refused with `HasRelatedContent`
    /// while any ledger row references a node in those subtrees.
    async fn remove_taxonomies(
        &self,
        kind: TaxonomyKind,
        ids: &[TaxonomyId],
    ) -> Result<StatusChangeOutcome>;

    /// Move trashed subtrees back to `private`, lifting trashed ancestors too.
    async fn restore_taxonomies(
        &self,
        kind: TaxonomyKind,
        ids: &[TaxonomyId],
    ) -> Result<StatusChangeOutcome>;

    /// Permanently delete trashed subtrees with no ledger rows.
    async fn purge_taxonomies(&self, kind: TaxonomyKind, ids: &[TaxonomyId]) -> Result<u64>;

    // ── Ledger writes (own transaction) ────────────────────────

    async fn attach_content(
        &self,
        content_kind: ContentKind,
        object_id: &ObjectId,
        ids: &[TaxonomyId],
    ) -> Result<Vec<TaxonomyId>>;

    async fn replace_content_taxonomies(
        &self,
        content_kind: ContentKind,
        object_id: &ObjectId,
        new_ids: &[TaxonomyId],
    ) -> Result<LedgerDiff>;

    async fn detach_content(&self, object_id: &ObjectId) -> Result<Vec<TaxonomyId>>;

    // ── Maintenance ────────────────────────────────────────────

    async fn recompute_counts(&self, kind: Option<TaxonomyKind>) -> Result<ReconcileReport>;

    async fn verify_counts(&self, kind: Option<TaxonomyKind>) -> Result<Vec<CountDrift>>;
}

// ── Transaction-scoped writes ─────────────────────────────────
//
// The bodies of the taxonomy writes, for callers that already hold a
// transaction (for example a content save that also attaches the new post
// through `crate::ledger`). None of these commit.

async fn locked_rows(
    tx: &mut dyn TaxonomyTx,
    kind: TaxonomyKind,
    ids: &[TaxonomyId],
) -> Result<Vec<TaxonomyNode>> {
    let rows = tx.fetch_rows_for_update(kind, &StatusFilter::all()).await?;
    for id in ids {
        if !rows.iter().any(|r| &r.id == id) {
            return Err(TaxonomyError::NotFound(format!("{} {}", kind, id)));
        }
    }
    Ok(rows)
}

/// The requested nodes plus, for cascading kinds, all their descendants.
fn scope(rows: &[TaxonomyNode], kind: TaxonomyKind, ids: &[TaxonomyId]) -> BTreeSet<TaxonomyId> {
    if kind.cascades() {
        let tree = TaxonomyTree::build(rows);
        select_descendants(&tree, &SubtreeQuery::Ids(ids.to_vec()), true)
    } else {
        ids.iter().cloned().collect()
    }
}

async fn guard_related_content(
    tx: &mut dyn TaxonomyTx,
    scope: &BTreeSet<TaxonomyId>,
    requested: &[TaxonomyId],
) -> Result<()> {
    let scope: Vec<TaxonomyId> = scope.iter().cloned().collect();
    let count = tx.count_relationships(&scope).await?;
    if count > 0 {
        tracing::info!(count, roots = requested.len(), "taxonomy removal refused, related content exists");
        return Err(TaxonomyError::HasRelatedContent {
            count,
            ids: requested.to_vec(),
        });
    }
    Ok(())
}

/// Create or update a node and apply its cascade inside `tx`.
pub async fn save_taxonomy_in(tx: &mut dyn TaxonomyTx, draft: TaxonomyDraft) -> Result<SaveOutcome> {
    let mut rows = tx
        .fetch_rows_for_update(draft.kind, &StatusFilter::all())
        .await?;

    let existing = match &draft.id {
        Some(id) => {
            let found = tx
                .get_node(id)
                .await?
                .ok_or_else(|| TaxonomyError::NotFound(format!("taxonomy {}", id)))?;
            Some(found)
        }
        None => None,
    };

    let node = prepare_node(&draft, &rows, existing.as_ref(), TaxonomyId::generate())?;
    let previous_status = existing.as_ref().map(|e| e.status);

    match &existing {
        Some(_) => {
            tx.update_node(&node).await?;
            if let Some(slot) = rows.iter_mut().find(|r| r.id == node.id) {
                *slot = node.clone();
            }
        }
        None => {
            tx.insert_node(&node).await?;
            rows.push(node.clone());
        }
    }

    // Planned on every save, not only on a status change: re-parenting
    // under a hidden ancestor needs rule 1 too, and an empty plan is free.
    let cascade = plan_status_change(&rows, &node.id, node.status);
    let changed = apply_plan(tx, &cascade).await?;

    tracing::info!(
        id = %node.id,
        status = %node.status,
        created = existing.is_none(),
        cascaded = changed,
        "taxonomy saved"
    );
    Ok(SaveOutcome {
        created: existing.is_none(),
        node,
        previous_status,
        cascade,
    })
}

/// Trash the subtrees rooted at `ids` inside `tx`, behind the related-content guard.
pub async fn remove_taxonomies_in(
    tx: &mut dyn TaxonomyTx,
    kind: TaxonomyKind,
    ids: &[TaxonomyId],
) -> Result<StatusChangeOutcome> {
    if ids.is_empty() {
        return Ok(StatusChangeOutcome::default());
    }
    let rows = locked_rows(tx, kind, ids).await?;
    let scope = scope(&rows, kind, ids);
    guard_related_content(tx, &scope, ids).await?;

    let plan = if kind.cascades() {
        plan_trash_subtrees(&rows, ids)
    } else {
        CascadePlan {
            demote: ids.to_vec(),
            demote_to: Some(TaxonomyStatus::Trashed),
            ..CascadePlan::default()
        }
    };
    let changed_rows = apply_plan(tx, &plan).await?;

    tracing::info!(%kind, trashed = changed_rows, "taxonomies removed");
    Ok(StatusChangeOutcome {
        affected: scope.into_iter().collect(),
        changed_rows,
    })
}

pub async fn restore_taxonomies_in(
    tx: &mut dyn TaxonomyTx,
    kind: TaxonomyKind,
    ids: &[TaxonomyId],
) -> Result<StatusChangeOutcome> {
    if ids.is_empty() {
        return Ok(StatusChangeOutcome::default());
    }
    let rows = locked_rows(tx, kind, ids).await?;
    let mut targets = scope(&rows, kind, ids);
    if kind.cascades() {
        for id in ids {
            targets.extend(ancestor_ids(&rows, id));
        }
    }
    let trashed: Vec<TaxonomyId> = targets
        .into_iter()
        .filter(|id| {
            rows.iter()
                .any(|r| &r.id == id && r.status == TaxonomyStatus::Trashed)
        })
        .collect();
    let changed_rows = if trashed.is_empty() {
        0
    } else {
        tx.set_status(&trashed, TaxonomyStatus::Private).await?
    };

    tracing::info!(%kind, restored = changed_rows, "taxonomies restored");
    Ok(StatusChangeOutcome {
        affected: trashed,
        changed_rows,
    })
}

pub async fn purge_taxonomies_in(
    tx: &mut dyn TaxonomyTx,
    kind: TaxonomyKind,
    ids: &[TaxonomyId],
) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let rows = locked_rows(tx, kind, ids).await?;
    let scope = scope(&rows, kind, ids);
    if let Some(live) = rows
        .iter()
        .find(|r| scope.contains(&r.id) && r.status != TaxonomyStatus::Trashed)
    {
        return Err(TaxonomyError::InvalidInput(format!(
            "{} {} is {}, only trashed nodes can be purged",
            kind, live.id, live.status
        )));
    }
    guard_related_content(tx, &scope, ids).await?;

    let doomed: Vec<TaxonomyId> = scope.into_iter().collect();
    let deleted = tx.delete_nodes(&doomed).await?;

    tracing::info!(%kind, deleted, "taxonomies purged");
    Ok(deleted)
}

// ── TaxonomyServiceImpl ───────────────────────────────────────

pub struct TaxonomyServiceImpl {
    store: Arc<dyn TaxonomyStore>,
    config: TaxonomyConfig,
}

impl TaxonomyServiceImpl {
    pub fn new(store: Arc<dyn TaxonomyStore>) -> Self {
        Self {
            store,
            config: TaxonomyConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TaxonomyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TaxonomyConfig {
        &self.config
    }
}

#[async_trait]
impl TaxonomyService for TaxonomyServiceImpl {
    async fn get_tree(&self, kind: TaxonomyKind, filter: &StatusFilter) -> Result<TaxonomyTree> {
        let rows = self.store.fetch_rows(kind, filter).await?;
        Ok(TaxonomyTree::build(&rows))
    }

    async fn get_path(
        &self,
        kind: TaxonomyKind,
        filter: &StatusFilter,
        query: &PathQuery,
    ) -> Result<Vec<Breadcrumb>> {
        let rows = self.store.fetch_rows(kind, filter).await?;
        Ok(resolve_path(&rows, query, &self.config))
    }

    async fn get_subtree_ids(
        &self,
        kind: TaxonomyKind,
        filter: &StatusFilter,
        query: &SubtreeQuery,
        include_self: bool,
    ) -> Result<BTreeSet<TaxonomyId>> {
        let tree = self.get_tree(kind, filter).await?;
        Ok(select_descendants(&tree, query, include_self))
    }

    async fn content_taxonomies(&self, object_id: &ObjectId) -> Result<Vec<Relationship>> {
        self.store.relationships_for_object(object_id).await
    }

    #[instrument(skip(self, draft), fields(kind = %draft.kind, id = ?draft.id))]
    async fn save_taxonomy(&self, draft: TaxonomyDraft) -> Result<SaveOutcome> {
        let mut tx = self.store.begin().await?;
        let outcome = save_taxonomy_in(tx.as_mut(), draft).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn remove_taxonomies(
        &self,
        kind: TaxonomyKind,
        ids: &[TaxonomyId],
    ) -> Result<StatusChangeOutcome> {
        if ids.is_empty() {
            return Ok(StatusChangeOutcome::default());
        }
        let mut tx = self.store.begin().await?;
        let outcome = remove_taxonomies_in(tx.as_mut(), kind, ids).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn restore_taxonomies(
        &self,
        kind: TaxonomyKind,
        ids: &[TaxonomyId],
    ) -> Result<StatusChangeOutcome> {
        if ids.is_empty() {
            return Ok(StatusChangeOutcome::default());
        }
        let mut tx = self.store.begin().await?;
        let outcome = restore_taxonomies_in(tx.as_mut(), kind, ids).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn purge_taxonomies(&self, kind: TaxonomyKind, ids: &[TaxonomyId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut tx = self.store.begin().await?;
        let deleted = purge_taxonomies_in(tx.as_mut(), kind, ids).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    #[instrument(skip(self, ids), fields(object = %object_id))]
    async fn attach_content(
        &self,
        content_kind: ContentKind,
        object_id: &ObjectId,
        ids: &[TaxonomyId],
    ) -> Result<Vec<TaxonomyId>> {
        let mut tx = self.store.begin().await?;
        let attached = ledger::attach(tx.as_mut(), content_kind, object_id, ids).await?;
        tx.commit().await?;
        Ok(attached)
    }

    #[instrument(skip(self, new_ids), fields(object = %object_id))]
    async fn replace_content_taxonomies(
        &self,
        content_kind: ContentKind,
        object_id: &ObjectId,
        new_ids: &[TaxonomyId],
    ) -> Result<LedgerDiff> {
        let mut tx = self.store.begin().await?;
        let diff = ledger::replace_all(tx.as_mut(), content_kind, object_id, new_ids).await?;
        tx.commit().await?;
        Ok(diff)
    }

    #[instrument(skip(self), fields(object = %object_id))]
    async fn detach_content(&self, object_id: &ObjectId) -> Result<Vec<TaxonomyId>> {
        let mut tx = self.store.begin().await?;
        let detached = ledger::detach(tx.as_mut(), object_id, None).await?;
        tx.commit().await?;
        Ok(detached)
    }

    #[instrument(skip(self))]
    async fn recompute_counts(&self, kind: Option<TaxonomyKind>) -> Result<ReconcileReport> {
        let mut tx = self.store.begin().await?;
        let report = reconcile::recompute_counts(tx.as_mut(), kind).await?;
        tx.commit().await?;
        tracing::info!(
            examined = report.examined,
            corrected = report.corrected.len(),
            "content counts reconciled"
        );
        Ok(report)
    }

    async fn verify_counts(&self, kind: Option<TaxonomyKind>) -> Result<Vec<CountDrift>> {
        let mut tx = self.store.begin().await?;
        let (drift, _) = reconcile::find_drift(tx.as_mut(), kind).await?;
        tx.rollback().await?;
        Ok(drift)
    }
}
