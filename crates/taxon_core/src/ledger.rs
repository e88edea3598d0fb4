//! Relationship ledger operations.
//!
//! Content modules never touch ledger rows directly. They call these functions
//! with the transaction they use for their own content write, so the content
//! row, the ledger rows and the denormalized counts commit or roll back as one.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::error::{Result, TaxonomyError};
use crate::ports::TaxonomyTx;
use crate::types::{ContentKind, ObjectId, Relationship, TaxonomyId, TaxonomyKind, TaxonomyStatus};

/// Set difference between an object's previous and requested taxonomy ids.
/// An id never appears in both `to_add` and `to_remove`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerDiff {
    pub to_add: Vec<TaxonomyId>,
    pub to_remove: Vec<TaxonomyId>,
}

impl LedgerDiff {
    /// `to_add` keeps the order of `new_ids`; `to_remove` keeps the order of `old_ids`.
    pub fn compute(old_ids: &[TaxonomyId], new_ids: &[TaxonomyId]) -> Self {
        let old: HashSet<&TaxonomyId> = old_ids.iter().collect();
        let new: HashSet<&TaxonomyId> = new_ids.iter().collect();
        Self {
            to_add: dedup(new_ids.iter().filter(|id| !old.contains(id))),
            to_remove: dedup(old_ids.iter().filter(|id| !new.contains(id))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

fn dedup<'a>(ids: impl Iterator<Item = &'a TaxonomyId>) -> Vec<TaxonomyId> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).cloned().collect()
}

/// Check that `ids` (the object's complete set after the write) exist and
/// suit `content_kind`, and that none of `fresh` is trashed. Already-attached
/// ids may sit under a node trashed since. A link must end up with exactly
/// one link category.
async fn validate_assignment(
    tx: &mut dyn TaxonomyTx,
    content_kind: ContentKind,
    ids: &[TaxonomyId],
    fresh: &[TaxonomyId],
) -> Result<()> {
    let mut link_categories = 0;
    for id in ids {
        let node = tx
            .get_node(id)
            .await?
            .ok_or_else(|| TaxonomyError::NotFound(format!("taxonomy {}", id)))?;
        if node.status == TaxonomyStatus::Trashed && fresh.contains(id) {
            return Err(TaxonomyError::InvalidInput(format!(
                "taxonomy {} is trashed",
                id
            )));
        }
        if !content_kind.accepts(node.kind) {
            return Err(TaxonomyError::InvalidInput(format!(
                "{} cannot be attached to {} {}",
                content_kind.as_str(),
                node.kind,
                id
            )));
        }
        if node.kind == TaxonomyKind::LinkCategory {
            link_categories += 1;
        }
    }
    if content_kind == ContentKind::Link && link_categories != 1 {
        return Err(TaxonomyError::InvalidInput(format!(
            "a link needs exactly one link category, got {}",
            link_categories
        )));
    }
    Ok(())
}

async fn link(tx: &mut dyn TaxonomyTx, object_id: &ObjectId, id: &TaxonomyId, order: i32) -> Result<bool> {
    let rel = Relationship {
        object_id: object_id.clone(),
        taxonomy_id: id.clone(),
        order,
    };
    let inserted = tx.insert_relationship(&rel).await?;
    if inserted {
        tx.adjust_count(id, 1).await?;
    }
    Ok(inserted)
}

async fn unlink(tx: &mut dyn TaxonomyTx, object_id: &ObjectId, id: &TaxonomyId) -> Result<bool> {
    let removed = tx.delete_relationship(object_id, id).await?;
    if removed {
        tx.adjust_count(id, -1).await?;
    }
    Ok(removed)
}

/// Attach `object_id` to each of `ids`, on top of whatever it already has.
/// Existing pairs are left alone. Returns the ids newly attached.
pub async fn attach(
    tx: &mut dyn TaxonomyTx,
    content_kind: ContentKind,
    object_id: &ObjectId,
    ids: &[TaxonomyId],
) -> Result<Vec<TaxonomyId>> {
    let existing = tx.relationships_for_object(object_id).await?;
    let old_ids: Vec<TaxonomyId> = existing.iter().map(|r| r.taxonomy_id.clone()).collect();
    let mut combined = old_ids.clone();
    combined.extend(ids.iter().cloned());
    let combined = dedup(combined.iter());
    let diff = LedgerDiff::compute(&old_ids, &combined);
    validate_assignment(tx, content_kind, &combined, &diff.to_add).await?;

    let mut next_order = existing.iter().map(|r| r.order).max().map_or(0, |o| o + 1);
    let mut attached = Vec::with_capacity(diff.to_add.len());
    for id in &diff.to_add {
        if link(tx, object_id, id, next_order).await? {
            attached.push(id.clone());
            next_order += 1;
        }
    }
    tracing::debug!(object = %object_id, attached = attached.len(), "ledger attach");
    Ok(attached)
}

/// Make `new_ids` the object's complete set. Only the difference is written:
/// an id present before and after is never unlinked and relinked.
pub async fn replace_all(
    tx: &mut dyn TaxonomyTx,
    content_kind: ContentKind,
    object_id: &ObjectId,
    new_ids: &[TaxonomyId],
) -> Result<LedgerDiff> {
    let new_ids = dedup(new_ids.iter());
    let existing = tx.relationships_for_object(object_id).await?;
    let old_ids: Vec<TaxonomyId> = existing.iter().map(|r| r.taxonomy_id.clone()).collect();
    let diff = LedgerDiff::compute(&old_ids, &new_ids);
    validate_assignment(tx, content_kind, &new_ids, &diff.to_add).await?;

    for id in &diff.to_remove {
        unlink(tx, object_id, id).await?;
    }
    for id in &diff.to_add {
        let order = new_ids.iter().position(|n| n == id).unwrap_or(0) as i32;
        link(tx, object_id, id, order).await?;
    }
    tracing::debug!(
        object = %object_id,
        added = diff.to_add.len(),
        removed = diff.to_remove.len(),
        "ledger replace"
    );
    Ok(diff)
}

/// Remove `object_id` from `ids`, or from everything when `ids` is `None`.
/// Returns the ids actually detached.
pub async fn detach(
    tx: &mut dyn TaxonomyTx,
    object_id: &ObjectId,
    ids: Option<&[TaxonomyId]>,
) -> Result<Vec<TaxonomyId>> {
    let existing = tx.relationships_for_object(object_id).await?;
    let wanted: Option<BTreeSet<&TaxonomyId>> = ids.map(|ids| ids.iter().collect());
    let mut detached = Vec::new();
    for rel in &existing {
        if wanted.as_ref().is_some_and(|w| !w.contains(&rel.taxonomy_id)) {
            continue;
        }
        if unlink(tx, object_id, &rel.taxonomy_id).await? {
            detached.push(rel.taxonomy_id.clone());
        }
    }
    tracing::debug!(object = %object_id, detached = detached.len(), "ledger detach");
    Ok(detached)
}
