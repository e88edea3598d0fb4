//! Status cascade engine.
//!
//! For category nodes a status change on `N` propagates:
//! - to `published`: every trashed or private ancestor becomes published;
//! - to `private`: every published descendant becomes private;
//! - to `trashed`: every published or private descendant becomes trashed.
//!
//! Other kinds never propagate. Planning is pure over a snapshot; `apply_plan`
//! writes the plan through the caller's transaction.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::Result;
use crate::path::ancestor_ids;
use crate::ports::TaxonomyTx;
use crate::subtree::{select_descendants, SubtreeQuery};
use crate::tree::TaxonomyTree;
use crate::types::{TaxonomyId, TaxonomyNode, TaxonomyStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadePlan {
    /// Ancestors to move to `published`.
    pub promote: Vec<TaxonomyId>,
    /// Descendants to move to `demote_to`.
    pub demote: Vec<TaxonomyId>,
    pub demote_to: Option<TaxonomyStatus>,
}

impl CascadePlan {
    pub fn is_empty(&self) -> bool {
        self.promote.is_empty() && self.demote.is_empty()
    }

    pub fn affected(&self) -> usize {
        self.promote.len() + self.demote.len()
    }
}

/// Work out which other rows must change when `target` moves to `new_status`.
///
/// `rows` is the unfiltered snapshot of the target's kind, taken inside the
/// transaction that will apply the plan. The target's own row is not part of
/// the plan.
pub fn plan_status_change(
    rows: &[TaxonomyNode],
    target: &TaxonomyId,
    new_status: TaxonomyStatus,
) -> CascadePlan {
    let Some(node) = rows.iter().find(|r| &r.id == target) else {
        return CascadePlan::default();
    };
    if !node.kind.cascades() {
        return CascadePlan::default();
    }

    match new_status {
        TaxonomyStatus::Published => {
            let promote = ancestor_ids(rows, target)
                .into_iter()
                .filter(|id| {
                    status_of(rows, id)
                        .map(|s| matches!(s, TaxonomyStatus::Trashed | TaxonomyStatus::Private))
                        .unwrap_or(false)
                })
                .collect();
            CascadePlan {
                promote,
                ..CascadePlan::default()
            }
        }
        TaxonomyStatus::Private => CascadePlan {
            demote: descendants_in(rows, target, &[TaxonomyStatus::Published]),
            demote_to: Some(TaxonomyStatus::Private),
            ..CascadePlan::default()
        },
        TaxonomyStatus::Trashed => CascadePlan {
            demote: descendants_in(
                rows,
                target,
                &[TaxonomyStatus::Published, TaxonomyStatus::Private],
            ),
            demote_to: Some(TaxonomyStatus::Trashed),
            ..CascadePlan::default()
        },
    }
}

/// Plan for trashing several subtrees at once (the remove operation).
/// Every node in the union of subtrees not already trashed is included,
/// the requested roots among them.
pub fn plan_trash_subtrees(rows: &[TaxonomyNode], roots: &[TaxonomyId]) -> CascadePlan {
    let tree = TaxonomyTree::build(rows);
    let subtree = select_descendants(&tree, &SubtreeQuery::Ids(roots.to_vec()), true);
    let demote = subtree
        .into_iter()
        .filter(|id| status_of(rows, id) != Some(TaxonomyStatus::Trashed))
        .collect();
    CascadePlan {
        demote,
        demote_to: Some(TaxonomyStatus::Trashed),
        ..CascadePlan::default()
    }
}

pub async fn apply_plan(tx: &mut dyn TaxonomyTx, plan: &CascadePlan) -> Result<u64> {
    let mut changed = 0;
    if !plan.promote.is_empty() {
        changed += tx.set_status(&plan.promote, TaxonomyStatus::Published).await?;
    }
    if let (false, Some(status)) = (plan.demote.is_empty(), plan.demote_to) {
        changed += tx.set_status(&plan.demote, status).await?;
    }
    Ok(changed)
}

fn status_of(rows: &[TaxonomyNode], id: &TaxonomyId) -> Option<TaxonomyStatus> {
    rows.iter().find(|r| &r.id == id).map(|r| r.status)
}

fn descendants_in(
    rows: &[TaxonomyNode],
    target: &TaxonomyId,
    statuses: &[TaxonomyStatus],
) -> Vec<TaxonomyId> {
    let tree = TaxonomyTree::build(rows);
    let ids: BTreeSet<TaxonomyId> = select_descendants(&tree, &SubtreeQuery::Id(target.clone()), false);
    ids.into_iter()
        .filter(|id| {
            status_of(rows, id)
                .map(|s| statuses.contains(&s))
                .unwrap_or(false)
        })
        .collect()
}
