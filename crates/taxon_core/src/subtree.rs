//! Subtree selection: a node (or several) plus every transitive descendant.
//!
//! Status is not consulted during traversal. Filtering happens when the
//! snapshot is fetched, so whatever is in the tree beneath a matched node is
//! included.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::tree::{TaxonomyTree, TaxonomyTreeNode};
use crate::types::TaxonomyId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtreeQuery {
    Id(TaxonomyId),
    Ids(Vec<TaxonomyId>),
    Slug(String),
}

impl SubtreeQuery {
    fn matches(&self, node: &TaxonomyTreeNode) -> bool {
        match self {
            Self::Id(id) => &node.node.id == id,
            Self::Ids(ids) => ids.contains(&node.node.id),
            Self::Slug(slug) => &node.node.slug == slug,
        }
    }
}

/// Ids of every matched node's subtree, de-duplicated. Matched nodes are
/// included only when `include_self` is set, unless they are themselves
/// descendants of another matched node.
pub fn select_descendants(
    tree: &TaxonomyTree,
    query: &SubtreeQuery,
    include_self: bool,
) -> BTreeSet<TaxonomyId> {
    let mut out = BTreeSet::new();
    for root in &tree.roots {
        collect(root, query, include_self, false, &mut out);
    }
    out
}

fn collect(
    node: &TaxonomyTreeNode,
    query: &SubtreeQuery,
    include_self: bool,
    ancestor_checked: bool,
    out: &mut BTreeSet<TaxonomyId>,
) {
    let matched = query.matches(node);
    if ancestor_checked || (matched && include_self) {
        out.insert(node.node.id.clone());
    }
    let checked = ancestor_checked || matched;
    for child in &node.children {
        collect(child, query, include_self, checked, out);
    }
}
