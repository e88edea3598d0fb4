//! TaxonomyTree — the per-request forest built from a flat snapshot.
//!
//! The tree is a value object: built once from a snapshot, threaded explicitly
//! through path and subtree lookups, then discarded. Nothing here is cached
//! across requests.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::types::{TaxonomyId, TaxonomyNode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonomyTreeNode {
    #[serde(flatten)]
    pub node: TaxonomyNode,
    pub children: Vec<TaxonomyTreeNode>,
    pub is_leaf: bool,
}

impl TaxonomyTreeNode {
    pub fn id(&self) -> &TaxonomyId {
        &self.node.id
    }

    /// Pre-order visit of this node and everything beneath it.
    pub fn visit<'a>(&'a self, depth: usize, out: &mut Vec<(usize, &'a TaxonomyTreeNode)>) {
        out.push((depth, self));
        for child in &self.children {
            child.visit(depth + 1, out);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaxonomyTree {
    pub roots: Vec<TaxonomyTreeNode>,
}

impl TaxonomyTree {
    /// Assemble a forest from rows of a single kind.
    ///
    /// A row is a root when its parent is empty, missing from the snapshot,
    /// or itself. Rows caught in a parent cycle, and rows hanging below one,
    /// are never reachable from a root. For each such group, the parent chain
    /// of its first row in snapshot order is followed until a row repeats;
    /// that row lies on the cycle and is promoted to a root, so every row
    /// still appears exactly once under its real parent where possible.
    /// Duplicate ids keep the first occurrence.
    pub fn build(rows: &[TaxonomyNode]) -> Self {
        let mut unique: Vec<&TaxonomyNode> = Vec::with_capacity(rows.len());
        let mut seen: HashSet<&TaxonomyId> = HashSet::with_capacity(rows.len());
        for row in rows {
            if seen.insert(&row.id) {
                unique.push(row);
            } else {
                tracing::debug!(id = %row.id, "duplicate taxonomy id in snapshot, keeping first");
            }
        }

        let mut children: HashMap<&TaxonomyId, Vec<usize>> = HashMap::new();
        let mut root_indices = Vec::new();
        for (idx, row) in unique.iter().enumerate() {
            match &row.parent_id {
                Some(parent) if parent != &row.id && seen.contains(parent) => {
                    children.entry(parent).or_default().push(idx);
                }
                Some(parent) if parent != &row.id => {
                    tracing::debug!(id = %row.id, parent = %parent, "orphaned taxonomy node treated as root");
                    root_indices.push(idx);
                }
                _ => root_indices.push(idx),
            }
        }

        let mut visited = vec![false; unique.len()];
        let mut roots: Vec<TaxonomyTreeNode> = root_indices
            .into_iter()
            .map(|idx| assemble(idx, &unique, &children, &mut visited))
            .collect();

        let index: HashMap<&TaxonomyId, usize> =
            unique.iter().enumerate().map(|(idx, row)| (&row.id, idx)).collect();
        while let Some(start) = visited.iter().position(|v| !v) {
            let idx = cycle_member(start, &unique, &index);
            tracing::warn!(id = %unique[idx].id, "taxonomy parent cycle detected, promoting node to root");
            roots.push(assemble(idx, &unique, &children, &mut visited));
        }

        sort_siblings(&mut roots);
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of nodes in the whole forest.
    pub fn len(&self) -> usize {
        self.walk().len()
    }

    /// Pre-order traversal with depth (roots at depth 0).
    pub fn walk(&self) -> Vec<(usize, &TaxonomyTreeNode)> {
        let mut out = Vec::new();
        for root in &self.roots {
            root.visit(0, &mut out);
        }
        out
    }

    /// Nodes in display order with their depth, for indented option lists.
    pub fn flatten_indented(&self) -> Vec<(usize, &TaxonomyNode)> {
        self.walk()
            .into_iter()
            .map(|(depth, tree_node)| (depth, &tree_node.node))
            .collect()
    }

    /// Flat rows in display order.
    pub fn rows(&self) -> Vec<TaxonomyNode> {
        self.walk()
            .into_iter()
            .map(|(_, tree_node)| tree_node.node.clone())
            .collect()
    }

    pub fn find_by_id(&self, id: &TaxonomyId) -> Option<&TaxonomyTreeNode> {
        self.walk()
            .into_iter()
            .map(|(_, n)| n)
            .find(|n| &n.node.id == id)
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<&TaxonomyTreeNode> {
        self.walk()
            .into_iter()
            .map(|(_, n)| n)
            .find(|n| n.node.slug == slug)
    }

    /// Depth counted from 1 at the root, as breadcrumbs count it.
    pub fn depth_of(&self, id: &TaxonomyId) -> Option<usize> {
        self.walk()
            .into_iter()
            .find(|(_, n)| &n.node.id == id)
            .map(|(depth, _)| depth + 1)
    }
}

/// Follow parents from an unreachable row until one repeats. Every row on
/// the way is unreachable too, and has a parent in the snapshot.
fn cycle_member(
    start: usize,
    rows: &[&TaxonomyNode],
    index: &HashMap<&TaxonomyId, usize>,
) -> usize {
    let mut on_path = HashSet::new();
    let mut current = start;
    while on_path.insert(current) {
        match rows[current].parent_id.as_ref().and_then(|p| index.get(p)) {
            Some(&parent) => current = parent,
            None => break,
        }
    }
    current
}

fn assemble(
    idx: usize,
    rows: &[&TaxonomyNode],
    children: &HashMap<&TaxonomyId, Vec<usize>>,
    visited: &mut [bool],
) -> TaxonomyTreeNode {
    visited[idx] = true;
    let row = rows[idx];
    let mut kids = Vec::new();
    if let Some(child_indices) = children.get(&row.id) {
        for &child in child_indices {
            if !visited[child] {
                kids.push(assemble(child, rows, children, visited));
            }
        }
    }
    sort_siblings(&mut kids);
    TaxonomyTreeNode {
        node: row.clone(),
        is_leaf: kids.is_empty(),
        children: kids,
    }
}

fn sort_siblings(nodes: &mut [TaxonomyTreeNode]) {
    nodes.sort_by(|a, b| {
        a.node
            .order
            .cmp(&b.node.order)
            .then_with(|| a.node.name.cmp(&b.node.name))
            .then_with(|| a.node.id.cmp(&b.node.id))
    });
}
