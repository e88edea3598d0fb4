//! Breadcrumb resolution: walk from a node up to its root.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::TaxonomyConfig;
use crate::types::{TaxonomyId, TaxonomyNode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub id: TaxonomyId,
    pub label: String,
    pub tooltip: String,
    pub slug: String,
    pub url: String,
    /// True only for the node the path was resolved for.
    pub is_header: bool,
}

/// Which node to resolve a path for. `Slug` is looked up first to find the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathQuery {
    Id(TaxonomyId),
    Slug(String),
}

/// Resolve the root-to-node breadcrumb trail over a flat snapshot.
///
/// Stops at the first missing id or on revisiting a node, returning what was
/// resolved so far. When ids repeat in the snapshot, the first row wins.
pub fn resolve_path(
    rows: &[TaxonomyNode],
    query: &PathQuery,
    config: &TaxonomyConfig,
) -> Vec<Breadcrumb> {
    let start = match query {
        PathQuery::Id(id) => Some(id.clone()),
        PathQuery::Slug(slug) => rows.iter().find(|r| &r.slug == slug).map(|r| r.id.clone()),
    };

    let mut crumbs = Vec::new();
    let mut visited: HashSet<TaxonomyId> = HashSet::new();
    let mut cursor = start;
    while let Some(id) = cursor {
        if !visited.insert(id.clone()) {
            tracing::warn!(id = %id, "taxonomy parent cycle while resolving path");
            break;
        }
        let Some(node) = rows.iter().find(|r| r.id == id) else {
            break;
        };
        crumbs.push(Breadcrumb {
            id: node.id.clone(),
            label: node.name.clone(),
            tooltip: if node.description.trim().is_empty() {
                node.name.clone()
            } else {
                node.description.clone()
            },
            slug: node.slug.clone(),
            url: config.url_for(node.kind, &node.slug),
            is_header: crumbs.is_empty(),
        });
        cursor = node.parent_id.clone();
    }
    crumbs.reverse();
    crumbs
}

/// Ancestor ids of `id`, nearest first. Cycle-safe.
pub fn ancestor_ids(rows: &[TaxonomyNode], id: &TaxonomyId) -> Vec<TaxonomyId> {
    let mut out = Vec::new();
    let mut visited: HashSet<&TaxonomyId> = HashSet::from([id]);
    let mut cursor = rows
        .iter()
        .find(|r| &r.id == id)
        .and_then(|r| r.parent_id.as_ref());
    while let Some(parent) = cursor {
        if !visited.insert(parent) {
            break;
        }
        let Some(node) = rows.iter().find(|r| &r.id == parent) else {
            break;
        };
        out.push(node.id.clone());
        cursor = node.parent_id.as_ref();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::{row, tid};
    use crate::types::TaxonomyStatus;

    fn chain() -> Vec<TaxonomyNode> {
        vec![
            row(3, Some(2), TaxonomyStatus::Published),
            row(1, None, TaxonomyStatus::Published),
            row(2, Some(1), TaxonomyStatus::Published),
        ]
    }

    #[test]
    fn path_runs_root_to_node() {
        let crumbs = resolve_path(&chain(), &PathQuery::Id(tid(3)), &TaxonomyConfig::default());
        let ids: Vec<_> = crumbs.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![tid(1), tid(2), tid(3)]);
        assert_eq!(
            crumbs.iter().map(|c| c.is_header).collect::<Vec<_>>(),
            vec![false, false, true]
        );
        assert_eq!(crumbs[2].url, "/category/node-3");
        assert_eq!(crumbs[2].tooltip, "node-3");
    }

    #[test]
    fn slug_lookup() {
        let crumbs = resolve_path(
            &chain(),
            &PathQuery::Slug("node-2".into()),
            &TaxonomyConfig::default(),
        );
        assert_eq!(crumbs.len(), 2);
        assert_eq!(crumbs.last().unwrap().slug, "node-2");
    }

    #[test]
    fn unknown_node_yields_empty_path() {
        let crumbs = resolve_path(&chain(), &PathQuery::Id(tid(42)), &TaxonomyConfig::default());
        assert!(crumbs.is_empty());
        let crumbs = resolve_path(
            &chain(),
            &PathQuery::Slug("missing".into()),
            &TaxonomyConfig::default(),
        );
        assert!(crumbs.is_empty());
    }

    #[test]
    fn missing_parent_stops_walk() {
        let rows = vec![row(5, Some(99), TaxonomyStatus::Published)];
        let crumbs = resolve_path(&rows, &PathQuery::Id(tid(5)), &TaxonomyConfig::default());
        assert_eq!(crumbs.len(), 1);
        assert!(crumbs[0].is_header);
    }

    #[test]
    fn cycle_terminates() {
        let rows = vec![
            row(1, Some(2), TaxonomyStatus::Published),
            row(2, Some(1), TaxonomyStatus::Published),
        ];
        let crumbs = resolve_path(&rows, &PathQuery::Id(tid(1)), &TaxonomyConfig::default());
        assert_eq!(crumbs.len(), 2);
        assert_eq!(ancestor_ids(&rows, &tid(1)), vec![tid(2)]);
    }

    #[test]
    fn description_used_as_tooltip() {
        let mut rows = chain();
        rows[1].description = "Top level".into();
        let crumbs = resolve_path(&rows, &PathQuery::Id(tid(2)), &TaxonomyConfig::default());
        assert_eq!(crumbs[0].tooltip, "Top level");
    }

    #[test]
    fn ancestors_nearest_first() {
        assert_eq!(ancestor_ids(&chain(), &tid(3)), vec![tid(2), tid(1)]);
        assert!(ancestor_ids(&chain(), &tid(1)).is_empty());
    }
}
