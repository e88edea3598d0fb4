//! Plain-text renderings of the read models, for terminals and logs.

use taxon_core::path::Breadcrumb;
use taxon_core::reconcile::CountDrift;
use taxon_core::tree::{TaxonomyTree, TaxonomyTreeNode};

const BRANCH: &str = "├── ";
const LAST: &str = "└── ";
const PIPE: &str = "│   ";
const GAP: &str = "    ";

fn label(node: &TaxonomyTreeNode, show_counts: bool) -> String {
    let n = &node.node;
    if show_counts {
        format!("{} [{}] ({}, {})", n.name, n.slug, n.status, n.content_count)
    } else {
        format!("{} [{}] ({})", n.name, n.slug, n.status)
    }
}

fn render_children(
    children: &[TaxonomyTreeNode],
    prefix: &str,
    show_counts: bool,
    out: &mut String,
) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        out.push_str(prefix);
        out.push_str(if last { LAST } else { BRANCH });
        out.push_str(&label(child, show_counts));
        out.push('\n');
        let next = format!("{}{}", prefix, if last { GAP } else { PIPE });
        render_children(&child.children, &next, show_counts, out);
    }
}

/// Box-drawing outline of the forest, one node per line, roots flush left.
pub fn render_tree(tree: &TaxonomyTree, show_counts: bool) -> String {
    let mut out = String::new();
    for root in &tree.roots {
        out.push_str(&label(root, show_counts));
        out.push('\n');
        render_children(&root.children, "", show_counts, &mut out);
    }
    out
}

pub fn render_breadcrumbs(crumbs: &[Breadcrumb]) -> String {
    crumbs
        .iter()
        .map(|c| c.label.as_str())
        .collect::<Vec<_>>()
        .join(" › ")
}

pub fn render_drift(drift: &[CountDrift]) -> String {
    drift
        .iter()
        .map(|d| format!("{} {}: stored {} actual {}\n", d.kind, d.id, d.stored, d.actual))
        .collect()
}
