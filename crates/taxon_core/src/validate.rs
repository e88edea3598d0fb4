//! Draft validation. Runs against the locked snapshot before any write.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Result, TaxonomyError};
use crate::subtree::{select_descendants, SubtreeQuery};
use crate::tree::TaxonomyTree;
use crate::types::{TaxonomyDraft, TaxonomyId, TaxonomyNode};

pub const MAX_NAME_CHARS: usize = 200;
pub const MAX_SLUG_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Lowercase ASCII slug. Accents are stripped, other runs collapse to `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(MAX_SLUG_CHARS);
    slug.trim_end_matches('-').to_string()
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() {
        return Err(TaxonomyError::InvalidInput("slug is empty".into()));
    }
    if slug.chars().count() > MAX_SLUG_CHARS {
        return Err(TaxonomyError::InvalidInput(format!(
            "slug exceeds {} characters",
            MAX_SLUG_CHARS
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(TaxonomyError::InvalidInput(format!(
            "slug {:?} may only contain a-z, 0-9 and '-'",
            slug
        )));
    }
    Ok(())
}

/// Check a draft against every row of its kind and produce the row to write.
///
/// `rows` must be the unfiltered snapshot of `draft.kind`; `existing` is the
/// stored row when updating. `new_id` is used only for creates.
pub fn prepare_node(
    draft: &TaxonomyDraft,
    rows: &[TaxonomyNode],
    existing: Option<&TaxonomyNode>,
    new_id: TaxonomyId,
) -> Result<TaxonomyNode> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(TaxonomyError::InvalidInput("name is empty".into()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(TaxonomyError::InvalidInput(format!(
            "name exceeds {} characters",
            MAX_NAME_CHARS
        )));
    }
    if draft.description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(TaxonomyError::InvalidInput(format!(
            "description exceeds {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }

    if let Some(existing) = existing {
        if existing.kind != draft.kind {
            return Err(TaxonomyError::InvalidInput(format!(
                "cannot change kind of {} from {} to {}",
                existing.id, existing.kind, draft.kind
            )));
        }
    }
    let id = existing.map(|e| e.id.clone()).unwrap_or(new_id);

    let slug = if draft.slug.trim().is_empty() {
        slugify(name)
    } else {
        draft.slug.trim().to_string()
    };
    validate_slug(&slug)?;
    if let Some(clash) = rows.iter().find(|r| r.slug == slug && r.id != id) {
        return Err(TaxonomyError::Conflict(format!(
            "{} slug {:?} already used by {}",
            draft.kind, slug, clash.id
        )));
    }

    if let Some(parent_id) = &draft.parent_id {
        if !draft.kind.allows_parent() {
            return Err(TaxonomyError::InvalidInput(format!(
                "{} nodes cannot have a parent",
                draft.kind
            )));
        }
        if parent_id == &id {
            return Err(TaxonomyError::CycleDetected(format!("{} cannot be its own parent", id)));
        }
        let parent = rows.iter().find(|r| &r.id == parent_id).ok_or_else(|| {
            TaxonomyError::InvalidInput(format!("parent {} does not exist", parent_id))
        })?;
        if parent.kind != draft.kind {
            return Err(TaxonomyError::InvalidInput(format!(
                "parent {} is a {}, expected {}",
                parent_id, parent.kind, draft.kind
            )));
        }
        if existing.is_some() {
            let tree = TaxonomyTree::build(rows);
            let descendants = select_descendants(&tree, &SubtreeQuery::Id(id.clone()), false);
            if descendants.contains(parent_id) {
                return Err(TaxonomyError::CycleDetected(format!(
                    "parent {} is a descendant of {}",
                    parent_id, id
                )));
            }
        }
    }

    Ok(TaxonomyNode {
        id,
        kind: draft.kind,
        name: name.to_string(),
        slug,
        description: draft.description.clone(),
        parent_id: draft.parent_id.clone(),
        order: draft.order,
        status: draft.status,
        content_count: existing.map(|e| e.content_count).unwrap_or(0),
    })
}
