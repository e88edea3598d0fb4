//! taxon — hierarchical taxonomy consistency engine.
//!
//! The engine itself lives in `taxon_core` (pure logic behind port traits)
//! and `taxon_postgres` (the sqlx adapter, behind the `database` feature).
//! This crate re-exports both and adds the pieces the admin tool needs.

pub mod render;
pub mod settings;

pub use taxon_core::{
    cascade, config, error, ledger, memory, path, ports, reconcile, service, status_filter,
    subtree, tree, types, validate,
};
pub use taxon_core::{
    Audience, ContentKind, ObjectId, Relationship, Result, StatusFilter, TaxonomyDraft,
    TaxonomyError, TaxonomyId, TaxonomyKind, TaxonomyNode, TaxonomyStatus,
};

#[cfg(feature = "database")]
pub use taxon_postgres;
