//! taxon_core — hierarchical taxonomy consistency engine.
//!
//! Pure logic over a flat snapshot of taxonomy rows (categories, tags, link
//! categories) plus the port traits a storage adapter implements. The read
//! side builds a `TaxonomyTree` per request and derives breadcrumbs and
//! subtree id sets from it; the write side runs status cascades and ledger
//! updates inside one `TaxonomyTx`.

pub mod cascade;
pub mod config;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod path;
pub mod ports;
pub mod reconcile;
pub mod service;
pub mod status_filter;
pub mod subtree;
pub mod tree;
pub mod types;
pub mod validate;

pub use error::{Result, TaxonomyError};
pub use status_filter::{Audience, StatusFilter};
pub use types::{
    ContentKind, ObjectId, Relationship, TaxonomyDraft, TaxonomyId, TaxonomyKind, TaxonomyNode,
    TaxonomyStatus,
};
