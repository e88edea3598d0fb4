use thiserror::Error;

use crate::types::TaxonomyId;

pub type Result<T> = std::result::Result<T, TaxonomyError>;

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("cycle detected: {0}")]
    CycleDetected(String),

    /// Removal refused because ledger rows still reference the subtree.
    /// Never retryable without the caller re-categorising content first.
    #[error("{count} content relationship(s) still reference taxonomy subtree of {}", format_ids(.ids))]
    HasRelatedContent { count: i64, ids: Vec<TaxonomyId> },

    /// Deadlock, lock timeout, serialization failure, lost connection.
    /// The transaction was rolled back; retrying as-is is safe.
    #[error("transient store failure: {0}")]
    Transient(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl TaxonomyError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidInput(_) => 400,
            Self::Conflict(_) => 409,
            Self::CycleDetected(_) => 409,
            Self::HasRelatedContent { .. } => 409,
            Self::Transient(_) => 503,
            Self::Internal(_) => 500,
        }
    }

    /// Only store-level transient failures are safe to retry without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Validation-class failures the user can correct by editing the input.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::InvalidInput(_) | Self::Conflict(_) | Self::CycleDetected(_)
        )
    }
}

fn format_ids(ids: &[TaxonomyId]) -> String {
    ids.iter()
        .map(TaxonomyId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
