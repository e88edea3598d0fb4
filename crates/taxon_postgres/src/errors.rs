//! sqlx error classification.

use anyhow::anyhow;
use taxon_core::TaxonomyError;

/// SQLSTATEs that mean "rolled back, try again": serialization failure,
/// deadlock, lock not available, statement timeout.
const TRANSIENT_SQLSTATES: [&str; 4] = ["40001", "40P01", "55P03", "57014"];
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

pub(crate) fn map_sqlx(err: sqlx::Error) -> TaxonomyError {
    match &err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
            if TRANSIENT_SQLSTATES.contains(&code.as_str()) {
                TaxonomyError::Transient(format!("{} ({})", db.message(), code))
            } else if code == UNIQUE_VIOLATION {
                TaxonomyError::Conflict(db.message().to_string())
            } else if code == FOREIGN_KEY_VIOLATION {
                TaxonomyError::Conflict(format!("still referenced: {}", db.message()))
            } else {
                TaxonomyError::Internal(anyhow!(err))
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            TaxonomyError::Transient(err.to_string())
        }
        sqlx::Error::RowNotFound => TaxonomyError::NotFound(err.to_string()),
        _ => TaxonomyError::Internal(anyhow!(err)),
    }
}
