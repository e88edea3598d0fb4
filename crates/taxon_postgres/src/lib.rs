//! taxon_postgres — PostgreSQL adapter for the taxonomy ports.

mod errors;
mod sqlx_types;
pub mod store;

use sqlx::PgPool;
use taxon_core::Result;

pub use store::{PgTaxonomyStore, PgTaxonomyTx};

/// Schema for `taxonomy` and `taxonomy_relationship`. Idempotent.
pub const MIGRATION_SQL: &str = include_str!("../migrations/0001_taxonomy.sql");

/// Apply [`MIGRATION_SQL`] to `pool`.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(MIGRATION_SQL)
        .execute(pool)
        .await
        .map_err(errors::map_sqlx)?;
    tracing::info!("taxonomy schema applied");
    Ok(())
}
