//! Count reconciliation: recompute `content_count` from the ledger.
//!
//! Idempotent. Only overwrites the derived counter, and `recount` computes the
//! new value inside the write statement, so it is safe next to live traffic.

use serde::Serialize;

use crate::error::Result;
use crate::ports::TaxonomyTx;
use crate::status_filter::StatusFilter;
use crate::types::{TaxonomyId, TaxonomyKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountDrift {
    pub id: TaxonomyId,
    pub kind: TaxonomyKind,
    pub stored: i64,
    pub actual: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub examined: usize,
    pub corrected: Vec<CountDrift>,
}

fn kinds(kind: Option<TaxonomyKind>) -> Vec<TaxonomyKind> {
    match kind {
        Some(k) => vec![k],
        None => TaxonomyKind::ALL.to_vec(),
    }
}

/// Non-trashed nodes whose stored count differs from the ledger.
/// Returns the drift list and the number of nodes examined. Reads without
/// row locks; only `recompute_counts` writes, and only the drifted rows.
pub async fn find_drift(
    tx: &mut dyn TaxonomyTx,
    kind: Option<TaxonomyKind>,
) -> Result<(Vec<CountDrift>, usize)> {
    let mut drift = Vec::new();
    let mut examined = 0;
    for kind in kinds(kind) {
        let rows = tx.read_rows(kind, &StatusFilter::visible()).await?;
        let counts = tx.relationship_counts(kind).await?;
        examined += rows.len();
        for row in rows {
            let actual = counts.get(&row.id).copied().unwrap_or(0);
            if row.content_count != actual {
                drift.push(CountDrift {
                    id: row.id,
                    kind,
                    stored: row.content_count,
                    actual,
                });
            }
        }
    }
    Ok((drift, examined))
}

pub async fn recompute_counts(
    tx: &mut dyn TaxonomyTx,
    kind: Option<TaxonomyKind>,
) -> Result<ReconcileReport> {
    let (drift, examined) = find_drift(tx, kind).await?;
    let mut corrected = Vec::with_capacity(drift.len());
    for mut d in drift {
        d.actual = tx.recount(&d.id).await?;
        tracing::warn!(id = %d.id, kind = %d.kind, stored = d.stored, actual = d.actual, "content count drift corrected");
        corrected.push(d);
    }
    Ok(ReconcileReport {
        examined,
        corrected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTaxonomyStore;
    use crate::ports::TaxonomyStore;
    use crate::tree::tests::{row, tid};
    use crate::types::{ObjectId, Relationship, TaxonomyStatus};

    async fn drifted_store() -> MemoryTaxonomyStore {
        let store = MemoryTaxonomyStore::new();
        let rel = Relationship {
            object_id: ObjectId::new("p1").unwrap(),
            taxonomy_id: tid(1),
            order: 0,
        };
        store
            .seed(
                vec![
                    row(1, None, TaxonomyStatus::Published),
                    row(2, None, TaxonomyStatus::Published),
                ],
                vec![rel],
            )
            .await;
        store
    }

    #[tokio::test]
    async fn find_drift_takes_no_row_locks() {
        let store = drifted_store().await;
        let mut tx = store.begin().await.unwrap();

        let (drift, examined) = find_drift(tx.as_mut(), Some(TaxonomyKind::Category)).await.unwrap();

        assert_eq!(examined, 2);
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].id, tid(1));
        assert_eq!((drift[0].stored, drift[0].actual), (0, 1));
        assert_eq!(store.locked_reads(), 0);
    }

    #[tokio::test]
    async fn recompute_writes_only_drifted_rows() {
        let store = drifted_store().await;
        let mut tx = store.begin().await.unwrap();

        let report = recompute_counts(tx.as_mut(), Some(TaxonomyKind::Category)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(report.corrected.len(), 1);
        assert_eq!(store.node(&tid(1)).await.unwrap().content_count, 1);
        assert_eq!(store.node(&tid(2)).await.unwrap().content_count, 0);
        assert_eq!(store.locked_reads(), 0);
    }
}
