//! In-memory store implementing the port traits.
//!
//! Used by the test suites and by callers embedding the engine without a
//! database. A transaction works on a private copy of the tables; `commit`
//! publishes the copy if nothing else committed in between, otherwise it
//! fails with `Transient`, which mirrors a serialization failure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Result, TaxonomyError};
use crate::ports::{TaxonomyStore, TaxonomyTx};
use crate::status_filter::StatusFilter;
use crate::types::{ObjectId, Relationship, TaxonomyId, TaxonomyKind, TaxonomyNode, TaxonomyStatus};

#[derive(Debug, Clone, Default)]
struct Tables {
    nodes: Vec<TaxonomyNode>,
    relationships: Vec<Relationship>,
    version: u64,
}

#[derive(Clone, Default)]
pub struct MemoryTaxonomyStore {
    tables: Arc<Mutex<Tables>>,
    locked_reads: Arc<AtomicUsize>,
}

impl MemoryTaxonomyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows directly, bypassing validation. Test fixtures only.
    pub async fn seed(&self, nodes: Vec<TaxonomyNode>, relationships: Vec<Relationship>) {
        let mut tables = self.tables.lock().await;
        tables.nodes.extend(nodes);
        tables.relationships.extend(relationships);
        tables.version += 1;
    }

    pub async fn node(&self, id: &TaxonomyId) -> Option<TaxonomyNode> {
        let tables = self.tables.lock().await;
        tables.nodes.iter().find(|n| &n.id == id).cloned()
    }

    pub async fn all_nodes(&self) -> Vec<TaxonomyNode> {
        self.tables.lock().await.nodes.clone()
    }

    pub async fn all_relationships(&self) -> Vec<Relationship> {
        self.tables.lock().await.relationships.clone()
    }

    /// Number of row-locking reads issued by transactions on this store.
    pub fn locked_reads(&self) -> usize {
        self.locked_reads.load(Ordering::Relaxed)
    }

    /// Overwrite a stored counter, simulating drift from a direct data fix.
    pub async fn corrupt_count(&self, id: &TaxonomyId, count: i64) {
        let mut tables = self.tables.lock().await;
        if let Some(node) = tables.nodes.iter_mut().find(|n| &n.id == id) {
            node.content_count = count;
        }
        tables.version += 1;
    }
}

fn filtered(nodes: &[TaxonomyNode], kind: TaxonomyKind, filter: &StatusFilter) -> Vec<TaxonomyNode> {
    nodes
        .iter()
        .filter(|n| n.kind == kind && filter.allows(n.status))
        .cloned()
        .collect()
}

#[async_trait]
impl TaxonomyStore for MemoryTaxonomyStore {
    async fn fetch_rows(
        &self,
        kind: TaxonomyKind,
        filter: &StatusFilter,
    ) -> Result<Vec<TaxonomyNode>> {
        let tables = self.tables.lock().await;
        Ok(filtered(&tables.nodes, kind, filter))
    }

    async fn relationships_for_object(&self, object_id: &ObjectId) -> Result<Vec<Relationship>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .relationships
            .iter()
            .filter(|r| &r.object_id == object_id)
            .cloned()
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn TaxonomyTx>> {
        let working = self.tables.lock().await.clone();
        Ok(Box::new(MemoryTx {
            base_version: working.version,
            working,
            shared: Arc::clone(&self.tables),
            locked_reads: Arc::clone(&self.locked_reads),
        }))
    }
}

struct MemoryTx {
    working: Tables,
    base_version: u64,
    shared: Arc<Mutex<Tables>>,
    locked_reads: Arc<AtomicUsize>,
}

impl MemoryTx {
    fn node_mut(&mut self, id: &TaxonomyId) -> Result<&mut TaxonomyNode> {
        self.working
            .nodes
            .iter_mut()
            .find(|n| &n.id == id)
            .ok_or_else(|| TaxonomyError::NotFound(format!("taxonomy {}", id)))
    }
}

#[async_trait]
impl TaxonomyTx for MemoryTx {
    async fn read_rows(&mut self, kind: TaxonomyKind, filter: &StatusFilter) -> Result<Vec<TaxonomyNode>> {
        Ok(filtered(&self.working.nodes, kind, filter))
    }

    async fn fetch_rows_for_update(
        &mut self,
        kind: TaxonomyKind,
        filter: &StatusFilter,
    ) -> Result<Vec<TaxonomyNode>> {
        self.locked_reads.fetch_add(1, Ordering::Relaxed);
        Ok(filtered(&self.working.nodes, kind, filter))
    }

    async fn get_node(&mut self, id: &TaxonomyId) -> Result<Option<TaxonomyNode>> {
        Ok(self.working.nodes.iter().find(|n| &n.id == id).cloned())
    }

    async fn insert_node(&mut self, node: &TaxonomyNode) -> Result<()> {
        if self.working.nodes.iter().any(|n| n.id == node.id) {
            return Err(TaxonomyError::Conflict(format!("taxonomy {} already exists", node.id)));
        }
        if self
            .working
            .nodes
            .iter()
            .any(|n| n.kind == node.kind && n.slug == node.slug)
        {
            return Err(TaxonomyError::Conflict(format!(
                "{} slug {:?} already exists",
                node.kind, node.slug
            )));
        }
        self.working.nodes.push(node.clone());
        Ok(())
    }

    async fn update_node(&mut self, node: &TaxonomyNode) -> Result<()> {
        let stored = self.node_mut(&node.id)?;
        let count = stored.content_count;
        *stored = node.clone();
        stored.content_count = count;
        Ok(())
    }

    async fn set_status(&mut self, ids: &[TaxonomyId], status: TaxonomyStatus) -> Result<u64> {
        let mut changed = 0;
        for node in self.working.nodes.iter_mut().filter(|n| ids.contains(&n.id)) {
            if node.status != status {
                node.status = status;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete_nodes(&mut self, ids: &[TaxonomyId]) -> Result<u64> {
        if self
            .working
            .relationships
            .iter()
            .any(|r| ids.contains(&r.taxonomy_id))
        {
            return Err(TaxonomyError::Conflict(
                "ledger rows still reference deleted taxonomy".into(),
            ));
        }
        let before = self.working.nodes.len();
        self.working.nodes.retain(|n| !ids.contains(&n.id));
        Ok((before - self.working.nodes.len()) as u64)
    }

    async fn relationships_for_object(&mut self, object_id: &ObjectId) -> Result<Vec<Relationship>> {
        Ok(self
            .working
            .relationships
            .iter()
            .filter(|r| &r.object_id == object_id)
            .cloned()
            .collect())
    }

    async fn insert_relationship(&mut self, rel: &Relationship) -> Result<bool> {
        if !self.working.nodes.iter().any(|n| n.id == rel.taxonomy_id) {
            return Err(TaxonomyError::NotFound(format!("taxonomy {}", rel.taxonomy_id)));
        }
        let exists = self
            .working
            .relationships
            .iter()
            .any(|r| r.object_id == rel.object_id && r.taxonomy_id == rel.taxonomy_id);
        if exists {
            return Ok(false);
        }
        self.working.relationships.push(rel.clone());
        Ok(true)
    }

    async fn delete_relationship(
        &mut self,
        object_id: &ObjectId,
        taxonomy_id: &TaxonomyId,
    ) -> Result<bool> {
        let before = self.working.relationships.len();
        self.working
            .relationships
            .retain(|r| !(&r.object_id == object_id && &r.taxonomy_id == taxonomy_id));
        Ok(self.working.relationships.len() < before)
    }

    async fn count_relationships(&mut self, ids: &[TaxonomyId]) -> Result<i64> {
        Ok(self
            .working
            .relationships
            .iter()
            .filter(|r| ids.contains(&r.taxonomy_id))
            .count() as i64)
    }

    async fn relationship_counts(&mut self, kind: TaxonomyKind) -> Result<HashMap<TaxonomyId, i64>> {
        let mut counts = HashMap::new();
        for rel in &self.working.relationships {
            let of_kind = self
                .working
                .nodes
                .iter()
                .any(|n| n.id == rel.taxonomy_id && n.kind == kind);
            if of_kind {
                *counts.entry(rel.taxonomy_id.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn adjust_count(&mut self, id: &TaxonomyId, delta: i64) -> Result<()> {
        let node = self.node_mut(id)?;
        node.content_count = (node.content_count + delta).max(0);
        Ok(())
    }

    async fn recount(&mut self, id: &TaxonomyId) -> Result<i64> {
        let actual = self
            .working
            .relationships
            .iter()
            .filter(|r| &r.taxonomy_id == id)
            .count() as i64;
        self.node_mut(id)?.content_count = actual;
        Ok(actual)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx {
            mut working,
            base_version,
            shared,
            ..
        } = *self;
        let mut shared = shared.lock().await;
        if shared.version != base_version {
            return Err(TaxonomyError::Transient(
                "concurrent update detected, transaction rolled back".into(),
            ));
        }
        working.version = base_version + 1;
        *shared = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
