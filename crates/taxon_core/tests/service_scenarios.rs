//! End-to-end service scenarios against the in-memory store.

use std::sync::Arc;

use taxon_core::ledger;
use taxon_core::memory::MemoryTaxonomyStore;
use taxon_core::path::PathQuery;
use taxon_core::ports::TaxonomyStore;
use taxon_core::service::{
    remove_taxonomies_in, save_taxonomy_in, TaxonomyService, TaxonomyServiceImpl,
};
use taxon_core::subtree::SubtreeQuery;
use taxon_core::{
    ContentKind, ObjectId, StatusFilter, TaxonomyDraft, TaxonomyError, TaxonomyId, TaxonomyKind,
    TaxonomyStatus,
};

use TaxonomyStatus::{Private, Published, Trashed};

struct Fixture {
    store: MemoryTaxonomyStore,
    service: TaxonomyServiceImpl,
}

impl Fixture {
    fn new() -> Self {
        let store = MemoryTaxonomyStore::new();
        let service = TaxonomyServiceImpl::new(Arc::new(store.clone()));
        Self { store, service }
    }

    async fn create(
        &self,
        kind: TaxonomyKind,
        name: &str,
        parent: Option<&TaxonomyId>,
        status: TaxonomyStatus,
    ) -> TaxonomyId {
        let mut draft = TaxonomyDraft::new(kind, name, status);
        draft.parent_id = parent.cloned();
        self.service.save_taxonomy(draft).await.unwrap().node.id
    }

    async fn set_status(&self, id: &TaxonomyId, status: TaxonomyStatus) {
        let node = self.store.node(id).await.unwrap();
        let mut draft = TaxonomyDraft::from_node(&node);
        draft.status = status;
        self.service.save_taxonomy(draft).await.unwrap();
    }

    async fn status(&self, id: &TaxonomyId) -> TaxonomyStatus {
        self.store.node(id).await.unwrap().status
    }

    async fn count(&self, id: &TaxonomyId) -> i64 {
        self.store.node(id).await.unwrap().content_count
    }

    /// A(root) → B → C, all published.
    async fn abc(&self) -> (TaxonomyId, TaxonomyId, TaxonomyId) {
        let a = self.create(TaxonomyKind::Category, "A", None, Published).await;
        let b = self.create(TaxonomyKind::Category, "B", Some(&a), Published).await;
        let c = self.create(TaxonomyKind::Category, "C", Some(&b), Published).await;
        (a, b, c)
    }
}

fn object(id: &str) -> ObjectId {
    ObjectId::new(id).unwrap()
}

#[tokio::test]
async fn private_cascades_down_only() {
    let fx = Fixture::new();
    let (a, b, c) = fx.abc().await;

    fx.set_status(&b, Private).await;

    assert_eq!(fx.status(&a).await, Published);
    assert_eq!(fx.status(&b).await, Private);
    assert_eq!(fx.status(&c).await, Private);
}

#[tokio::test]
async fn publishing_leaf_promotes_ancestors() {
    let fx = Fixture::new();
    let (a, b, c) = fx.abc().await;
    fx.set_status(&b, Private).await;

    fx.set_status(&c, Published).await;

    assert_eq!(fx.status(&a).await, Published);
    assert_eq!(fx.status(&b).await, Published);
    assert_eq!(fx.status(&c).await, Published);
}

#[tokio::test]
async fn trashing_root_trashes_subtree_and_publishing_leaf_revives_chain() {
    let fx = Fixture::new();
    let (a, b, c) = fx.abc().await;

    fx.set_status(&a, Trashed).await;
    for id in [&a, &b, &c] {
        assert_eq!(fx.status(id).await, Trashed);
    }

    fx.set_status(&c, Published).await;
    for id in [&a, &b, &c] {
        assert_eq!(fx.status(id).await, Published);
    }
}

#[tokio::test]
async fn creating_published_child_under_trashed_parent_promotes_parent() {
    let fx = Fixture::new();
    let a = fx.create(TaxonomyKind::Category, "A", None, Trashed).await;
    let b = fx.create(TaxonomyKind::Category, "B", Some(&a), Published).await;
    assert_eq!(fx.status(&a).await, Published);
    assert_eq!(fx.status(&b).await, Published);
}

#[tokio::test]
async fn reparenting_under_private_node_promotes_it() {
    let fx = Fixture::new();
    let hidden = fx.create(TaxonomyKind::Category, "Hidden", None, Private).await;
    let leaf = fx.create(TaxonomyKind::Category, "Leaf", None, Published).await;

    let node = fx.store.node(&leaf).await.unwrap();
    let draft = TaxonomyDraft::from_node(&node).with_parent(hidden.clone());
    let outcome = fx.service.save_taxonomy(draft).await.unwrap();

    assert_eq!(outcome.cascade.promote, vec![hidden.clone()]);
    assert_eq!(fx.status(&hidden).await, Published);
}

#[tokio::test]
async fn reparenting_under_own_descendant_is_rejected_without_writes() {
    let fx = Fixture::new();
    let (a, _b, c) = fx.abc().await;
    let node = fx.store.node(&a).await.unwrap();
    let draft = TaxonomyDraft::from_node(&node).with_parent(c.clone());

    let err = fx.service.save_taxonomy(draft).await.unwrap_err();

    assert!(matches!(err, TaxonomyError::CycleDetected(_)));
    assert!(fx.store.node(&a).await.unwrap().parent_id.is_none());
}

#[tokio::test]
async fn tags_do_not_cascade() {
    let fx = Fixture::new();
    let rust = fx.create(TaxonomyKind::Tag, "rust", None, Published).await;
    let outcome = {
        let node = fx.store.node(&rust).await.unwrap();
        let mut draft = TaxonomyDraft::from_node(&node);
        draft.status = Trashed;
        fx.service.save_taxonomy(draft).await.unwrap()
    };
    assert!(outcome.cascade.is_empty());
    assert_eq!(outcome.previous_status, Some(Published));
}

#[tokio::test]
async fn duplicate_slug_rejected_within_kind_only() {
    let fx = Fixture::new();
    fx.create(TaxonomyKind::Category, "News", None, Published).await;
    let err = fx
        .service
        .save_taxonomy(TaxonomyDraft::new(TaxonomyKind::Category, "News", Published))
        .await
        .unwrap_err();
    assert!(matches!(err, TaxonomyError::Conflict(_)));

    fx.create(TaxonomyKind::Tag, "News", None, Published).await;
}

#[tokio::test]
async fn attach_then_replace_moves_count() {
    let fx = Fixture::new();
    let t1 = fx.create(TaxonomyKind::Category, "T1", None, Published).await;
    let t2 = fx.create(TaxonomyKind::Category, "T2", None, Published).await;
    let p1 = object("p1");

    fx.service
        .attach_content(ContentKind::Post, &p1, &[t1.clone()])
        .await
        .unwrap();
    assert_eq!(fx.count(&t1).await, 1);

    let diff = fx
        .service
        .replace_content_taxonomies(ContentKind::Post, &p1, &[t2.clone()])
        .await
        .unwrap();

    assert_eq!(diff.to_add, vec![t2.clone()]);
    assert_eq!(diff.to_remove, vec![t1.clone()]);
    assert_eq!(fx.count(&t1).await, 0);
    assert_eq!(fx.count(&t2).await, 1);
    let rels = fx.service.content_taxonomies(&p1).await.unwrap();
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].taxonomy_id, t2);
}

#[tokio::test]
async fn replace_keeps_unchanged_ids_untouched() {
    let fx = Fixture::new();
    let t1 = fx.create(TaxonomyKind::Category, "T1", None, Published).await;
    let t2 = fx.create(TaxonomyKind::Tag, "T2", None, Published).await;
    let p1 = object("p1");
    fx.service
        .attach_content(ContentKind::Post, &p1, &[t1.clone(), t2.clone()])
        .await
        .unwrap();

    let diff = fx
        .service
        .replace_content_taxonomies(ContentKind::Post, &p1, &[t2.clone(), t1.clone()])
        .await
        .unwrap();

    assert!(diff.is_empty());
    assert_eq!(fx.count(&t1).await, 1);
    assert_eq!(fx.count(&t2).await, 1);
}

#[tokio::test]
async fn attach_to_missing_taxonomy_rolls_back_everything() {
    let fx = Fixture::new();
    let t1 = fx.create(TaxonomyKind::Category, "T1", None, Published).await;
    let missing = TaxonomyId::parse("ffffffffffffffff").unwrap();

    let err = fx
        .service
        .attach_content(ContentKind::Post, &object("p1"), &[t1.clone(), missing])
        .await
        .unwrap_err();

    assert!(matches!(err, TaxonomyError::NotFound(_)));
    assert_eq!(fx.count(&t1).await, 0);
    assert!(fx.store.all_relationships().await.is_empty());
}

#[tokio::test]
async fn link_needs_exactly_one_link_category() {
    let fx = Fixture::new();
    let blogroll = fx.create(TaxonomyKind::LinkCategory, "Blogroll", None, Published).await;
    let friends = fx.create(TaxonomyKind::LinkCategory, "Friends", None, Published).await;
    let tag = fx.create(TaxonomyKind::Tag, "rust", None, Published).await;
    let l1 = object("l1");

    assert!(fx
        .service
        .replace_content_taxonomies(ContentKind::Link, &l1, &[])
        .await
        .is_err());
    assert!(fx
        .service
        .replace_content_taxonomies(ContentKind::Link, &l1, &[tag])
        .await
        .is_err());
    assert!(fx
        .service
        .replace_content_taxonomies(ContentKind::Link, &l1, &[blogroll.clone(), friends.clone()])
        .await
        .is_err());

    fx.service
        .replace_content_taxonomies(ContentKind::Link, &l1, &[blogroll.clone()])
        .await
        .unwrap();
    fx.service
        .replace_content_taxonomies(ContentKind::Link, &l1, &[friends.clone()])
        .await
        .unwrap();
    assert_eq!(fx.count(&blogroll).await, 0);
    assert_eq!(fx.count(&friends).await, 1);
}

#[tokio::test]
async fn attach_to_trashed_taxonomy_rejected() {
    let fx = Fixture::new();
    let old = fx.create(TaxonomyKind::Category, "Old", None, Trashed).await;
    let err = fx
        .service
        .attach_content(ContentKind::Post, &object("p1"), &[old])
        .await
        .unwrap_err();
    assert!(matches!(err, TaxonomyError::InvalidInput(_)));
}

#[tokio::test]
async fn existing_assignment_to_trashed_node_does_not_block_edits() {
    let fx = Fixture::new();
    let news = fx.create(TaxonomyKind::Category, "News", None, Published).await;
    let rust = fx.create(TaxonomyKind::Tag, "Rust", None, Published).await;
    let post = object("p1");
    fx.service
        .attach_content(ContentKind::Post, &post, &[news.clone()])
        .await
        .unwrap();
    // Status edits bypass the removal guard.
    fx.set_status(&news, Trashed).await;

    let attached = fx
        .service
        .attach_content(ContentKind::Post, &post, &[rust.clone()])
        .await
        .unwrap();
    assert_eq!(attached, vec![rust.clone()]);

    let err = fx
        .service
        .replace_content_taxonomies(ContentKind::Post, &object("p2"), &[news.clone()])
        .await
        .unwrap_err();
    assert!(matches!(err, TaxonomyError::InvalidInput(_)));
    assert_eq!(fx.count(&news).await, 1);
}

#[tokio::test]
async fn detach_content_clears_all_counts() {
    let fx = Fixture::new();
    let t1 = fx.create(TaxonomyKind::Category, "T1", None, Published).await;
    let t2 = fx.create(TaxonomyKind::Tag, "T2", None, Published).await;
    let p1 = object("p1");
    let p2 = object("p2");
    fx.service
        .attach_content(ContentKind::Post, &p1, &[t1.clone(), t2.clone()])
        .await
        .unwrap();
    fx.service
        .attach_content(ContentKind::Post, &p2, &[t1.clone()])
        .await
        .unwrap();

    let detached = fx.service.detach_content(&p1).await.unwrap();

    assert_eq!(detached.len(), 2);
    assert_eq!(fx.count(&t1).await, 1);
    assert_eq!(fx.count(&t2).await, 0);
}

#[tokio::test]
async fn remove_refused_when_descendant_has_content() {
    let fx = Fixture::new();
    let (a, b, c) = fx.abc().await;
    fx.service
        .attach_content(ContentKind::Post, &object("p1"), &[c.clone()])
        .await
        .unwrap();

    let err = fx
        .service
        .remove_taxonomies(TaxonomyKind::Category, &[b.clone()])
        .await
        .unwrap_err();

    match err {
        TaxonomyError::HasRelatedContent { count, ids } => {
            assert_eq!(count, 1);
            assert_eq!(ids, vec![b.clone()]);
        }
        other => panic!("expected HasRelatedContent, got {other:?}"),
    }
    for id in [&a, &b, &c] {
        assert_eq!(fx.status(id).await, Published);
    }
}

#[tokio::test]
async fn guard_ignores_stale_counter() {
    let fx = Fixture::new();
    let (_a, b, c) = fx.abc().await;
    fx.service
        .attach_content(ContentKind::Post, &object("p1"), &[c.clone()])
        .await
        .unwrap();
    fx.store.corrupt_count(&c, 0).await;

    let err = fx
        .service
        .remove_taxonomies(TaxonomyKind::Category, &[b])
        .await
        .unwrap_err();
    assert!(matches!(err, TaxonomyError::HasRelatedContent { .. }));
}

#[tokio::test]
async fn remove_twice_is_idempotent() {
    let fx = Fixture::new();
    let (a, b, c) = fx.abc().await;

    let first = fx
        .service
        .remove_taxonomies(TaxonomyKind::Category, &[a.clone()])
        .await
        .unwrap();
    let second = fx
        .service
        .remove_taxonomies(TaxonomyKind::Category, &[a.clone()])
        .await
        .unwrap();

    assert_eq!(first.changed_rows, 3);
    assert_eq!(second.changed_rows, 0);
    assert_eq!(second.affected.len(), 3);
    for id in [&a, &b, &c] {
        assert_eq!(fx.status(id).await, Trashed);
    }
}

#[tokio::test]
async fn remove_unknown_id_is_not_found() {
    let fx = Fixture::new();
    fx.abc().await;
    let err = fx
        .service
        .remove_taxonomies(
            TaxonomyKind::Category,
            &[TaxonomyId::parse("0123456789abcdef").unwrap()],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TaxonomyError::NotFound(_)));
}

#[tokio::test]
async fn restore_returns_subtree_and_ancestors_to_private() {
    let fx = Fixture::new();
    let (a, b, c) = fx.abc().await;
    fx.service
        .remove_taxonomies(TaxonomyKind::Category, &[a.clone()])
        .await
        .unwrap();

    let outcome = fx
        .service
        .restore_taxonomies(TaxonomyKind::Category, &[b.clone()])
        .await
        .unwrap();

    assert_eq!(outcome.changed_rows, 3);
    for id in [&a, &b, &c] {
        assert_eq!(fx.status(id).await, Private);
    }
}

#[tokio::test]
async fn purge_requires_trashed_and_unreferenced() {
    let fx = Fixture::new();
    let (a, b, c) = fx.abc().await;

    let err = fx
        .service
        .purge_taxonomies(TaxonomyKind::Category, &[b.clone()])
        .await
        .unwrap_err();
    assert!(matches!(err, TaxonomyError::InvalidInput(_)));

    fx.service
        .remove_taxonomies(TaxonomyKind::Category, &[b.clone()])
        .await
        .unwrap();
    let deleted = fx
        .service
        .purge_taxonomies(TaxonomyKind::Category, &[b.clone()])
        .await
        .unwrap();

    assert_eq!(deleted, 2);
    assert!(fx.store.node(&b).await.is_none());
    assert!(fx.store.node(&c).await.is_none());
    assert_eq!(fx.status(&a).await, Published);
}

#[tokio::test]
async fn read_models_respect_status_filter() {
    let fx = Fixture::new();
    let (a, b, c) = fx.abc().await;
    fx.set_status(&b, Private).await;

    let public = fx
        .service
        .get_tree(TaxonomyKind::Category, &StatusFilter::published_only())
        .await
        .unwrap();
    assert_eq!(public.len(), 1);

    let admin = fx
        .service
        .get_tree(TaxonomyKind::Category, &StatusFilter::visible())
        .await
        .unwrap();
    assert_eq!(admin.len(), 3);

    let ids = fx
        .service
        .get_subtree_ids(
            TaxonomyKind::Category,
            &StatusFilter::visible(),
            &SubtreeQuery::Id(a.clone()),
            true,
        )
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);

    let crumbs = fx
        .service
        .get_path(
            TaxonomyKind::Category,
            &StatusFilter::visible(),
            &PathQuery::Id(c.clone()),
        )
        .await
        .unwrap();
    let labels: Vec<_> = crumbs.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["A", "B", "C"]);
    assert!(crumbs[2].is_header);
    assert_eq!(crumbs[0].url, "/category/a");
}

#[tokio::test]
async fn reconcile_repairs_drift() {
    let fx = Fixture::new();
    let t1 = fx.create(TaxonomyKind::Tag, "T1", None, Published).await;
    fx.service
        .attach_content(ContentKind::Post, &object("p1"), &[t1.clone()])
        .await
        .unwrap();
    fx.store.corrupt_count(&t1, 9).await;

    let drift = fx.service.verify_counts(None).await.unwrap();
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].stored, 9);
    assert_eq!(drift[0].actual, 1);

    let report = fx
        .service
        .recompute_counts(Some(TaxonomyKind::Tag))
        .await
        .unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.corrected.len(), 1);
    assert_eq!(fx.count(&t1).await, 1);

    let again = fx.service.recompute_counts(None).await.unwrap();
    assert!(again.corrected.is_empty());
}

#[tokio::test]
async fn save_and_attach_share_one_transaction() {
    let fx = Fixture::new();
    let (a, _, _) = fx.abc().await;
    fx.set_status(&a, Private).await;
    let post = object("p1");

    // Rolled back: neither the new node, the promotion, nor the ledger row lands.
    let mut tx = fx.store.begin().await.unwrap();
    let draft = TaxonomyDraft::new(TaxonomyKind::Category, "D", Published).with_parent(a.clone());
    let d = save_taxonomy_in(tx.as_mut(), draft).await.unwrap().node.id;
    ledger::attach(tx.as_mut(), ContentKind::Post, &post, &[d.clone()])
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    assert!(fx.store.node(&d).await.is_none());
    assert_eq!(fx.status(&a).await, Private);
    assert!(fx.store.all_relationships().await.is_empty());

    // Committed: both land together.
    let mut tx = fx.store.begin().await.unwrap();
    let draft = TaxonomyDraft::new(TaxonomyKind::Category, "D", Published).with_parent(a.clone());
    let d = save_taxonomy_in(tx.as_mut(), draft).await.unwrap().node.id;
    ledger::attach(tx.as_mut(), ContentKind::Post, &post, &[d.clone()])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(fx.status(&a).await, Published);
    assert_eq!(fx.count(&d).await, 1);
}

#[tokio::test]
async fn remove_inside_caller_transaction_sees_its_ledger_writes() {
    let fx = Fixture::new();
    let (a, _, c) = fx.abc().await;
    let post = object("p1");

    let mut tx = fx.store.begin().await.unwrap();
    ledger::attach(tx.as_mut(), ContentKind::Post, &post, &[c.clone()])
        .await
        .unwrap();
    let err = remove_taxonomies_in(tx.as_mut(), TaxonomyKind::Category, &[a.clone()])
        .await
        .unwrap_err();
    assert!(matches!(err, TaxonomyError::HasRelatedContent { count: 1, .. }));
    drop(tx);

    assert_eq!(fx.status(&a).await, Published);
    assert_eq!(fx.count(&c).await, 0);
}

#[tokio::test]
async fn verify_counts_reads_without_row_locks() {
    let fx = Fixture::new();
    let (_, _, c) = fx.abc().await;
    let locks_after_setup = fx.store.locked_reads();
    fx.store.corrupt_count(&c, 5).await;

    let drift = fx.service.verify_counts(None).await.unwrap();

    assert_eq!(drift.len(), 1);
    assert_eq!(fx.store.locked_reads(), locks_after_setup);
    assert_eq!(fx.count(&c).await, 5);
}
