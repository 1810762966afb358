//! Integration test: admission and revision properties over ranges of
//! inputs rather than single examples.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use quill_chain::{Rule, ValidationConfig};
use quill_engine::{EngineError, QuillEngine};
use quill_integration_tests::TestNetwork;
use quill_store::{ContentStore, FileStore, MemoryStore};
use quill_types::{EntryHash, EntryType};

fn rule_of(err: &EngineError) -> Option<Rule> {
    err.validation().map(|v| v.rule)
}

/// Content below the maximum is admitted; at or above it is rejected.
#[tokio::test]
async fn test_content_length_boundary() {
    const MAX: usize = 12;
    let config = ValidationConfig::default()
        .with_content_limit(EntryType::Comment, MAX)
        .with_content_limit(EntryType::Post, MAX * 2);
    let net = TestNetwork::with_validation(1, &config);
    let blog = net.blog(0);

    let p = blog.create_post("t", "short").await.unwrap();
    for len in 0..=MAX + 3 {
        net.tick();
        let text = "x".repeat(len);
        let result = blog.create_comment(p.hash(), &text).await;
        if len < MAX {
            assert!(result.is_ok(), "length {len} should be admitted");
        } else {
            let err = result.unwrap_err();
            assert_eq!(rule_of(&err), Some(Rule::ContentLength), "length {len}");
        }
    }

    // Characters, not bytes: twelve two-byte characters are still twelve.
    net.tick();
    let err = blog
        .create_comment(p.hash(), &"é".repeat(MAX))
        .await
        .unwrap_err();
    assert_eq!(rule_of(&err), Some(Rule::ContentLength));
    net.tick();
    blog.create_comment(p.hash(), &"é".repeat(MAX - 1))
        .await
        .unwrap();

    // Limits are per entry type.
    net.tick();
    blog.create_post("t", &"x".repeat(MAX * 2 - 1)).await.unwrap();
}

/// Nobody may update or delete a record another author created.
#[tokio::test]
async fn test_ownership_across_authors() {
    let net = TestNetwork::new(3);
    let alice = net.blog(0);

    let p = alice.create_post("t", "alice's post").await.unwrap();
    net.tick();
    let c = alice.create_comment(p.hash(), "alice's comment").await.unwrap();
    net.tick();
    let c2 = alice.update_comment(c.hash(), "edited").await.unwrap();
    net.sync().await.unwrap();

    for other in 1..3 {
        net.tick();
        let blog = net.blog(other);

        for target in [c.hash(), c2.hash()] {
            let err = blog.update_comment(target, "hijacked").await.unwrap_err();
            assert_eq!(rule_of(&err), Some(Rule::Ownership), "update by {other}");

            let err = blog.delete_comment(target).await.unwrap_err();
            assert_eq!(rule_of(&err), Some(Rule::Ownership), "delete by {other}");

            let err = net.node(other).delete_entry(target).await.unwrap_err();
            assert_eq!(rule_of(&err), Some(Rule::Ownership), "raw delete by {other}");
        }

        let err = blog
            .update_post(p.hash(), p.hash(), "t", "hijacked")
            .await
            .unwrap_err();
        assert_eq!(rule_of(&err), Some(Rule::Ownership));
        let err = blog.delete_post(p.hash()).await.unwrap_err();
        assert_eq!(rule_of(&err), Some(Rule::Ownership));
    }

    // Alice's indexes are untouched by the failed attempts.
    net.sync().await.unwrap();
    assert_eq!(alice.get_comments_for_post(p.hash()).await.unwrap().len(), 1);
    assert_eq!(alice.get_all_posts().await.unwrap().len(), 1);
    assert!(alice.get_all_deletes_for_comment(c.hash()).await.unwrap().is_empty());
}

/// For several limits N, the N-th creation in the window passes and the
/// (N+1)-th fails.
#[tokio::test]
async fn test_rate_limit_for_various_limits() {
    let window = Duration::from_secs(60);
    for max in 1..=4u32 {
        let config = ValidationConfig::default().with_rate_limit(EntryType::Post, max, window);
        let net = TestNetwork::with_validation(1, &config);
        let blog = net.blog(0);

        for n in 0..max {
            blog.create_post("t", &format!("post {n}"))
                .await
                .unwrap_or_else(|e| panic!("post {n} of {max} rejected: {e}"));
            net.tick();
        }
        let err = blog.create_post("t", "one too many").await.unwrap_err();
        assert_eq!(rule_of(&err), Some(Rule::RateLimit), "limit {max}");

        // Updates are not creations and are not counted.
        let first = blog.get_all_posts().await.unwrap()[0].target;
        let first = first.as_action().unwrap();
        blog.update_post(first, first, "t", "edited").await.unwrap();

        net.advance(window);
        blog.create_post("t", "after the window").await.unwrap();
    }
}

/// Walking `latest` from the original lands on the K-th revision after K
/// updates, and `all_revisions` lists all K + 1 in order.
#[tokio::test]
async fn test_latest_matches_last_revision() {
    for k in 0..5 {
        let net = TestNetwork::new(1);
        let blog = net.blog(0);
        let node = net.node(0);

        let p = blog.create_post("t", "post").await.unwrap();
        net.tick();
        let original = blog.create_comment(p.hash(), "rev 0").await.unwrap();

        let mut previous = original.hash();
        for rev in 1..=k {
            net.tick();
            previous = blog
                .update_comment(previous, &format!("rev {rev}"))
                .await
                .unwrap()
                .hash();
        }

        let revisions = node.get_all_revisions(original.hash()).await.unwrap();
        assert_eq!(revisions.len(), k + 1);
        assert_eq!(revisions[0].hash(), original.hash());

        let latest = node
            .get_latest(revisions[0].hash(), false)
            .await
            .unwrap();
        assert_eq!(latest, revisions[k], "after {k} updates");
        assert_eq!(latest.hash(), previous);
    }
}

async fn check_idempotent(store: Arc<dyn ContentStore>) {
    let data = Bytes::from_static(b"identical entry bytes");

    let first = store.put(data.clone()).await.unwrap();
    let before = store.usage().await.unwrap();
    let second = store.put(data.clone()).await.unwrap();
    let after = store.usage().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first, EntryHash::from_data(&data));
    assert_eq!(before, after, "second put must not store anything");
    assert_eq!(after.blobs, 1);
    assert_eq!(store.get(first).await.unwrap(), Some(data));
}

/// Storing identical bytes twice yields one hash and one copy.
#[tokio::test]
async fn test_content_store_idempotence() {
    check_idempotent(Arc::new(MemoryStore::new())).await;

    let dir = tempfile::tempdir().unwrap();
    check_idempotent(Arc::new(FileStore::new(dir.path()).unwrap())).await;
}

/// Two authors writing the same entry share one stored blob.
#[tokio::test]
async fn test_identical_entries_share_a_blob() {
    let net = TestNetwork::new(1);
    let blog = net.blog(0);

    let a = blog.create_post("same", "same").await.unwrap();
    net.tick();
    let b = blog.create_post("same", "same").await.unwrap();

    assert_ne!(a.hash(), b.hash(), "distinct actions");
    assert_eq!(
        a.action.kind().entry_hash(),
        b.action.kind().entry_hash(),
        "one entry"
    );
}
