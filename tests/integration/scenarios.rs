//! Integration test: the comment lifecycle end to end.
//!
//! Each scenario runs on a two-peer network. Alice writes, Bob reads after
//! a sync, so every assertion holds for the author and for a replica.

use std::time::Duration;

use quill_chain::{Rule, ValidationConfig};
use quill_engine::QuillEngine;
use quill_integration_tests::TestNetwork;
use quill_types::{Entry, EntryType, Linkable};

fn content_of(entry: &Option<Entry>) -> &str {
    entry.as_ref().map(|e| e.content()).unwrap_or_default()
}

/// Create post P, then comment C on it: P has exactly one live comment link.
#[tokio::test]
async fn test_scenario_a_comment_is_linked_from_post() {
    let net = TestNetwork::new(2);
    let alice = net.blog(0);

    let p = alice.create_post("Hello", "first post").await.unwrap();
    net.tick();
    let c = alice.create_comment(p.hash(), "nice post").await.unwrap();
    net.sync().await.unwrap();

    for i in 0..2 {
        let links = net.blog(i).get_comments_for_post(p.hash()).await.unwrap();
        assert_eq!(links.len(), 1, "peer {i} should see one comment");
        assert_eq!(links[0].target, Linkable::Action(c.hash()));
        assert_eq!(links[0].author, net.peer(0).agent());
    }
}

/// Update C twice: three revisions, and latest carries the second update.
#[tokio::test]
async fn test_scenario_b_two_updates() {
    let net = TestNetwork::new(2);
    let alice = net.blog(0);

    let p = alice.create_post("Hello", "post").await.unwrap();
    net.tick();
    let c = alice.create_comment(p.hash(), "v1").await.unwrap();
    net.tick();
    let r1 = alice.update_comment(c.hash(), "v2").await.unwrap();
    net.tick();
    let r2 = alice.update_comment(r1.hash(), "v3").await.unwrap();
    net.sync().await.unwrap();

    for i in 0..2 {
        let blog = net.blog(i);
        let revisions = blog.get_all_revisions_for_comment(c.hash()).await.unwrap();
        let hashes: Vec<_> = revisions.iter().map(|r| r.hash()).collect();
        assert_eq!(hashes, vec![c.hash(), r1.hash(), r2.hash()], "peer {i}");

        let latest = blog.get_latest_comment(c.hash()).await.unwrap();
        assert_eq!(latest.hash(), r2.hash());
        assert_eq!(content_of(&latest.entry), "v3");
    }
}

/// Delete C: no live links from P, one deleted link with one delete action.
#[tokio::test]
async fn test_scenario_c_delete_comment() {
    let net = TestNetwork::new(2);
    let alice = net.blog(0);

    let p = alice.create_post("Hello", "post").await.unwrap();
    net.tick();
    let c = alice.create_comment(p.hash(), "short-lived").await.unwrap();
    net.tick();
    alice.delete_comment(c.hash()).await.unwrap();
    net.sync().await.unwrap();

    for i in 0..2 {
        let blog = net.blog(i);
        assert!(
            blog.get_comments_for_post(p.hash()).await.unwrap().is_empty(),
            "peer {i} still lists the comment"
        );

        let deleted = blog.get_deleted_comments_for_post(p.hash()).await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].link.target, Linkable::Action(c.hash()));
        assert_eq!(deleted[0].deletes.len(), 1);

        let deleted = blog
            .get_deleted_comments_for_author(net.peer(0).agent())
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);

        let deletes = blog.get_all_deletes_for_comment(c.hash()).await.unwrap();
        assert_eq!(deletes.len(), 1);
        let err = blog.get_latest_comment(c.hash()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}

/// Three comments inside the window pass, a fourth fails, and after the
/// window has elapsed since the oldest a fourth succeeds.
#[tokio::test]
async fn test_scenario_d_rate_limit() {
    let window = Duration::from_secs(3_600);
    let config = ValidationConfig::default().with_rate_limit(EntryType::Comment, 3, window);
    let net = TestNetwork::with_validation(2, &config);
    let alice = net.blog(0);

    let p = alice.create_post("Hello", "post").await.unwrap();
    for n in 0..3 {
        net.tick();
        alice
            .create_comment(p.hash(), &format!("comment {n}"))
            .await
            .unwrap();
    }

    net.tick();
    let err = alice.create_comment(p.hash(), "too many").await.unwrap_err();
    assert_eq!(err.validation().map(|v| v.rule), Some(Rule::RateLimit));

    // The window is inclusive: the oldest comment (t = 1s) stops counting
    // once it is strictly older than now - window.
    net.advance(window - Duration::from_secs(2));
    alice.create_comment(p.hash(), "later").await.unwrap();

    // The limit is per author: Bob is unaffected by Alice's burst.
    net.sync().await.unwrap();
    for n in 0..3 {
        net.tick();
        net.blog(1)
            .create_comment(p.hash(), &format!("bob {n}"))
            .await
            .unwrap();
    }
    assert_eq!(
        net.blog(1)
            .get_comments_for_post(p.hash())
            .await
            .unwrap()
            .len(),
        7
    );
}

/// A rejected comment leaves no trace in either index.
#[tokio::test]
async fn test_rejected_comment_is_not_indexed() {
    let config = ValidationConfig::default().with_content_limit(EntryType::Comment, 10);
    let net = TestNetwork::with_validation(1, &config);
    let alice = net.blog(0);

    let p = alice.create_post("Hello", "post").await.unwrap();
    net.tick();
    let err = alice
        .create_comment(p.hash(), "far too long for this blog")
        .await
        .unwrap_err();
    assert_eq!(err.validation().map(|v| v.rule), Some(Rule::ContentLength));

    assert!(alice.get_comments_for_post(p.hash()).await.unwrap().is_empty());
    assert!(
        alice
            .get_comments_for_author(net.peer(0).agent())
            .await
            .unwrap()
            .is_empty()
    );
    let chain = net.node(0).agent_activity(net.peer(0).agent()).await.unwrap();
    assert_eq!(chain.len(), 2, "post and its all_posts link only");
}
