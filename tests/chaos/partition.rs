//! Chaos test: network partitions.
//!
//! A peer cut off from the network keeps writing to its own chain. Nothing
//! it writes is visible until it reconnects and republishes; after that
//! every peer converges on the same state, even when the late writes point
//! at records deleted in the meantime.

use quill_chain::Rule;
use quill_engine::QuillEngine;
use quill_integration_tests::TestNetwork;

#[tokio::test]
async fn test_partitioned_peer_catches_up() {
    let net = TestNetwork::new(3);

    let p = net.blog(0).create_post("t", "before the split").await.unwrap();
    net.sync().await.unwrap();

    net.set_online(2, false).await;

    // Both sides keep writing.
    net.tick();
    net.blog(0).create_comment(p.hash(), "from 0").await.unwrap();
    net.tick();
    let offline = net
        .blog(2)
        .create_comment(p.hash(), "from 2, offline")
        .await
        .unwrap();
    net.tick();
    let offline_post = net.blog(2).create_post("t", "written offline").await.unwrap();
    net.sync().await.unwrap();

    // The connected peers only see their side.
    for i in 0..2 {
        let comments = net.blog(i).get_comments_for_post(p.hash()).await.unwrap();
        assert_eq!(comments.len(), 1, "peer {i}");
        assert_eq!(net.blog(i).get_all_posts().await.unwrap().len(), 1);
    }
    // The offline peer sees its own writes but not peer 0's comment.
    assert_eq!(
        net.blog(2)
            .get_comments_for_post(p.hash())
            .await
            .unwrap()
            .len(),
        1
    );

    // Heal.
    net.set_online(2, true).await;
    net.node(2).republish().await.unwrap();
    net.sync().await.unwrap();

    for i in 0..3 {
        let blog = net.blog(i);
        assert_eq!(blog.get_comments_for_post(p.hash()).await.unwrap().len(), 2);
        assert_eq!(blog.get_all_posts().await.unwrap().len(), 2);
        assert_eq!(blog.get_comment(offline.hash()).await.unwrap(), offline);
        assert_eq!(blog.get_post(offline_post.hash()).await.unwrap(), offline_post);
        for author in 0..3 {
            assert_eq!(net.activity(i, author).await, net.activity(author, author).await);
        }
    }
}

#[tokio::test]
async fn test_offline_peer_cannot_reference_unseen_post() {
    let net = TestNetwork::new(2);
    net.set_online(1, false).await;

    let p = net.blog(0).create_post("t", "unseen").await.unwrap();
    net.settle().await;

    // The post cannot be fetched, so the comment fails validation rather
    // than the transport error leaking out.
    net.tick();
    let err = net
        .blog(1)
        .create_comment(p.hash(), "blind reply")
        .await
        .unwrap_err();
    assert_eq!(
        err.validation().map(|v| v.rule),
        Some(Rule::ReferentialIntegrity)
    );

    // Reads do surface the transport failure.
    let err = net.node(1).get_entry(p.hash()).await.unwrap_err();
    assert!(matches!(err, quill_engine::EngineError::Transport(_)));

    net.set_online(1, true).await;
    net.blog(1).create_comment(p.hash(), "reply").await.unwrap();
    assert_eq!(
        net.blog(1)
            .get_comments_for_post(p.hash())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_comment_racing_post_delete_converges() {
    let net = TestNetwork::new(3);

    let p = net.blog(0).create_post("t", "soon gone").await.unwrap();
    net.sync().await.unwrap();

    // Peer 1 replies while it still sees the post; the others learn of the
    // delete before the reply reaches them.
    net.set_online(1, false).await;
    net.tick();
    let reply = net.blog(1).create_comment(p.hash(), "too late?").await.unwrap();
    net.tick();
    net.blog(0).delete_post(p.hash()).await.unwrap();
    net.sync().await.unwrap();

    net.set_online(1, true).await;
    net.node(1).republish().await.unwrap();
    net.sync().await.unwrap();

    for i in 0..3 {
        assert_eq!(net.activity(i, 1).await, net.activity(1, 1).await, "peer {i}");
        assert_eq!(net.activity(i, 0).await, net.activity(0, 0).await, "peer {i}");
        let blog = net.blog(i);
        assert!(blog.get_all_posts().await.unwrap().is_empty());
        assert_eq!(blog.get_comment(reply.hash()).await.unwrap(), reply);
        assert_eq!(blog.get_comments_for_post(p.hash()).await.unwrap().len(), 1);
    }

    // Peer 1's chain keeps growing everywhere.
    net.tick();
    let next = net.blog(1).create_post("t", "after").await.unwrap();
    net.sync().await.unwrap();
    for i in 0..3 {
        assert_eq!(net.activity(i, 1).await, net.activity(1, 1).await, "peer {i}");
        assert_eq!(net.blog(i).get_post(next.hash()).await.unwrap(), next);
    }

    // A reply written after the delete is seen is still refused.
    let err = net
        .blog(2)
        .create_comment(p.hash(), "reply to nothing")
        .await
        .unwrap_err();
    assert_eq!(
        err.validation().map(|v| v.rule),
        Some(Rule::ReferentialIntegrity)
    );
}
