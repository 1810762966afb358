//! Integration test: a node configured from a TOML file with the on-disk
//! backend keeps its chain, indexes and limits across restarts.

use std::sync::Arc;

use quill_chain::Rule;
use quill_engine::config::StorageBackend;
use quill_engine::{Blog, QuillConfig, QuillEngine, QuillNode, telemetry};
use quill_integration_tests::peer_key;
use quill_types::Linkable;

fn write_config(dir: &std::path::Path) -> std::path::PathBuf {
    let data_dir = dir.join("data");
    let config = format!(
        r#"
[storage]
backend = "fjall"
data_dir = '{}'

[[validation.content_length]]
entry_type = "comment"
max_chars = 40

[[validation.rate_limit]]
entry_type = "comment"
max_creates = 2
window = "1h"
"#,
        data_dir.display()
    );
    let path = dir.join("quill.toml");
    std::fs::write(&path, config).unwrap();
    path
}

fn open(config: &QuillConfig) -> Blog {
    let node = QuillNode::from_config(config, peer_key(1)).unwrap();
    Blog::new(Arc::new(node))
}

#[tokio::test]
async fn test_restart_restores_state() {
    let dir = tempfile::tempdir().unwrap();
    let config = QuillConfig::load(&write_config(dir.path())).unwrap();
    assert_eq!(config.storage.backend, StorageBackend::Fjall);
    telemetry::init(&config.log.level);

    let (post, comment, revision, chain) = {
        let blog = open(&config);
        let p = blog.create_post("Persisted", "on disk").await.unwrap();
        let c = blog.create_comment(p.hash(), "first").await.unwrap();
        let r = blog.update_comment(c.hash(), "first, edited").await.unwrap();
        let chain = blog
            .engine()
            .agent_activity(blog.engine().agent_id())
            .await
            .unwrap();
        (p, c, r, chain)
    };
    assert!(dir.path().join("data/chain").is_dir());
    assert!(dir.path().join("data/entries").is_dir());

    let blog = open(&config);
    let engine = blog.engine();

    assert_eq!(
        engine.agent_activity(engine.agent_id()).await.unwrap(),
        chain
    );
    assert_eq!(blog.get_post(post.hash()).await.unwrap(), post);
    assert_eq!(
        blog.get_latest_comment(comment.hash()).await.unwrap(),
        revision
    );

    let links = blog.get_comments_for_post(post.hash()).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].target, Linkable::Action(comment.hash()));

    // Limits from the file still apply, counted over the restored chain.
    let err = blog
        .create_comment(post.hash(), &"x".repeat(40))
        .await
        .unwrap_err();
    assert_eq!(err.validation().map(|v| v.rule), Some(Rule::ContentLength));

    blog.create_comment(post.hash(), "second").await.unwrap();
    let err = blog.create_comment(post.hash(), "third").await.unwrap_err();
    assert_eq!(err.validation().map(|v| v.rule), Some(Rule::RateLimit));
}

#[tokio::test]
async fn test_memory_backend_is_the_default() {
    let config = QuillConfig::from_toml("").unwrap();
    assert_eq!(config.storage.backend, StorageBackend::Memory);

    let blog = open(&config);
    let p = blog.create_post("t", "ephemeral").await.unwrap();
    assert_eq!(blog.get_all_posts().await.unwrap().len(), 1);

    // A second node from the same config starts empty.
    let other = open(&config);
    assert!(other.get_all_posts().await.unwrap().is_empty());
    assert!(other.get_post(p.hash()).await.unwrap_err().is_not_found());
}
