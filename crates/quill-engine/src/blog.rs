//! The blog application: posts, comments and the links that index them.
//!
//! Link conventions:
//! - `all_posts`: the `all_posts` anchor → every live post
//! - `post_updates`: original post → each of its updates
//! - `post_to_comments`: post → each comment on it
//! - `author_to_comments`: author → each comment they wrote
//!
//! Posts and comments are addressed by the hash of their create action.

use std::sync::Arc;

use quill_chain::{
    ChainError, DeletedLink, Link, LinkEndpoint, Record, Rule, SignedAction, ValidationConfig,
    ValidationError,
};
use quill_types::{
    ActionHash, AgentId, AnchorHash, Comment, Entry, EntryType, LinkTag, Linkable, Post,
};
use tracing::info;

use crate::engine::QuillEngine;
use crate::error::EngineError;

pub const ALL_POSTS: &str = "all_posts";
pub const POST_UPDATES: &str = "post_updates";
pub const POST_TO_COMMENTS: &str = "post_to_comments";
pub const AUTHOR_TO_COMMENTS: &str = "author_to_comments";

type Result<T> = std::result::Result<T, EngineError>;

/// Add the endpoint shapes of the link conventions above to `config`.
///
/// Every node that replicates blog data should enforce these, so that a
/// link filed under a blog tag always points the right way.
pub fn with_link_schemas(config: ValidationConfig) -> ValidationConfig {
    let post = LinkEndpoint::Entry(EntryType::Post);
    let comment = LinkEndpoint::Entry(EntryType::Comment);
    config
        .with_link_schema(ALL_POSTS, LinkEndpoint::Anchor, post)
        .with_link_schema(POST_UPDATES, post, post)
        .with_link_schema(POST_TO_COMMENTS, post, comment)
        .with_link_schema(AUTHOR_TO_COMMENTS, LinkEndpoint::Agent, comment)
}

/// Blog operations on top of any [`QuillEngine`].
#[derive(Clone)]
pub struct Blog {
    engine: Arc<dyn QuillEngine>,
}

fn tag(name: &str) -> LinkTag {
    LinkTag::new(name)
}

fn all_posts_anchor() -> Linkable {
    AnchorHash::from_path(ALL_POSTS).into()
}

/// The comment carried by a record.
fn comment_of(record: &Record) -> Result<Comment> {
    match &record.entry {
        Some(Entry::Comment(comment)) => Ok(comment.clone()),
        _ => Err(EngineError::UnexpectedRecord(format!(
            "{} is not a comment",
            record.hash()
        ))),
    }
}

impl Blog {
    pub fn new(engine: Arc<dyn QuillEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<dyn QuillEngine> {
        &self.engine
    }

    /// Refuse early when we are not the record's author, so no index link
    /// is removed for a delete that would be rejected.
    fn ensure_author(&self, record: &Record) -> Result<()> {
        let author = self.engine.agent_id();
        if record.action.author() != author {
            return Err(ChainError::from(ValidationError::new(
                Rule::Ownership,
                format!(
                    "{author} may not delete {}: the record belongs to {}",
                    record.hash(),
                    record.action.author()
                ),
            ))
            .into());
        }
        Ok(())
    }

    /// Delete every live link from `base` under `tag` that targets `target`.
    async fn unlink(&self, base: Linkable, tag_name: &str, target: ActionHash) -> Result<()> {
        let links = self.engine.get_links(base, Some(tag(tag_name))).await?;
        for link in links
            .into_iter()
            .filter(|l| l.target.as_action() == Some(target))
        {
            self.engine.delete_link(link.create_link_hash).await?;
        }
        Ok(())
    }

    // ----- Posts -----

    /// Publish a post and list it under the `all_posts` anchor.
    pub async fn create_post(&self, name: &str, content: &str) -> Result<Record> {
        let post = Post {
            name: name.to_string(),
            content: content.to_string(),
            author: self.engine.agent_id(),
        };
        let record = self.engine.create_entry(post.into()).await?;
        self.engine
            .create_link(all_posts_anchor(), record.hash().into(), tag(ALL_POSTS))
            .await?;

        info!(post = %record.hash(), "created post");
        Ok(record)
    }

    /// The post as originally created.
    pub async fn get_post(&self, original_post_hash: ActionHash) -> Result<Record> {
        self.engine.get_entry(original_post_hash).await
    }

    /// Every listed post.
    pub async fn get_all_posts(&self) -> Result<Vec<Link>> {
        self.engine
            .get_links(all_posts_anchor(), Some(tag(ALL_POSTS)))
            .await
    }

    /// The newest revision linked from the original post, or the original
    /// if it was never updated.
    pub async fn get_latest_post(&self, original_post_hash: ActionHash) -> Result<Record> {
        let updates = self
            .engine
            .get_links(original_post_hash.into(), Some(tag(POST_UPDATES)))
            .await?;

        let latest = match updates.last() {
            Some(link) => link.target.as_action().ok_or_else(|| {
                EngineError::UnexpectedRecord(format!(
                    "post update link {} does not target an action",
                    link.create_link_hash
                ))
            })?,
            None => original_post_hash,
        };
        self.engine.get_entry(latest).await
    }

    /// Revise a post and link the revision from the original.
    pub async fn update_post(
        &self,
        original_post_hash: ActionHash,
        previous_post_hash: ActionHash,
        name: &str,
        content: &str,
    ) -> Result<Record> {
        let post = Post {
            name: name.to_string(),
            content: content.to_string(),
            author: self.engine.agent_id(),
        };
        let record = self
            .engine
            .update_entry(previous_post_hash, post.into())
            .await?;
        self.engine
            .create_link(
                original_post_hash.into(),
                record.hash().into(),
                tag(POST_UPDATES),
            )
            .await?;

        info!(post = %original_post_hash, revision = %record.hash(), "updated post");
        Ok(record)
    }

    /// Unlist a post, then delete it.
    pub async fn delete_post(&self, original_post_hash: ActionHash) -> Result<ActionHash> {
        let record = self.engine.get_entry(original_post_hash).await?;
        self.ensure_author(&record)?;
        self.unlink(all_posts_anchor(), ALL_POSTS, original_post_hash)
            .await?;
        let delete = self.engine.delete_entry(original_post_hash).await?;

        info!(post = %original_post_hash, "deleted post");
        Ok(delete)
    }

    // ----- Comments -----

    /// Comment on a post and index the comment by post and by author.
    pub async fn create_comment(&self, post_hash: ActionHash, content: &str) -> Result<Record> {
        let author = self.engine.agent_id();
        let comment = Comment {
            content: content.to_string(),
            post_hash,
            author,
        };
        let record = self.engine.create_entry(comment.into()).await?;
        let comment_hash: Linkable = record.hash().into();

        self.engine
            .create_link(post_hash.into(), comment_hash, tag(POST_TO_COMMENTS))
            .await?;
        self.engine
            .create_link(author.into(), comment_hash, tag(AUTHOR_TO_COMMENTS))
            .await?;

        info!(post = %post_hash, comment = %record.hash(), "created comment");
        Ok(record)
    }

    /// The comment as originally created.
    pub async fn get_comment(&self, original_comment_hash: ActionHash) -> Result<Record> {
        self.engine.get_entry(original_comment_hash).await
    }

    /// The newest live revision of a comment.
    pub async fn get_latest_comment(&self, original_comment_hash: ActionHash) -> Result<Record> {
        self.engine.get_latest(original_comment_hash, false).await
    }

    /// Revise a comment's text. The comment stays on the same post.
    pub async fn update_comment(
        &self,
        previous_comment_hash: ActionHash,
        content: &str,
    ) -> Result<Record> {
        let previous = self.engine.get_entry(previous_comment_hash).await?;
        let comment = Comment {
            content: content.to_string(),
            ..comment_of(&previous)?
        };
        self.engine
            .update_entry(previous_comment_hash, comment.into())
            .await
    }

    /// Remove a comment from its post and author indexes, then delete it.
    pub async fn delete_comment(&self, original_comment_hash: ActionHash) -> Result<ActionHash> {
        let record = self.engine.get_entry(original_comment_hash).await?;
        let comment = comment_of(&record)?;
        self.ensure_author(&record)?;

        self.unlink(
            comment.post_hash.into(),
            POST_TO_COMMENTS,
            original_comment_hash,
        )
        .await?;
        self.unlink(
            comment.author.into(),
            AUTHOR_TO_COMMENTS,
            original_comment_hash,
        )
        .await?;
        let delete = self.engine.delete_entry(original_comment_hash).await?;

        info!(comment = %original_comment_hash, "deleted comment");
        Ok(delete)
    }

    pub async fn get_comments_for_post(&self, post_hash: ActionHash) -> Result<Vec<Link>> {
        self.engine
            .get_links(post_hash.into(), Some(tag(POST_TO_COMMENTS)))
            .await
    }

    pub async fn get_deleted_comments_for_post(
        &self,
        post_hash: ActionHash,
    ) -> Result<Vec<DeletedLink>> {
        self.engine
            .get_deleted_links(post_hash.into(), Some(tag(POST_TO_COMMENTS)))
            .await
    }

    pub async fn get_comments_for_author(&self, author: AgentId) -> Result<Vec<Link>> {
        self.engine
            .get_links(author.into(), Some(tag(AUTHOR_TO_COMMENTS)))
            .await
    }

    pub async fn get_deleted_comments_for_author(
        &self,
        author: AgentId,
    ) -> Result<Vec<DeletedLink>> {
        self.engine
            .get_deleted_links(author.into(), Some(tag(AUTHOR_TO_COMMENTS)))
            .await
    }

    /// The original comment and every revision after it, oldest first.
    pub async fn get_all_revisions_for_comment(
        &self,
        original_comment_hash: ActionHash,
    ) -> Result<Vec<Record>> {
        self.engine.get_all_revisions(original_comment_hash).await
    }

    pub async fn get_all_deletes_for_comment(
        &self,
        original_comment_hash: ActionHash,
    ) -> Result<Vec<SignedAction>> {
        self.engine.get_deletes(original_comment_hash).await
    }

    pub async fn get_oldest_delete_for_comment(
        &self,
        original_comment_hash: ActionHash,
    ) -> Result<SignedAction> {
        self.engine.get_oldest_delete(original_comment_hash).await
    }
}
