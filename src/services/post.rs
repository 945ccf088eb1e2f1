//! Post service
//!
//! Creation, editing and deletion of posts by their authors, the detail view
//! (full or teaser, see [`crate::services::visibility`]) and the paginated
//! list views: all public posts, public posts by tag, and the following-feed.

use crate::db::repositories::{
    AccessRequestRepository, CommentRepository, FollowRepository, PostRepository, UserRepository,
};
use crate::models::{
    AccessRequestStatus, CommentWithAuthor, CreatePostInput, ListParams, PagedResult, Post,
    PostStatus, PostSummary, Tag, UpdatePostInput, User, MAX_TITLE_LENGTH,
};
use crate::services::tag::{normalize_tag_names, TagService, TagServiceError};
use crate::services::validation::FieldErrors;
use crate::services::visibility::{resolve_visibility, PostVisibility};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Post not found
    #[error("Post not found: {0}")]
    NotFound(i64),

    /// Tag not found
    #[error("Tag not found: {0}")]
    TagNotFound(String),

    /// The user is not the post's author
    #[error("Only the author can change post {post_id}")]
    NotAuthor { post_id: i64 },

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TagServiceError> for PostServiceError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::NotFound(name) => PostServiceError::TagNotFound(name),
            TagServiceError::ValidationError(errors) => PostServiceError::ValidationError(errors),
            TagServiceError::InternalError(e) => PostServiceError::InternalError(e),
        }
    }
}

/// Detail view of a post whose content the viewer may read
#[derive(Debug, Clone, Serialize)]
pub struct FullPost {
    #[serde(flatten)]
    pub summary: PostSummary,
    pub comments: Vec<CommentWithAuthor>,
    /// Whether the viewer follows the author
    pub is_following: bool,
}

/// Detail view of a hidden post for a viewer without access
#[derive(Debug, Clone, Serialize)]
pub struct PostTeaser {
    pub id: i64,
    pub title: String,
    pub author_id: i64,
    pub author_username: String,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
    /// The viewer's request status, `None` if they never asked
    pub access_request_status: Option<AccessRequestStatus>,
    pub is_following: bool,
}

/// Post detail as returned to one viewer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum PostDetail {
    Full(FullPost),
    Teaser(PostTeaser),
}

impl PostDetail {
    pub fn is_full(&self) -> bool {
        matches!(self, PostDetail::Full(_))
    }
}

/// Post service
pub struct PostService {
    post_repo: Arc<dyn PostRepository>,
    user_repo: Arc<dyn UserRepository>,
    follow_repo: Arc<dyn FollowRepository>,
    comment_repo: Arc<dyn CommentRepository>,
    access_repo: Arc<dyn AccessRequestRepository>,
    tags: Arc<TagService>,
}

impl PostService {
    pub fn new(
        post_repo: Arc<dyn PostRepository>,
        user_repo: Arc<dyn UserRepository>,
        follow_repo: Arc<dyn FollowRepository>,
        comment_repo: Arc<dyn CommentRepository>,
        access_repo: Arc<dyn AccessRequestRepository>,
        tags: Arc<TagService>,
    ) -> Self {
        Self {
            post_repo,
            user_repo,
            follow_repo,
            comment_repo,
            access_repo,
            tags,
        }
    }

    /// Create a post owned by `author`.
    ///
    /// Nothing is written unless every field is valid. The post and its tag
    /// links are stored in one transaction.
    pub async fn create(
        &self,
        author: &User,
        input: CreatePostInput,
    ) -> Result<PostSummary, PostServiceError> {
        let mut errors = FieldErrors::new();
        let title = validate_title(&input.title, &mut errors);
        validate_content(&input.content, &mut errors);
        let tag_names = collect_tag_names(&input.tags, &mut errors);
        errors.into_result().map_err(PostServiceError::ValidationError)?;

        let post = Post::new(
            title,
            input.content,
            author.id,
            input.status.unwrap_or_default(),
        );
        let tags = self.tags.resolve(&tag_names).await?;
        let tag_ids: Vec<i64> = tags.iter().map(|t| t.id).collect();
        let created = self
            .post_repo
            .create(&post, &tag_ids)
            .await
            .context("Failed to create post")?;

        tracing::info!(post_id = created.id, author_id = author.id, status = %created.status, "Post created");
        Ok(PostSummary {
            post: created,
            author_username: author.username.clone(),
            tags,
        })
    }

    /// Edit a post. Only its author may do so.
    ///
    /// Absent fields are left unchanged; `tags`, when present, replaces the
    /// whole tag set. An input without any field returns the post as is.
    pub async fn update(
        &self,
        id: i64,
        editor: &User,
        input: UpdatePostInput,
    ) -> Result<PostSummary, PostServiceError> {
        let mut post = self.get_owned(id, editor).await?;

        let mut errors = FieldErrors::new();
        let title = input.title.as_deref().map(|t| validate_title(t, &mut errors));
        if let Some(content) = &input.content {
            validate_content(content, &mut errors);
        }
        let tag_names = input
            .tags
            .as_ref()
            .map(|names| collect_tag_names(names, &mut errors));
        errors.into_result().map_err(PostServiceError::ValidationError)?;

        if !input.has_changes() {
            return self.summarize(post).await;
        }

        if let Some(title) = title {
            post.title = title;
        }
        if let Some(content) = input.content {
            post.content = content;
        }
        if let Some(status) = input.status {
            post.status = status;
        }
        post.updated_at = Utc::now();

        let tag_ids: Option<Vec<i64>> = match tag_names {
            Some(names) => Some(
                self.tags
                    .resolve(&names)
                    .await?
                    .iter()
                    .map(|t| t.id)
                    .collect(),
            ),
            None => None,
        };
        let updated = self
            .post_repo
            .update(&post, tag_ids.as_deref())
            .await
            .context("Failed to update post")?;

        tracing::info!(post_id = updated.id, status = %updated.status, "Post updated");
        self.summarize(updated).await
    }

    /// Delete a post with its comments, tag links and access requests.
    pub async fn delete(&self, id: i64, user: &User) -> Result<(), PostServiceError> {
        let post = self.get_owned(id, user).await?;

        let deleted = self
            .post_repo
            .delete(post.id)
            .await
            .context("Failed to delete post")?;
        if !deleted {
            return Err(PostServiceError::NotFound(id));
        }

        tracing::info!(post_id = id, "Post deleted");
        Ok(())
    }

    /// Get a post by ID
    pub async fn get(&self, id: i64) -> Result<Post, PostServiceError> {
        self.post_repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound(id))
    }

    /// The post as `viewer` may see it
    pub async fn detail(
        &self,
        id: i64,
        viewer: Option<&User>,
    ) -> Result<PostDetail, PostServiceError> {
        let post = self.get(id).await?;
        let viewer_id = viewer.map(|v| v.id);

        let visibility = resolve_visibility(self.access_repo.as_ref(), &post, viewer_id).await?;
        let is_following = self.is_following(viewer_id, post.author_id).await?;
        let summary = self.summarize(post).await?;

        let detail = match visibility {
            PostVisibility::Full => {
                let comments = self
                    .comment_repo
                    .list_by_post(summary.post.id)
                    .await
                    .context("Failed to list comments")?;
                PostDetail::Full(FullPost {
                    summary,
                    comments,
                    is_following,
                })
            }
            PostVisibility::Teaser { request_status } => {
                let PostSummary {
                    post,
                    author_username,
                    tags,
                } = summary;
                PostDetail::Teaser(PostTeaser {
                    id: post.id,
                    title: post.title,
                    author_id: post.author_id,
                    author_username,
                    status: post.status,
                    created_at: post.created_at,
                    updated_at: post.updated_at,
                    tags,
                    access_request_status: request_status,
                    is_following,
                })
            }
        };

        Ok(detail)
    }

    /// All public posts, newest first
    pub async fn list(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<PostSummary>, PostServiceError> {
        let (posts, total) = self
            .post_repo
            .list_public(params)
            .await
            .context("Failed to list posts")?;
        self.page_of(posts, total, params).await
    }

    /// Public posts carrying the tag named exactly `name`, newest first
    pub async fn list_by_tag(
        &self,
        name: &str,
        params: &ListParams,
    ) -> Result<PagedResult<PostSummary>, PostServiceError> {
        let tag = self.tags.get_by_name(name).await?;
        let (posts, total) = self
            .post_repo
            .list_public_by_tag(tag.id, params)
            .await
            .context("Failed to list posts by tag")?;
        self.page_of(posts, total, params).await
    }

    /// Public posts by the authors `user` follows, newest first
    pub async fn feed(
        &self,
        user: &User,
        params: &ListParams,
    ) -> Result<PagedResult<PostSummary>, PostServiceError> {
        let (posts, total) = self
            .post_repo
            .list_feed(user.id, params)
            .await
            .context("Failed to list feed")?;
        self.page_of(posts, total, params).await
    }

    async fn get_owned(&self, id: i64, user: &User) -> Result<Post, PostServiceError> {
        let post = self.get(id).await?;
        if !user.is_author_of(post.author_id) {
            tracing::debug!(post_id = id, user_id = user.id, "Refused change by non-author");
            return Err(PostServiceError::NotAuthor { post_id: id });
        }
        Ok(post)
    }

    async fn is_following(
        &self,
        viewer_id: Option<i64>,
        author_id: i64,
    ) -> Result<bool, PostServiceError> {
        match viewer_id {
            Some(viewer) if viewer != author_id => {
                let follows = self
                    .follow_repo
                    .exists(viewer, author_id)
                    .await
                    .context("Failed to check follow")?;
                Ok(follows)
            }
            _ => Ok(false),
        }
    }

    async fn summarize(&self, post: Post) -> Result<PostSummary, PostServiceError> {
        let author_username = self.author_username(post.author_id).await?;
        let tags = self.tags.tags_of(post.id).await?;
        Ok(PostSummary {
            post,
            author_username,
            tags,
        })
    }

    async fn page_of(
        &self,
        posts: Vec<Post>,
        total: i64,
        params: &ListParams,
    ) -> Result<PagedResult<PostSummary>, PostServiceError> {
        let mut usernames: HashMap<i64, String> = HashMap::new();
        let mut items = Vec::with_capacity(posts.len());

        for post in posts {
            let author_username = match usernames.get(&post.author_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self.author_username(post.author_id).await?;
                    usernames.insert(post.author_id, name.clone());
                    name
                }
            };
            let tags = self.tags.tags_of(post.id).await?;
            items.push(PostSummary {
                post,
                author_username,
                tags,
            });
        }

        Ok(PagedResult::new(items, total, params))
    }

    async fn author_username(&self, author_id: i64) -> Result<String, PostServiceError> {
        let author = self
            .user_repo
            .get_by_id(author_id)
            .await
            .context("Failed to get post author")?
            .with_context(|| format!("Author {} of post is missing", author_id))?;
        Ok(author.username)
    }
}

fn validate_title(title: &str, errors: &mut FieldErrors) -> String {
    let title = title.trim();
    if title.is_empty() {
        errors.add("title", "Title cannot be empty");
    } else if title.chars().count() > MAX_TITLE_LENGTH {
        errors.add(
            "title",
            format!("Title must be at most {} characters", MAX_TITLE_LENGTH),
        );
    }
    title.to_string()
}

fn validate_content(content: &str, errors: &mut FieldErrors) {
    if content.trim().is_empty() {
        errors.add("content", "Content cannot be empty");
    }
}

fn collect_tag_names(names: &[String], errors: &mut FieldErrors) -> Vec<String> {
    match normalize_tag_names(names) {
        Ok(names) => names,
        Err(tag_errors) => {
            if let Some(message) = tag_errors.get("tags") {
                errors.add("tags", message);
            }
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxAccessRequestRepository, SqlxCommentRepository, SqlxFollowRepository,
        SqlxPostRepository, SqlxTagRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{Comment, UserRole};

    struct Fixture {
        pool: DynDatabasePool,
        service: PostService,
        alice: User,
        bob: User,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let alice = user_repo
            .create(&User::new("alice".into(), "alice@example.com".into(), "h".into(), UserRole::Admin))
            .await
            .unwrap();
        let bob = user_repo
            .create(&User::new("bob".into(), "bob@example.com".into(), "h".into(), UserRole::Author))
            .await
            .unwrap();

        let service = PostService::new(
            SqlxPostRepository::boxed(pool.clone()),
            user_repo,
            SqlxFollowRepository::boxed(pool.clone()),
            SqlxCommentRepository::boxed(pool.clone()),
            SqlxAccessRequestRepository::boxed(pool.clone()),
            Arc::new(TagService::new(SqlxTagRepository::boxed(pool.clone()))),
        );

        Fixture {
            pool,
            service,
            alice,
            bob,
        }
    }

    fn new_post(title: &str, status: PostStatus, tags: &[&str]) -> CreatePostInput {
        CreatePostInput {
            title: title.to_string(),
            content: format!("{} body", title),
            status: Some(status),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    async fn count_posts(pool: &DynDatabasePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_defaults_to_public_and_attaches_tags() {
        let f = setup().await;

        let input = CreatePostInput {
            title: "  Hello  ".into(),
            content: "World".into(),
            status: None,
            tags: vec!["rust".into(), " rust ".into(), "web".into()],
        };
        let summary = f.service.create(&f.alice, input).await.unwrap();

        assert_eq!(summary.post.title, "Hello");
        assert_eq!(summary.post.status, PostStatus::Public);
        assert_eq!(summary.author_username, "alice");
        let names: Vec<&str> = summary.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["rust", "web"]);
    }

    #[tokio::test]
    async fn test_create_invalid_writes_nothing() {
        let f = setup().await;

        let input = CreatePostInput {
            title: "x".repeat(MAX_TITLE_LENGTH + 1),
            content: "   ".into(),
            status: None,
            tags: vec!["ok".into()],
        };
        match f.service.create(&f.alice, input).await {
            Err(PostServiceError::ValidationError(errors)) => {
                assert!(errors.get("title").is_some());
                assert!(errors.get("content").is_some());
            }
            other => panic!("expected validation error, got {:?}", other.map(|s| s.post.id)),
        }
        assert_eq!(count_posts(&f.pool).await, 0);
    }

    #[tokio::test]
    async fn test_update_by_author_replaces_tags() {
        let f = setup().await;
        let created = f
            .service
            .create(&f.alice, new_post("Draft", PostStatus::Public, &["old"]))
            .await
            .unwrap();

        let updated = f
            .service
            .update(
                created.post.id,
                &f.alice,
                UpdatePostInput {
                    title: Some("Final".into()),
                    status: Some(PostStatus::HiddenRequest),
                    tags: Some(vec!["new".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.post.title, "Final");
        assert_eq!(updated.post.content, "Draft body");
        assert_eq!(updated.post.status, PostStatus::HiddenRequest);
        assert!(updated.post.updated_at >= created.post.updated_at);
        let names: Vec<&str> = updated.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["new"]);
    }

    #[tokio::test]
    async fn test_non_author_cannot_update_or_delete() {
        let f = setup().await;
        let created = f
            .service
            .create(&f.alice, new_post("Mine", PostStatus::Public, &[]))
            .await
            .unwrap();
        let id = created.post.id;

        let update = f
            .service
            .update(
                id,
                &f.bob,
                UpdatePostInput {
                    title: Some("Hijacked".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(update, Err(PostServiceError::NotAuthor { post_id }) if post_id == id));

        let delete = f.service.delete(id, &f.bob).await;
        assert!(matches!(delete, Err(PostServiceError::NotAuthor { .. })));

        let stored = f.service.get(id).await.unwrap();
        assert_eq!(stored.title, "Mine");
    }

    #[tokio::test]
    async fn test_delete_cascades_comments() {
        let f = setup().await;
        let created = f
            .service
            .create(&f.alice, new_post("Bye", PostStatus::Public, &["t"]))
            .await
            .unwrap();
        SqlxCommentRepository::new(f.pool.clone())
            .create(&Comment::new(created.post.id, f.bob.id, "nice".into()))
            .await
            .unwrap();

        f.service.delete(created.post.id, &f.alice).await.unwrap();

        assert!(matches!(
            f.service.get(created.post.id).await,
            Err(PostServiceError::NotFound(_))
        ));
        let comments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
            .fetch_one(f.pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(comments, 0);
    }

    #[tokio::test]
    async fn test_detail_hidden_post_is_teaser_for_others() {
        let f = setup().await;
        let created = f
            .service
            .create(&f.alice, new_post("Secret", PostStatus::HiddenRequest, &["private"]))
            .await
            .unwrap();
        let id = created.post.id;

        let for_author = f.service.detail(id, Some(&f.alice)).await.unwrap();
        assert!(for_author.is_full());

        match f.service.detail(id, Some(&f.bob)).await.unwrap() {
            PostDetail::Teaser(teaser) => {
                assert_eq!(teaser.title, "Secret");
                assert_eq!(teaser.access_request_status, None);
                assert_eq!(teaser.tags.len(), 1);
            }
            PostDetail::Full(_) => panic!("bob must not see hidden content"),
        }

        let anonymous = f.service.detail(id, None).await.unwrap();
        let json = serde_json::to_value(&anonymous).unwrap();
        assert_eq!(json["view"], "teaser");
        assert!(json.get("content").is_none());
        assert!(json.get("comments").is_none());
    }

    #[tokio::test]
    async fn test_detail_reports_following() {
        let f = setup().await;
        let created = f
            .service
            .create(&f.alice, new_post("Open", PostStatus::Public, &[]))
            .await
            .unwrap();
        SqlxFollowRepository::new(f.pool.clone())
            .create(f.bob.id, f.alice.id)
            .await
            .unwrap();

        match f.service.detail(created.post.id, Some(&f.bob)).await.unwrap() {
            PostDetail::Full(full) => {
                assert!(full.is_following);
                assert_eq!(full.summary.post.content, "Open body");
            }
            PostDetail::Teaser(_) => panic!("public post must be full"),
        }
        match f.service.detail(created.post.id, Some(&f.alice)).await.unwrap() {
            PostDetail::Full(full) => assert!(!full.is_following),
            PostDetail::Teaser(_) => panic!("author must see full post"),
        }
    }

    #[tokio::test]
    async fn test_lists_only_show_public_posts() {
        let f = setup().await;
        f.service
            .create(&f.alice, new_post("Public", PostStatus::Public, &["rust"]))
            .await
            .unwrap();
        f.service
            .create(&f.alice, new_post("Hidden", PostStatus::HiddenRequest, &["rust"]))
            .await
            .unwrap();

        let all = f.service.list(&ListParams::default()).await.unwrap();
        assert_eq!(all.total, 1);
        assert_eq!(all.items[0].post.title, "Public");

        let tagged = f
            .service
            .list_by_tag("rust", &ListParams::default())
            .await
            .unwrap();
        assert_eq!(tagged.total, 1);

        let missing = f.service.list_by_tag("go", &ListParams::default()).await;
        assert!(matches!(missing, Err(PostServiceError::TagNotFound(name)) if name == "go"));
    }

    #[tokio::test]
    async fn test_feed_contains_followed_public_posts_only() {
        let f = setup().await;
        f.service
            .create(&f.alice, new_post("Visible", PostStatus::Public, &[]))
            .await
            .unwrap();
        f.service
            .create(&f.alice, new_post("Gated", PostStatus::HiddenRequest, &[]))
            .await
            .unwrap();

        let before = f.service.feed(&f.bob, &ListParams::default()).await.unwrap();
        assert_eq!(before.total, 0);

        SqlxFollowRepository::new(f.pool.clone())
            .create(f.bob.id, f.alice.id)
            .await
            .unwrap();

        let after = f.service.feed(&f.bob, &ListParams::default()).await.unwrap();
        let titles: Vec<&str> = after.items.iter().map(|s| s.post.title.as_str()).collect();
        assert_eq!(titles, vec!["Visible"]);
    }
}
