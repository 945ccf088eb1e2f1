//! Data models
//!
//! Database entities (User, Session, Post, Tag, Follow, Comment,
//! AccessRequest), the inputs used to create and change them, and the
//! joined views returned by list endpoints.

mod access_request;
mod comment;
mod follow;
mod post;
mod session;
mod tag;
mod user;

pub use access_request::{
    AccessDecision, AccessRequest, AccessRequestStatus, AccessRequestWithMeta, TransitionError,
};
pub use comment::{Comment, CommentWithAuthor};
pub use follow::FollowCounts;
pub use post::{
    CreatePostInput, ListParams, PagedResult, Post, PostStatus, PostSummary, UpdatePostInput,
    MAX_TITLE_LENGTH,
};
pub use session::Session;
pub use tag::{Tag, TagWithCount, MAX_TAG_LENGTH};
pub use user::{User, UserProfile, UserRole};
