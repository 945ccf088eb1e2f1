//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They:
//! - validate input and report per-field errors
//! - enforce ownership rules (only an author edits or answers for a post)
//! - drive the access-request state machine and the visibility rule

pub mod access;
pub mod comment;
pub mod follow;
pub mod password;
pub mod post;
pub mod tag;
pub mod user;
pub mod validation;
pub mod visibility;

pub use access::{AccessService, AccessServiceError, RequestAccessOutcome};
pub use comment::{CommentService, CommentServiceError};
pub use follow::{FollowOutcome, FollowService, FollowServiceError, UnfollowOutcome};
pub use password::{hash_password, verify_password};
pub use post::{FullPost, PostDetail, PostService, PostServiceError, PostTeaser};
pub use tag::{normalize_tag_names, TagService, TagServiceError};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
pub use validation::FieldErrors;
pub use visibility::{evaluate_visibility, resolve_visibility, PostVisibility};
