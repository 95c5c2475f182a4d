//! GitHub URL recognition, comment previews, and the fetch service.

pub mod error;
pub mod preview;
pub mod service;
pub mod types;
pub mod url;

pub use error::{CommentError, CommentErrorKind, FetchError, UrlParseError};
pub use preview::{format_comment_preview, markdown_link};
pub use service::{GitHubService, LinkOutcome, ServiceCacheStats, ServiceStatus, FETCH_TIMEOUT};
pub use types::{
    CommentAuthor, CommentKind, CommentRecord, ParsedCommentUrl, ParsedResourceUrl, ResourceKind,
};
