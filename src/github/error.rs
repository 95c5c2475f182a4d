use thiserror::Error;

use super::types::ResourceKind;
use crate::tool::RunError;

/// A string that does not have the shape of the URL it was parsed as.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid GitHub URL: {url}")]
pub struct UrlParseError {
    url: String,
}

impl UrlParseError {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Failure while fetching an issue or pull request title.
///
/// Remote causes are folded into the `Failed` message rather than typed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Invalid GitHub {0} URL format")]
    InvalidUrl(String),

    #[error("{0}")]
    ToolUnavailable(String),

    #[error("Empty title received from GitHub CLI")]
    EmptyResult,

    #[error("{0}")]
    Failed(String),
}

impl FetchError {
    /// Turn a failed title query into a readable message.
    pub fn from_run(kind: ResourceKind, err: &RunError) -> Self {
        let cause = match err {
            RunError::TimedOut { .. } => "Request timed out".to_string(),
            RunError::Failed { stderr, .. } if stderr.contains("not found") => {
                let noun = kind.noun();
                let mut chars = noun.chars();
                let capitalised = match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                };
                format!("{capitalised} not found or repository is private")
            }
            RunError::Failed { stderr, .. } if stderr.contains("authentication") => {
                "GitHub authentication required. Run \"gh auth login\"".to_string()
            }
            RunError::Failed { stderr, .. } if stderr.contains("rate limit") => {
                "GitHub API rate limit exceeded. Please try again later".to_string()
            }
            other => other.to_string(),
        };
        FetchError::Failed(format!("Failed to fetch {kind} title: {cause}"))
    }
}

/// Coarse classification of a comment fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentErrorKind {
    NotFound,
    Unauthorized,
    RateLimited,
    NetworkError,
    ParseError,
}

impl std::fmt::Display for CommentErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommentErrorKind::NotFound => write!(f, "NOT_FOUND"),
            CommentErrorKind::Unauthorized => write!(f, "UNAUTHORIZED"),
            CommentErrorKind::RateLimited => write!(f, "RATE_LIMITED"),
            CommentErrorKind::NetworkError => write!(f, "NETWORK_ERROR"),
            CommentErrorKind::ParseError => write!(f, "PARSE_ERROR"),
        }
    }
}

/// Failure while fetching a comment, with the underlying process failure
/// kept for diagnostics.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CommentError {
    pub kind: CommentErrorKind,
    pub message: String,
    #[source]
    pub source: Option<RunError>,
}

impl CommentError {
    pub fn new(kind: CommentErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(CommentErrorKind::ParseError, message)
    }

    /// Classify a failed `gh api` call by what the CLI printed.
    pub fn from_run(err: RunError) -> Self {
        let (kind, message) = match &err {
            RunError::TimedOut { timeout_ms } => (
                CommentErrorKind::NetworkError,
                format!("Request timed out after {timeout_ms}ms"),
            ),
            RunError::Failed { stderr, .. } => classify_stderr(stderr),
            RunError::NotFound { .. } | RunError::Io(_) => (
                CommentErrorKind::NetworkError,
                format!("Failed to run GitHub CLI: {err}"),
            ),
        };
        Self {
            kind,
            message,
            source: Some(err),
        }
    }
}

fn classify_stderr(stderr: &str) -> (CommentErrorKind, String) {
    let lower = stderr.to_lowercase();
    if lower.contains("rate limit") {
        (
            CommentErrorKind::RateLimited,
            "GitHub API rate limit exceeded. Please try again later".to_string(),
        )
    } else if stderr.contains("404") || lower.contains("not found") {
        (CommentErrorKind::NotFound, "Comment not found".to_string())
    } else if stderr.contains("401")
        || stderr.contains("403")
        || lower.contains("authentication")
        || lower.contains("bad credentials")
    {
        (
            CommentErrorKind::Unauthorized,
            "GitHub authentication required. Run \"gh auth login\"".to_string(),
        )
    } else {
        (
            CommentErrorKind::NetworkError,
            format!("GitHub CLI request failed: {}", stderr.trim()),
        )
    }
}
