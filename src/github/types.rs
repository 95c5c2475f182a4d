use serde::{Deserialize, Deserializer};

/// Whether a resource URL points at an issue or a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Issue,
    PullRequest,
}

impl ResourceKind {
    /// Lower-case noun used in user-facing messages.
    pub fn noun(self) -> &'static str {
        match self {
            ResourceKind::Issue => "issue",
            ResourceKind::PullRequest => "pull request",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.noun())
    }
}

/// The parsed components of an issue or pull request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResourceUrl {
    pub kind: ResourceKind,
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

/// Which of the comment endpoints a comment URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// `#issuecomment-<id>` on an issue or a pull request conversation.
    IssueOrPrComment,
    /// `#discussion_r<id>` on a pull request review thread.
    ReviewDiscussionComment,
}

/// The parsed components of a comment URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommentUrl {
    pub owner: String,
    pub repo: String,
    /// Issue or pull request number the comment belongs to
    pub parent_number: u64,
    pub comment_id: u64,
    pub is_pull_request: bool,
    pub kind: CommentKind,
    /// The URL exactly as it was parsed
    pub original_url: String,
}

/// Author block of a comment as returned by the GitHub REST API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommentAuthor {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
    /// Profile page, `html_url` in the API payload
    #[serde(default, rename = "html_url")]
    pub profile_url: String,
}

/// A single issue, pull request or review comment.
///
/// Issue comments expose their parent through `issue_url` while review
/// comments use `pull_request_url`; both land in `parent_url`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommentRecord {
    pub id: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    /// Empty when the account was deleted (`"user": null`)
    #[serde(default, rename = "user", deserialize_with = "null_as_default")]
    pub author: CommentAuthor,
    #[serde(default, alias = "issue_url", alias = "pull_request_url")]
    pub parent_url: String,
    #[serde(default, alias = "issue_number")]
    pub parent_number: Option<u64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
