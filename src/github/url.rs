//! Recognition and decomposition of GitHub issue, pull request and comment URLs.
//!
//! Every predicate trims its input and then requires a full-string match, so
//! query strings, extra path segments or a different host never match.
//! Keywords (`issues`, `pull`, `issuecomment-`, `discussion_r`) are matched
//! case-sensitively.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::error::UrlParseError;
use super::types::{CommentKind, ParsedCommentUrl, ParsedResourceUrl, ResourceKind};

const REPO_PREFIX: &str = r"^https?://github\.com/([^/]+)/([^/]+)";

fn compile(suffix: &str) -> Regex {
    Regex::new(&format!("{REPO_PREFIX}{suffix}$")).unwrap()
}

fn issue_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"/issues/(\d+)"))
}

fn pull_request_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"/pull/(\d+)"))
}

fn issue_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"/issues/(\d+)#issuecomment-(\d+)"))
}

fn pr_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"/pull/(\d+)#issuecomment-(\d+)"))
}

fn pr_discussion_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"/pull/(\d+)#discussion_r(\d+)"))
}

pub fn is_issue_url(url: &str) -> bool {
    issue_re().is_match(url.trim())
}

pub fn is_pull_request_url(url: &str) -> bool {
    pull_request_re().is_match(url.trim())
}

pub fn is_issue_comment_url(url: &str) -> bool {
    issue_comment_re().is_match(url.trim())
}

pub fn is_pr_comment_url(url: &str) -> bool {
    pr_comment_re().is_match(url.trim())
}

pub fn is_pr_discussion_url(url: &str) -> bool {
    pr_discussion_re().is_match(url.trim())
}

/// True for any of the three comment URL shapes.
pub fn is_comment_url(url: &str) -> bool {
    is_issue_comment_url(url) || is_pr_comment_url(url) || is_pr_discussion_url(url)
}

/// True for issue, pull request and comment URLs alike.
pub fn is_resource_url(url: &str) -> bool {
    is_issue_url(url) || is_pull_request_url(url) || is_comment_url(url)
}

/// Split an issue or pull request URL into owner, repo and number.
pub fn parse_resource_url(url: &str) -> Result<ParsedResourceUrl, UrlParseError> {
    let trimmed = url.trim();
    let (kind, caps) = if let Some(caps) = issue_re().captures(trimmed) {
        (ResourceKind::Issue, caps)
    } else if let Some(caps) = pull_request_re().captures(trimmed) {
        (ResourceKind::PullRequest, caps)
    } else {
        return Err(UrlParseError::new(url));
    };

    Ok(ParsedResourceUrl {
        kind,
        owner: caps[1].to_string(),
        repo: caps[2].to_string(),
        number: positive_number(&caps, 3, url)?,
    })
}

/// Split a comment URL into its repository, parent and comment identifiers.
///
/// Shapes are tried in the order issue comment, pull request comment,
/// review discussion. They cannot overlap, so the order only matters for
/// speed.
pub fn parse_comment_url(url: &str) -> Result<ParsedCommentUrl, UrlParseError> {
    let trimmed = url.trim();
    let shapes: [(&Regex, bool, CommentKind); 3] = [
        (issue_comment_re(), false, CommentKind::IssueOrPrComment),
        (pr_comment_re(), true, CommentKind::IssueOrPrComment),
        (pr_discussion_re(), true, CommentKind::ReviewDiscussionComment),
    ];

    for (re, is_pull_request, kind) in shapes {
        if let Some(caps) = re.captures(trimmed) {
            return Ok(ParsedCommentUrl {
                owner: caps[1].to_string(),
                repo: caps[2].to_string(),
                parent_number: positive_number(&caps, 3, url)?,
                comment_id: positive_number(&caps, 4, url)?,
                is_pull_request,
                kind,
                original_url: url.to_string(),
            });
        }
    }

    Err(UrlParseError::new(url))
}

/// Digit runs longer than `u64` allows, or zero, are rejected rather than
/// wrapped.
fn positive_number(caps: &Captures<'_>, group: usize, url: &str) -> Result<u64, UrlParseError> {
    match caps[group].parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(UrlParseError::new(url)),
    }
}
