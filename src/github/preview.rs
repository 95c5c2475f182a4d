//! One-line comment previews and Markdown link text.

use std::sync::OnceLock;

use regex::Regex;

use super::types::CommentRecord;

/// Maximum characters of comment body kept in a preview.
pub const BODY_PREVIEW_CHARS: usize = 120;

/// Maximum length of a whole preview line, ellipsis included.
pub const PREVIEW_LINE_CHARS: usize = 200;

const ELLIPSIS: &str = "...";
const CODE_PLACEHOLDER: &str = "[code]";

/// `[text](url)` with brackets in the text escaped.
pub fn markdown_link(text: &str, url: &str) -> String {
    let escaped = text.replace('[', "\\[").replace(']', "\\]");
    format!("[{escaped}]({})", url.trim())
}

/// Summarise a comment as `#<parent> (comment <id>) by @<login>: <body>`.
///
/// Never fails: when the parent number cannot be recovered the result
/// falls back to `comment <id> by @<login>`.
pub fn format_comment_preview(comment: &CommentRecord) -> String {
    match try_format(comment) {
        Some(line) => line,
        None => format!("comment {} by @{}", comment.id, login(comment)),
    }
}

/// GitHub shows deleted accounts as `ghost`.
fn login(comment: &CommentRecord) -> &str {
    match comment.author.login.as_str() {
        "" => "ghost",
        login => login,
    }
}

fn try_format(comment: &CommentRecord) -> Option<String> {
    let parent = comment
        .parent_number
        .or_else(|| parent_number_from_url(&comment.parent_url))
        .or_else(|| parent_number_from_url(&comment.html_url))?;

    let body = truncate(&plain_text(&comment.body), BODY_PREVIEW_CHARS);
    let line = format!(
        "#{parent} (comment {}) by @{}: {body}",
        comment.id,
        login(comment)
    );
    Some(truncate(&line, PREVIEW_LINE_CHARS))
}

/// Pull the issue or pull request number out of an API or browser URL.
pub fn parent_number_from_url(url: &str) -> Option<u64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"/(?:issues|pulls?)/(\d+)").unwrap());
    re.captures(url)?
        .get(1)?
        .as_str()
        .parse::<u64>()
        .ok()
        .filter(|n| *n > 0)
}

/// Reduce Markdown to a single line of inline text.
pub fn plain_text(markdown: &str) -> String {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    let rules = RULES.get_or_init(|| {
        [
            (r"(?s)```.*?(```|$)", CODE_PLACEHOLDER),
            (r"!\[([^\]]*)\]\([^)]*\)", "$1"),
            (r"\[([^\]]+)\]\([^)]*\)", "$1"),
            (r"`([^`]+)`", "$1"),
            (r"\*\*([^*]+)\*\*", "$1"),
            (r"__([^_]+)__", "$1"),
            (r"\*([^*\s][^*]*)\*", "$1"),
            (r"\b_([^_]+)_\b", "$1"),
            (r"~~([^~]+)~~", "$1"),
            (r"(?m)^\s{0,3}#{1,6}\s+", ""),
            (r"(?m)^\s*>\s?", ""),
            (r"(?m)^\s*(?:[-*+]|\d+\.)\s+", ""),
            (r"\s+", " "),
        ]
        .into_iter()
        .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
        .collect()
    });

    let mut text = markdown.to_string();
    for (re, replacement) in rules {
        text = re.replace_all(&text, *replacement).into_owned();
    }
    text.trim().to_string()
}

/// Keep at most `max` characters, ending in an ellipsis when cut.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str(ELLIPSIS);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::types::CommentAuthor;

    fn comment(body: &str) -> CommentRecord {
        CommentRecord {
            id: 123456,
            url: "https://api.github.com/repos/test/repo/issues/comments/123456".to_string(),
            html_url: "https://github.com/test/repo/issues/1#issuecomment-123456".to_string(),
            body: body.to_string(),
            created_at: "2023-01-01T00:00:00Z".to_string(),
            updated_at: "2023-01-01T00:00:00Z".to_string(),
            author: CommentAuthor {
                login: "testuser".to_string(),
                avatar_url: "https://github.com/images/error/testuser.gif".to_string(),
                profile_url: "https://github.com/testuser".to_string(),
            },
            parent_url: "https://api.github.com/repos/test/repo/issues/1".to_string(),
            parent_number: None,
        }
    }

    #[test]
    fn test_preview_shape() {
        let preview = format_comment_preview(&comment("Looks good to me"));
        assert_eq!(preview, "#1 (comment 123456) by @testuser: Looks good to me");
    }

    #[test]
    fn test_long_body_is_truncated() {
        let preview = format_comment_preview(&comment(&"x".repeat(1000)));
        assert!(preview.chars().count() <= PREVIEW_LINE_CHARS);
        assert!(preview.ends_with("..."));
        let body = preview.split(": ").nth(1).unwrap();
        assert_eq!(body.chars().count(), BODY_PREVIEW_CHARS);
    }

    #[test]
    fn test_repeated_sentence_is_truncated() {
        let body = "This is a very long comment body that should be truncated in the preview. ".repeat(10);
        let preview = format_comment_preview(&comment(&body));
        assert!(preview.len() < 200);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_whole_line_capped_for_long_logins() {
        let mut record = comment(&"y".repeat(500));
        record.author.login = "z".repeat(150);
        let preview = format_comment_preview(&record);
        assert_eq!(preview.chars().count(), PREVIEW_LINE_CHARS);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_markdown_is_flattened() {
        let preview = format_comment_preview(&comment(
            "**Bold text** and `code snippet` with [link](https://example.com)",
        ));
        assert!(preview.ends_with(": Bold text and code snippet with link"));
    }

    #[test]
    fn test_plain_text_rules() {
        assert_eq!(plain_text("## Heading\n\n> quoted\n- item one\n1. item two"), "Heading quoted item one item two");
        assert_eq!(plain_text("before\n```rust\nfn main() {}\n```\nafter"), "before [code] after");
        assert_eq!(plain_text("*em* and _also em_ and ~~gone~~"), "em and also em and gone");
        assert_eq!(plain_text("snake_case_name stays"), "snake_case_name stays");
        assert_eq!(plain_text("![alt](img.png) text"), "alt text");
    }

    #[test]
    fn test_parent_number_prefers_record_field() {
        let mut record = comment("hi");
        record.parent_number = Some(99);
        assert!(format_comment_preview(&record).starts_with("#99 "));
    }

    #[test]
    fn test_parent_number_from_review_comment_url() {
        assert_eq!(
            parent_number_from_url("https://api.github.com/repos/o/r/pulls/12"),
            Some(12)
        );
        assert_eq!(
            parent_number_from_url("https://github.com/o/r/pull/34#discussion_r1"),
            Some(34)
        );
        assert_eq!(parent_number_from_url("https://example.com"), None);
    }

    #[test]
    fn test_fallback_when_parent_unknown() {
        let mut record = comment("hi");
        record.parent_url.clear();
        record.html_url.clear();
        assert_eq!(format_comment_preview(&record), "comment 123456 by @testuser");
    }

    #[test]
    fn test_missing_author_shows_as_ghost() {
        let mut record = comment("hi");
        record.author = CommentAuthor::default();
        assert_eq!(format_comment_preview(&record), "#1 (comment 123456) by @ghost: hi");

        record.parent_url.clear();
        record.html_url.clear();
        assert_eq!(format_comment_preview(&record), "comment 123456 by @ghost");
    }

    #[test]
    fn test_markdown_link_escapes_brackets() {
        assert_eq!(
            markdown_link("[RFC] Add cache", "https://github.com/o/r/issues/1"),
            "[\\[RFC\\] Add cache](https://github.com/o/r/issues/1)"
        );
    }
}
