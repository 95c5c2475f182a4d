//! Turn pasted GitHub issue, pull request and comment URLs into Markdown
//! links titled with data fetched through the GitHub CLI.

pub mod cache;
pub mod config;
pub mod github;
pub mod tool;

pub use config::{ConfigError, Settings};
pub use github::{GitHubService, LinkOutcome};
