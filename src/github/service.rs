use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::error::{CommentError, CommentErrorKind, FetchError};
use super::preview::{format_comment_preview, markdown_link};
use super::types::{CommentKind, CommentRecord, ResourceKind};
use super::url;
use crate::cache::{CacheStats, ResourceCache};
use crate::config::{ConfigError, Settings};
use crate::tool::{
    CommandOutput, CommandRunner, PathCacheStatus, PathResolver, ResolveError, ResolvedToolPath,
    RunError, SystemRunner,
};

/// Timeout for title and API queries.
pub const FETCH_TIMEOUT: Duration = Duration::from_millis(8_000);

#[derive(Debug, Clone)]
struct CachedComment {
    record: CommentRecord,
    formatted_preview: String,
}

/// Why a `gh` invocation produced no output.
#[derive(Debug)]
enum GhFailure {
    Unavailable(ResolveError),
    Run(RunError),
}

/// Hit/miss counters for both caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceCacheStats {
    pub titles: CacheStats,
    pub comments: CacheStats,
}

/// Diagnostic snapshot of the service.
#[derive(Debug, Clone)]
pub struct ServiceStatus {
    pub settings: Settings,
    pub caches: ServiceCacheStats,
    pub tool_path: Option<ResolvedToolPath>,
    pub path_cache: PathCacheStatus,
}

/// What the host should insert for a pasted string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A Markdown link with the fetched title or comment preview.
    Linked(String),
    /// The fetch failed; the original text is kept verbatim.
    Fallback { text: String, reason: String },
    /// Not a GitHub URL this crate understands.
    Unchanged(String),
}

impl LinkOutcome {
    pub fn text(&self) -> &str {
        match self {
            LinkOutcome::Linked(text) | LinkOutcome::Unchanged(text) => text,
            LinkOutcome::Fallback { text, .. } => text,
        }
    }
}

/// Fetches titles and comments through `gh`, memoising the results.
///
/// One instance owns both caches and the currently resolved tool path.
/// Locks are never held across an `.await`, so two concurrent fetches of
/// the same uncached URL may both run `gh`; the later write wins.
pub struct GitHubService {
    settings: Mutex<Settings>,
    runner: Arc<dyn CommandRunner>,
    resolver: PathResolver,
    resolved: Mutex<Option<ResolvedToolPath>>,
    titles: Mutex<ResourceCache<String>>,
    comments: Mutex<ResourceCache<CachedComment>>,
}

impl GitHubService {
    pub fn new(settings: Settings) -> Self {
        Self::with_runner(settings, Arc::new(SystemRunner))
    }

    pub fn with_runner(settings: Settings, runner: Arc<dyn CommandRunner>) -> Self {
        let resolver = PathResolver::new(runner.clone());
        Self::with_resolver(settings, runner, resolver)
    }

    pub fn with_resolver(
        settings: Settings,
        runner: Arc<dyn CommandRunner>,
        resolver: PathResolver,
    ) -> Self {
        Self {
            titles: Mutex::new(ResourceCache::new(settings.cache_size)),
            comments: Mutex::new(ResourceCache::new(settings.cache_size)),
            settings: Mutex::new(settings),
            runner,
            resolver,
            resolved: Mutex::new(None),
        }
    }

    pub fn is_resource_url(&self, url: &str) -> bool {
        url::is_resource_url(url)
    }

    pub fn is_comment_url(&self, url: &str) -> bool {
        url::is_comment_url(url)
    }

    #[instrument(skip(self))]
    pub async fn fetch_issue_title(&self, url: &str) -> Result<String, FetchError> {
        if !url::is_issue_url(url) {
            return Err(FetchError::InvalidUrl("issue".to_string()));
        }
        self.fetch_title_of(ResourceKind::Issue, url).await
    }

    #[instrument(skip(self))]
    pub async fn fetch_pr_title(&self, url: &str) -> Result<String, FetchError> {
        if !url::is_pull_request_url(url) {
            return Err(FetchError::InvalidUrl("pull request".to_string()));
        }
        self.fetch_title_of(ResourceKind::PullRequest, url).await
    }

    /// Fetch the title of an issue or pull request, whichever `url` is.
    #[instrument(skip(self))]
    pub async fn fetch_title(&self, url: &str) -> Result<String, FetchError> {
        if url::is_issue_url(url) {
            self.fetch_issue_title(url).await
        } else if url::is_pull_request_url(url) {
            self.fetch_pr_title(url).await
        } else {
            Err(FetchError::InvalidUrl("issue or pull request".to_string()))
        }
    }

    async fn fetch_title_of(&self, kind: ResourceKind, url: &str) -> Result<String, FetchError> {
        if let Some(title) = lock(&self.titles).get(url) {
            debug!("title cache hit");
            return Ok(title);
        }

        let subcommand = match kind {
            ResourceKind::Issue => "issue",
            ResourceKind::PullRequest => "pr",
        };
        let args = vec![
            subcommand.to_string(),
            "view".to_string(),
            url.trim().to_string(),
            "--json".to_string(),
            "title".to_string(),
            "-q".to_string(),
            ".title".to_string(),
        ];

        let output = self.run_gh(args).await.map_err(|failure| match failure {
            GhFailure::Unavailable(e) => FetchError::ToolUnavailable(e.message),
            GhFailure::Run(e) => FetchError::from_run(kind, &e),
        })?;

        let title = output.stdout.trim().to_string();
        if title.is_empty() {
            return Err(FetchError::EmptyResult);
        }

        let ttl = lock(&self.settings).title_ttl();
        lock(&self.titles).put(url, title.clone(), ttl);
        debug!(title = %title, "fetched title");
        Ok(title)
    }

    /// Fetch the comment a comment URL points at.
    #[instrument(skip(self))]
    pub async fn fetch_comment_data(&self, url: &str) -> Result<CommentRecord, CommentError> {
        self.fetch_comment_entry(url).await.map(|entry| entry.record)
    }

    /// Fetch a comment and return its one-line preview.
    #[instrument(skip(self))]
    pub async fn fetch_comment_preview(&self, url: &str) -> Result<String, CommentError> {
        self.fetch_comment_entry(url)
            .await
            .map(|entry| entry.formatted_preview)
    }

    async fn fetch_comment_entry(&self, url: &str) -> Result<CachedComment, CommentError> {
        if !url::is_comment_url(url) {
            return Err(CommentError::parse(format!(
                "Invalid GitHub comment URL format: {url}"
            )));
        }

        if let Some(entry) = lock(&self.comments).get(url) {
            debug!("comment cache hit");
            return Ok(entry);
        }

        let parsed = url::parse_comment_url(url).map_err(|e| CommentError::parse(e.to_string()))?;
        let collection = match parsed.kind {
            CommentKind::ReviewDiscussionComment => "pulls",
            CommentKind::IssueOrPrComment => "issues",
        };
        let endpoint = format!(
            "repos/{}/{}/{collection}/comments/{}",
            parsed.owner, parsed.repo, parsed.comment_id
        );
        debug!(endpoint = %endpoint, "querying comment");

        let output = self
            .run_gh(vec!["api".to_string(), endpoint])
            .await
            .map_err(|failure| match failure {
                GhFailure::Unavailable(e) => {
                    CommentError::new(CommentErrorKind::NetworkError, e.message)
                }
                GhFailure::Run(e) => CommentError::from_run(e),
            })?;

        let mut record = decode_comment(&output.stdout)?;
        if record.parent_number.is_none() {
            record.parent_number = Some(parsed.parent_number);
        }

        let entry = CachedComment {
            formatted_preview: format_comment_preview(&record),
            record,
        };
        let ttl = lock(&self.settings).comment_ttl();
        lock(&self.comments).put(url, entry.clone(), ttl);
        Ok(entry)
    }

    pub fn format_comment_preview(&self, comment: &CommentRecord) -> String {
        format_comment_preview(comment)
    }

    /// Turn pasted text into what should be inserted.
    ///
    /// Comment URLs become `[preview](url)`, issue and pull request URLs
    /// become `[title](url)`. On failure the text is kept as pasted.
    #[instrument(skip(self))]
    pub async fn markdown_for(&self, text: &str) -> LinkOutcome {
        let fetched = if url::is_comment_url(text) {
            self.fetch_comment_preview(text)
                .await
                .map_err(|e| e.to_string())
        } else if url::is_issue_url(text) || url::is_pull_request_url(text) {
            self.fetch_title(text).await.map_err(|e| e.to_string())
        } else {
            return LinkOutcome::Unchanged(text.to_string());
        };

        match fetched {
            Ok(label) => LinkOutcome::Linked(markdown_link(&label, text)),
            Err(reason) => {
                warn!(url = %text, reason = %reason, "keeping original URL");
                LinkOutcome::Fallback {
                    text: text.to_string(),
                    reason,
                }
            }
        }
    }

    pub fn clear_cache(&self) {
        lock(&self.titles).clear();
        lock(&self.comments).clear();
    }

    pub fn cache_stats(&self) -> ServiceCacheStats {
        ServiceCacheStats {
            titles: lock(&self.titles).stats(),
            comments: lock(&self.comments).stats(),
        }
    }

    /// Forget the resolved path and search again.
    #[instrument(skip(self))]
    pub async fn refresh_tool_path(&self) -> bool {
        self.invalidate_tool_path();
        match self.tool_path().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "gh path refresh failed");
                false
            }
        }
    }

    /// Startup probe: is `gh` usable at all?
    #[instrument(skip(self))]
    pub async fn check_availability(&self) -> bool {
        self.tool_path().await.is_ok()
    }

    pub fn resolved_tool_path(&self) -> Option<ResolvedToolPath> {
        lock(&self.resolved).clone()
    }

    /// Replace the settings. Caches shrink at once; new TTLs apply to
    /// later writes.
    pub fn apply_settings(&self, settings: Settings) -> Result<(), ConfigError> {
        settings.validate()?;
        let path_changed = {
            let current = lock(&self.settings);
            current.gh_path() != settings.gh_path()
        };
        lock(&self.titles).set_max_size(settings.cache_size);
        lock(&self.comments).set_max_size(settings.cache_size);
        *lock(&self.settings) = settings;
        if path_changed {
            self.invalidate_tool_path();
        }
        Ok(())
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            settings: lock(&self.settings).clone(),
            caches: self.cache_stats(),
            tool_path: self.resolved_tool_path(),
            path_cache: self.resolver.cache_status(),
        }
    }

    /// Run `gh` with `args`, re-resolving the executable once if a
    /// previously resolved path has gone missing.
    async fn run_gh(&self, args: Vec<String>) -> Result<CommandOutput, GhFailure> {
        let was_resolved = lock(&self.resolved).is_some();
        let path = self.tool_path().await.map_err(GhFailure::Unavailable)?;

        match self.runner.run(&path, &args, FETCH_TIMEOUT).await {
            Err(err) if was_resolved && err.is_tool_missing() => {
                warn!(path = %path, error = %err, "gh path went stale, resolving again");
                self.invalidate_tool_path();
                let path = self.tool_path().await.map_err(GhFailure::Unavailable)?;
                self.runner
                    .run(&path, &args, FETCH_TIMEOUT)
                    .await
                    .map_err(GhFailure::Run)
            }
            result => result.map_err(GhFailure::Run),
        }
    }

    async fn tool_path(&self) -> Result<String, ResolveError> {
        if let Some(resolved) = lock(&self.resolved).as_ref() {
            return Ok(resolved.path.clone());
        }

        let explicit = lock(&self.settings).gh_path().map(str::to_string);
        let resolved = self.resolver.resolve(explicit.as_deref()).await?;
        info!(path = %resolved.path, method = %resolved.method, "using gh");
        let path = resolved.path.clone();
        *lock(&self.resolved) = Some(resolved);
        Ok(path)
    }

    fn invalidate_tool_path(&self) {
        *lock(&self.resolved) = None;
        self.resolver.clear_cache();
    }
}

/// Decode a `gh api` comment payload, insisting on a positive `id`.
fn decode_comment(stdout: &str) -> Result<CommentRecord, CommentError> {
    let value: Value = serde_json::from_str(stdout)
        .map_err(|e| CommentError::parse(format!("Failed to parse comment response: {e}")))?;

    match value.get("id").and_then(Value::as_u64) {
        Some(id) if id > 0 => {}
        _ => {
            return Err(CommentError::parse(
                "Comment response is missing a valid id",
            ))
        }
    }

    serde_json::from_value(value)
        .map_err(|e| CommentError::parse(format!("Unexpected comment response shape: {e}")))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
