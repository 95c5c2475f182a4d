use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::CommandRunner;

/// Bare program name used when falling back to the search path.
pub const PROGRAM: &str = if cfg!(windows) { "gh.exe" } else { "gh" };

/// Substring `gh --version` must print (compared case-insensitively).
pub const VERSION_MARKER: &str = "gh version";

pub const VERSION_PROBE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// How long a validated path is trusted before the search runs again.
pub const PATH_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

const NOT_FOUND_MESSAGE: &str = "GitHub CLI (gh) not found in any expected locations. \
    Please install GitHub CLI or configure the path manually in settings.";

/// Which step of the search produced a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    UserDefined,
    CommonPath,
    EnvironmentPath,
    Cached,
}

impl std::fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionMethod::UserDefined => write!(f, "user-defined"),
            ResolutionMethod::CommonPath => write!(f, "common-paths"),
            ResolutionMethod::EnvironmentPath => write!(f, "environment-path"),
            ResolutionMethod::Cached => write!(f, "cached"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToolPath {
    pub path: String,
    pub method: ResolutionMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ResolveError {
    pub message: String,
}

/// Snapshot of the last-known-good path, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCacheStatus {
    pub cached: bool,
    pub path: Option<String>,
    pub age: Option<Duration>,
}

struct CachedPath {
    path: String,
    validated_at: Instant,
}

/// Finds a working `gh` executable.
///
/// Search order, first success wins:
/// 1. the path validated within the last [`PATH_CACHE_TTL`]
/// 2. the caller's explicit path
/// 3. well-known install locations for this platform
/// 4. the bare program name on the search path
pub struct PathResolver {
    runner: Arc<dyn CommandRunner>,
    candidates: Vec<PathBuf>,
    cache_ttl: Duration,
    cached: Mutex<Option<CachedPath>>,
}

impl PathResolver {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_candidates(runner, common_paths())
    }

    pub fn with_candidates(runner: Arc<dyn CommandRunner>, candidates: Vec<PathBuf>) -> Self {
        Self {
            runner,
            candidates,
            cache_ttl: PATH_CACHE_TTL,
            cached: Mutex::new(None),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, user_defined: Option<&str>) -> Result<ResolvedToolPath, ResolveError> {
        if let Some(path) = self.fresh_cached_path() {
            match self.validate(&path).await {
                Ok(()) => {
                    debug!(path = %path, "using cached gh path");
                    return Ok(ResolvedToolPath {
                        path,
                        method: ResolutionMethod::Cached,
                    });
                }
                Err(reason) => {
                    warn!(path = %path, reason = %reason, "cached gh path no longer valid");
                    self.clear_cache();
                }
            }
        }

        if let Some(path) = user_defined.map(str::trim).filter(|p| !p.is_empty()) {
            match self.validate(path).await {
                Ok(()) => return Ok(self.remember(path, ResolutionMethod::UserDefined)),
                Err(reason) => warn!(path = %path, reason = %reason, "configured gh path rejected"),
            }
        }

        for candidate in &self.candidates {
            let path = candidate.to_string_lossy();
            match self.validate(&path).await {
                Ok(()) => return Ok(self.remember(&path, ResolutionMethod::CommonPath)),
                Err(reason) => debug!(path = %path, reason = %reason, "candidate rejected"),
            }
        }

        match self.validate(PROGRAM).await {
            Ok(()) => {
                let resolved = match self.runner.locate(PROGRAM) {
                    Some(full) => {
                        self.remember(&full.to_string_lossy(), ResolutionMethod::EnvironmentPath)
                    }
                    None => ResolvedToolPath {
                        path: PROGRAM.to_string(),
                        method: ResolutionMethod::EnvironmentPath,
                    },
                };
                Ok(resolved)
            }
            Err(reason) => {
                debug!(reason = %reason, "gh not usable from search path");
                Err(ResolveError {
                    message: format!("{NOT_FOUND_MESSAGE} {}", installation_instructions()),
                })
            }
        }
    }

    /// Check that `path` runs and reports itself as the GitHub CLI.
    pub async fn validate(&self, path: &str) -> Result<(), String> {
        if is_concrete_path(path) {
            self.runner.check_executable(Path::new(path))?;
        }

        let output = self
            .runner
            .run(path, &["--version".to_string()], VERSION_PROBE_TIMEOUT)
            .await
            .map_err(|e| format!("GitHub CLI validation failed for {path}: {e}"))?;

        if !output.stdout.to_lowercase().contains(VERSION_MARKER) {
            let got: String = output.stdout.chars().take(100).collect();
            return Err(format!(
                "Invalid GitHub CLI executable. Expected \"{VERSION_MARKER}\" in output, got: {got}"
            ));
        }
        Ok(())
    }

    /// Forget the last-known-good path.
    pub fn clear_cache(&self) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
    }

    pub fn cache_status(&self) -> PathCacheStatus {
        let guard = self.cached.lock().ok();
        match guard.as_deref().and_then(Option::as_ref) {
            Some(entry) => PathCacheStatus {
                cached: true,
                path: Some(entry.path.clone()),
                age: Some(entry.validated_at.elapsed()),
            },
            None => PathCacheStatus {
                cached: false,
                path: None,
                age: None,
            },
        }
    }

    fn fresh_cached_path(&self) -> Option<String> {
        let guard = self.cached.lock().ok()?;
        Option::as_ref(&*guard)
            .filter(|c| c.validated_at.elapsed() < self.cache_ttl)
            .map(|c| c.path.clone())
    }

    fn remember(&self, path: &str, method: ResolutionMethod) -> ResolvedToolPath {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some(CachedPath {
                path: path.to_string(),
                validated_at: Instant::now(),
            });
        }
        debug!(path = %path, method = %method, "resolved gh path");
        ResolvedToolPath {
            path: path.to_string(),
            method,
        }
    }
}

fn is_concrete_path(path: &str) -> bool {
    path.contains('/') || path.contains('\\')
}

/// Platform-specific hint appended to the "not found" message.
pub fn installation_instructions() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install GitHub CLI using Homebrew: \"brew install gh\", or download from https://github.com/cli/cli/releases"
    } else if cfg!(windows) {
        "Install GitHub CLI using winget: \"winget install GitHub.cli\", or download from https://github.com/cli/cli/releases"
    } else if cfg!(target_os = "linux") {
        "Install GitHub CLI using your package manager or download from https://github.com/cli/cli/releases"
    } else {
        "Download GitHub CLI from https://github.com/cli/cli/releases"
    }
}

/// Well-known install locations, most likely first.
pub fn common_paths() -> Vec<PathBuf> {
    let home = dirs_next::home_dir();
    let mut paths = Vec::new();

    if cfg!(windows) {
        let program_files = std::env::var("PROGRAMFILES").unwrap_or_else(|_| "C:\\Program Files".to_string());
        paths.push(Path::new(&program_files).join("GitHub CLI").join("gh.exe"));
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            paths.push(Path::new(&local).join("GitHub CLI").join("gh.exe"));
        }
        paths.push(Path::new(&program_files).join("gh").join("gh.exe"));
    } else if cfg!(target_os = "macos") {
        paths.push(PathBuf::from("/opt/homebrew/bin/gh"));
        paths.push(PathBuf::from("/usr/local/bin/gh"));
        paths.push(PathBuf::from("/usr/bin/gh"));
        if let Some(home) = &home {
            paths.push(home.join(".local/bin/gh"));
        }
    } else {
        paths.push(PathBuf::from("/usr/bin/gh"));
        paths.push(PathBuf::from("/usr/local/bin/gh"));
        paths.push(PathBuf::from("/snap/bin/gh"));
        if let Some(home) = &home {
            paths.push(home.join(".local/bin/gh"));
            paths.push(home.join("bin/gh"));
        }
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::testing::{failure, is_version_probe, stdout, version_output, FakeRunner};

    fn version_everywhere() -> FakeRunner {
        FakeRunner::new(|_, args| {
            if is_version_probe(args) {
                version_output()
            } else {
                stdout("")
            }
        })
    }

    fn resolver(runner: Arc<FakeRunner>, candidates: &[&str]) -> PathResolver {
        PathResolver::with_candidates(runner, candidates.iter().map(PathBuf::from).collect())
    }

    #[tokio::test]
    async fn test_user_defined_path_wins() {
        let runner = Arc::new(
            version_everywhere()
                .with_executable("/custom/gh")
                .with_executable("/usr/bin/gh"),
        );
        let resolver = resolver(runner.clone(), &["/usr/bin/gh"]);

        let resolved = resolver.resolve(Some("/custom/gh")).await.unwrap();
        assert_eq!(resolved.path, "/custom/gh");
        assert_eq!(resolved.method, ResolutionMethod::UserDefined);
    }

    #[tokio::test]
    async fn test_invalid_user_path_falls_through_to_common_paths() {
        let runner = Arc::new(version_everywhere().with_executable("/usr/local/bin/gh"));
        let resolver = resolver(runner.clone(), &["/usr/bin/gh", "/usr/local/bin/gh"]);

        let resolved = resolver.resolve(Some("/missing/gh")).await.unwrap();
        assert_eq!(resolved.path, "/usr/local/bin/gh");
        assert_eq!(resolved.method, ResolutionMethod::CommonPath);
        // Missing files are rejected without spawning anything.
        assert!(runner.calls().iter().all(|c| c.program == "/usr/local/bin/gh"));
    }

    #[tokio::test]
    async fn test_second_resolve_uses_cache() {
        let runner = Arc::new(version_everywhere().with_executable("/usr/bin/gh"));
        let resolver = resolver(runner.clone(), &["/usr/bin/gh"]);

        resolver.resolve(None).await.unwrap();
        let second = resolver.resolve(None).await.unwrap();
        assert_eq!(second.method, ResolutionMethod::Cached);
        assert_eq!(second.path, "/usr/bin/gh");
        assert!(resolver.cache_status().cached);
    }

    #[tokio::test]
    async fn test_expired_cache_reruns_search() {
        let runner = Arc::new(version_everywhere().with_executable("/usr/bin/gh"));
        let resolver = resolver(runner.clone(), &["/usr/bin/gh"]).with_cache_ttl(Duration::ZERO);

        resolver.resolve(None).await.unwrap();
        let second = resolver.resolve(None).await.unwrap();
        assert_eq!(second.method, ResolutionMethod::CommonPath);
    }

    #[tokio::test]
    async fn test_environment_path_resolves_full_location() {
        let runner = Arc::new(version_everywhere().with_on_path("/home/me/tools/gh"));
        let resolver = resolver(runner.clone(), &["/usr/bin/gh"]);

        let resolved = resolver.resolve(None).await.unwrap();
        assert_eq!(resolved.path, "/home/me/tools/gh");
        assert_eq!(resolved.method, ResolutionMethod::EnvironmentPath);
        assert_eq!(resolver.cache_status().path.as_deref(), Some("/home/me/tools/gh"));
    }

    #[tokio::test]
    async fn test_environment_path_falls_back_to_bare_name() {
        let runner = Arc::new(version_everywhere());
        let resolver = resolver(runner.clone(), &[]);

        let resolved = resolver.resolve(None).await.unwrap();
        assert_eq!(resolved.path, PROGRAM);
        assert!(!resolver.cache_status().cached);
    }

    #[tokio::test]
    async fn test_nothing_found_reports_remediation() {
        let runner = Arc::new(FakeRunner::new(|program, _| {
            Err(crate::tool::RunError::NotFound {
                program: program.to_string(),
            })
        }));
        let resolver = resolver(runner.clone(), &["/usr/bin/gh"]);

        let err = resolver.resolve(Some("/custom/gh")).await.unwrap_err();
        assert!(err.message.contains("not found"));
        assert!(err.message.contains("https://github.com/cli/cli/releases"));
    }

    #[tokio::test]
    async fn test_validate_requires_version_marker() {
        let runner = Arc::new(FakeRunner::new(|_, _| stdout("git version 2.43.0")).with_executable("/usr/bin/gh"));
        let resolver = resolver(runner, &[]);

        let err = resolver.validate("/usr/bin/gh").await.unwrap_err();
        assert!(err.contains("Expected \"gh version\""));
    }

    #[tokio::test]
    async fn test_validate_surfaces_process_error() {
        let runner = Arc::new(FakeRunner::new(|_, _| failure("permission denied")));
        let resolver = resolver(runner, &[]);

        let err = resolver.validate("gh").await.unwrap_err();
        assert!(err.contains("permission denied"));
    }

    #[tokio::test]
    async fn test_validation_uses_probe_timeout() {
        let runner = Arc::new(version_everywhere());
        let resolver = resolver(runner.clone(), &[]);

        resolver.validate("gh").await.unwrap();
        assert_eq!(runner.calls()[0].timeout, VERSION_PROBE_TIMEOUT);
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let runner = Arc::new(version_everywhere().with_executable("/usr/bin/gh"));
        let resolver = resolver(runner, &["/usr/bin/gh"]);

        resolver.resolve(None).await.unwrap();
        resolver.clear_cache();
        assert_eq!(
            resolver.cache_status(),
            PathCacheStatus {
                cached: false,
                path: None,
                age: None
            }
        );
    }

    #[test]
    fn test_common_paths_not_empty() {
        assert!(!common_paths().is_empty());
    }
}
