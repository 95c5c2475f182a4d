//! Locating and running the GitHub CLI.

pub mod resolver;
pub mod runner;
#[cfg(test)]
pub mod testing;

pub use resolver::{PathCacheStatus, PathResolver, ResolutionMethod, ResolveError, ResolvedToolPath};
pub use runner::{CommandOutput, CommandRunner, RunError, SystemRunner};
