//! Scripted stand-in for [`CommandRunner`] used across the unit tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{CommandOutput, CommandRunner, RunError};

type Handler = dyn Fn(&str, &[String]) -> Result<CommandOutput, RunError> + Send + Sync;

/// One recorded call to [`FakeRunner::run`].
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn is_version_probe(&self) -> bool {
        self.args.iter().any(|a| a == "--version")
    }
}

pub struct FakeRunner {
    handler: Box<Handler>,
    executables: Vec<PathBuf>,
    on_path: Option<PathBuf>,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeRunner {
    pub fn new(
        handler: impl Fn(&str, &[String]) -> Result<CommandOutput, RunError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            executables: Vec::new(),
            on_path: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Mark `path` as an existing executable file.
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executables.push(path.into());
        self
    }

    /// Make `locate` report `path` for any program.
    pub fn with_on_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.on_path = Some(path.into());
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than `--version` probes.
    pub fn data_calls(&self) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| !c.is_version_probe())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        self.calls.lock().unwrap().push(Invocation {
            program: program.to_string(),
            args: args.to_vec(),
            timeout,
        });
        (self.handler)(program, args)
    }

    fn check_executable(&self, path: &Path) -> Result<(), String> {
        if self.executables.iter().any(|p| p == path) {
            Ok(())
        } else {
            Err(format!(
                "File does not exist or is not executable: {}",
                path.display()
            ))
        }
    }

    fn locate(&self, _program: &str) -> Option<PathBuf> {
        self.on_path.clone()
    }
}

pub fn stdout(text: &str) -> Result<CommandOutput, RunError> {
    Ok(CommandOutput {
        stdout: text.to_string(),
        stderr: String::new(),
    })
}

pub fn failure(stderr: &str) -> Result<CommandOutput, RunError> {
    Err(RunError::Failed {
        code: Some(1),
        stderr: stderr.to_string(),
    })
}

pub fn version_output() -> Result<CommandOutput, RunError> {
    stdout("gh version 2.40.1 (2023-12-13)\nhttps://github.com/cli/cli/releases/tag/v2.40.1\n")
}

pub fn is_version_probe(args: &[String]) -> bool {
    args.iter().any(|a| a == "--version")
}
