//! Blocking git command builder.
//!
//! A small fluent wrapper over `std::process::Command` so every git
//! invocation is logged, located and error-mapped the same way.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, trace};

use crate::interrupt::{Interrupt, wait_with_output};

/// Failures running git.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("git executable '{program}' not found in PATH")]
    NotInstalled { program: String },

    #[error("failed to start git {operation}: {source}")]
    Spawn {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("git {operation} failed: {stderr}")]
    Failed { operation: String, stderr: String },

    #[error("git {operation} interrupted")]
    Interrupted { operation: String },
}

/// Captured output of a successful command.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Builder for a single git invocation.
#[derive(Debug, Clone)]
pub struct GitCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    context: Option<String>,
    interrupt: Interrupt,
}

impl GitCommand {
    /// A command for the git executable named `program`.
    ///
    /// Prompts are disabled so a fetch that needs credentials fails instead
    /// of waiting for input.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            context: None,
            interrupt: Interrupt::new(),
        }
        .env("GIT_TERMINAL_PROMPT", "0")
    }

    /// Run inside `dir` (passed to git as `-C`).
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Kill the process and fail with [`GitError::Interrupted`] once
    /// `interrupt` is raised.
    pub fn interruptible(mut self, interrupt: &Interrupt) -> Self {
        self.interrupt = interrupt.clone();
        self
    }

    /// Label used in log lines.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// `git clone --depth 1 --quiet [--branch <ref>] <url> <target>`
    pub fn shallow_clone(
        program: impl Into<String>,
        url: &str,
        git_ref: Option<&str>,
        target: impl AsRef<Path>,
    ) -> Self {
        let mut cmd = Self::new(program).args(["clone", "--depth", "1", "--quiet"]);
        if let Some(git_ref) = git_ref {
            cmd = cmd.args(["--branch", git_ref]);
        }
        cmd.arg(url).arg(target.as_ref().display().to_string())
    }

    /// `git clone --quiet <url> <target>`
    pub fn full_clone(program: impl Into<String>, url: &str, target: impl AsRef<Path>) -> Self {
        Self::new(program)
            .args(["clone", "--quiet", url])
            .arg(target.as_ref().display().to_string())
    }

    /// `git checkout --quiet <ref>`
    pub fn checkout(program: impl Into<String>, git_ref: &str) -> Self {
        Self::new(program).args(["checkout", "--quiet", git_ref])
    }

    fn operation(&self) -> String {
        self.args.first().cloned().unwrap_or_else(|| "unknown".into())
    }

    /// Run to completion, capturing output.
    pub fn execute(self) -> Result<GitOutput, GitError> {
        let start = Instant::now();
        let operation = self.operation();
        if self.interrupt.is_raised() {
            return Err(GitError::Interrupted { operation });
        }
        let executable = which::which(&self.program).map_err(|_| GitError::NotInstalled {
            program: self.program.clone(),
        })?;

        let mut full_args = Vec::new();
        if let Some(dir) = &self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());

        match &self.context {
            Some(ctx) => debug!(target: "git", "({}) Executing command: git {}", ctx, full_args.join(" ")),
            None => debug!(target: "git", "Executing command: git {}", full_args.join(" ")),
        }

        let mut cmd = Command::new(executable);
        cmd.args(&full_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env_vars {
            trace!(target: "git", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }

        let spawn_error = |source| GitError::Spawn {
            operation: operation.clone(),
            source,
        };
        let child = cmd.spawn().map_err(spawn_error)?;
        let Some(output) = wait_with_output(child, &self.interrupt).map_err(spawn_error)? else {
            return Err(GitError::Interrupted { operation });
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            debug!(target: "git", "Command failed with exit code: {:?}", output.status.code());
            let stderr = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(GitError::Failed {
                operation,
                stderr: stderr.trim().to_string(),
            });
        }

        debug!(target: "git::perf", "Git {} took {}ms", operation, start.elapsed().as_millis());
        Ok(GitOutput { stdout, stderr })
    }
}

/// Whether `program` can be found on PATH.
pub fn is_available(program: &str) -> bool {
    which::which(program).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_clone_with_ref() {
        let cmd = GitCommand::shallow_clone("git", "https://x.org/r.git", Some("v2"), "/tmp/out");
        assert_eq!(
            cmd.args,
            vec!["clone", "--depth", "1", "--quiet", "--branch", "v2", "https://x.org/r.git", "/tmp/out"]
        );
    }

    #[test]
    fn shallow_clone_without_ref() {
        let cmd = GitCommand::shallow_clone("git", "https://x.org/r.git", None, "/tmp/out");
        assert_eq!(
            cmd.args,
            vec!["clone", "--depth", "1", "--quiet", "https://x.org/r.git", "/tmp/out"]
        );
    }

    #[test]
    fn prompts_are_disabled() {
        let cmd = GitCommand::new("git");
        assert!(cmd
            .env_vars
            .contains(&("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())));
    }

    #[test]
    fn raised_interrupt_stops_before_spawning() {
        let interrupt = Interrupt::new();
        interrupt.raise();
        let err = GitCommand::new("git")
            .arg("--version")
            .interruptible(&interrupt)
            .execute()
            .unwrap_err();
        assert!(matches!(err, GitError::Interrupted { .. }));
    }

    #[test]
    fn missing_program_is_not_installed() {
        let err = GitCommand::new("quilt-no-such-git")
            .arg("--version")
            .execute()
            .unwrap_err();
        assert!(matches!(err, GitError::NotInstalled { .. }));
    }
}
