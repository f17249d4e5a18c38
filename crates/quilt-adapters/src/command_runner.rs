//! External program execution.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, instrument};

use crate::interrupt::{Interrupt, wait_with_output};

use quilt_core::{
    application::{ApplicationError, ports::CommandRunner},
    error::QuiltResult,
};

fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs programs as child processes, capturing their output.
#[derive(Debug, Clone, Default)]
pub struct ProcessCommandRunner {
    interrupt: Interrupt,
}

impl ProcessCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the running program, and refuse to start more, once
    /// `interrupt` is raised.
    pub fn with_interrupt(mut self, interrupt: &Interrupt) -> Self {
        self.interrupt = interrupt.clone();
        self
    }
}

impl CommandRunner for ProcessCommandRunner {
    #[instrument(skip_all, fields(program = %program, cwd = %cwd.display()))]
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> QuiltResult<()> {
        let line = command_line(program, args);
        info!(command = %line, "Running command");

        let failed = |reason: String| ApplicationError::CommandFailed {
            command: line.clone(),
            reason,
        };
        if self.interrupt.is_raised() {
            return Err(failed("interrupted".into()).into());
        }

        let child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failed(e.to_string()))?;
        let waited = wait_with_output(child, &self.interrupt).map_err(|e| failed(e.to_string()))?;
        let Some(output) = waited else {
            return Err(failed("interrupted".into()).into());
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        for l in stdout.lines() {
            debug!(target: "quilt::command", "{l}");
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let status = match output.status.code() {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        };
        let reason = match stderr.trim() {
            "" => status,
            detail => format!("{status}: {detail}"),
        };
        Err(ApplicationError::CommandFailed {
            command: line,
            reason,
        }
        .into())
    }
}

/// A command a dry run would have executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommand {
    pub command: String,
    pub cwd: PathBuf,
}

/// Records commands instead of running them. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct DryRunCommandRunner {
    planned: Arc<Mutex<Vec<PlannedCommand>>>,
}

impl DryRunCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands seen so far, in order.
    pub fn planned(&self) -> Vec<PlannedCommand> {
        self.planned
            .lock()
            .map(|planned| planned.clone())
            .unwrap_or_default()
    }
}

impl CommandRunner for DryRunCommandRunner {
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> QuiltResult<()> {
        let command = command_line(program, args);
        info!(command = %command, "Dry run: not executing");
        self.planned
            .lock()
            .map_err(|_| ApplicationError::LockPoisoned)?
            .push(PlannedCommand {
                command,
                cwd: cwd.to_path_buf(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quilt_core::error::QuiltError;

    fn args(a: &[&str]) -> Vec<String> {
        a.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn dry_run_records_in_order() {
        let runner = DryRunCommandRunner::new();
        let observer = runner.clone();
        runner
            .run("bin/rails", &args(&["db:prepare"]), Path::new("/app"))
            .unwrap();
        runner.run("bundle", &[], Path::new("/app")).unwrap();

        assert_eq!(
            observer.planned(),
            vec![
                PlannedCommand {
                    command: "bin/rails db:prepare".into(),
                    cwd: PathBuf::from("/app"),
                },
                PlannedCommand {
                    command: "bundle".into(),
                    cwd: PathBuf::from("/app"),
                },
            ]
        );
    }

    #[test]
    fn missing_program_is_command_failed() {
        let err = ProcessCommandRunner::new()
            .run("quilt-no-such-program", &[], Path::new("."))
            .unwrap_err();
        assert!(matches!(
            err,
            QuiltError::Application(ApplicationError::CommandFailed { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn runs_in_the_given_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        ProcessCommandRunner::new()
            .run("sh", &args(&["-c", "touch marker"]), dir.path())
            .unwrap();
        assert!(dir.path().join("marker").is_file());
    }

    #[test]
    fn raised_interrupt_refuses_to_start() {
        let interrupt = Interrupt::new();
        interrupt.raise();
        let dir = tempfile::TempDir::new().unwrap();
        let err = ProcessCommandRunner::new()
            .with_interrupt(&interrupt)
            .run("sh", &args(&["-c", "touch marker"]), dir.path())
            .unwrap_err();
        match err {
            QuiltError::Application(ApplicationError::CommandFailed { reason, .. }) => {
                assert_eq!(reason, "interrupted");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!dir.path().join("marker").exists());
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_reports_status_and_stderr() {
        let err = ProcessCommandRunner::new()
            .run("sh", &args(&["-c", "echo boom >&2; exit 3"]), Path::new("."))
            .unwrap_err();
        match err {
            QuiltError::Application(ApplicationError::CommandFailed { command, reason }) => {
                assert_eq!(command, "sh -c echo boom >&2; exit 3");
                assert_eq!(reason, "exit status 3: boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
