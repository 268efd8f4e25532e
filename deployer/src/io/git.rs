//! Git adapter for the deployment sequence.
//!
//! The sequencer only needs five git subcommands, so we keep a small, explicit
//! wrapper around `git` subprocess calls behind the [`GitOps`] seam.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::io::process::{CommandOutput, run_command};

pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

/// Exit status and captured text from one git invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Bytes of stdout dropped by the output cap.
    pub stdout_truncated: usize,
}

impl GitOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
            stdout_truncated: 0,
        }
    }

    pub fn failed(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            stdout_truncated: 0,
        }
    }
}

impl From<CommandOutput> for GitOutput {
    fn from(output: CommandOutput) -> Self {
        let mut stderr = output.stderr_lossy();
        if output.timed_out {
            stderr.push_str("\n[git timed out]\n");
        }
        Self {
            success: output.success(),
            code: output.status.code(),
            stdout: output.stdout_lossy(),
            stderr,
            stdout_truncated: output.stdout_truncated,
        }
    }
}

/// The git operations the deployment sequence depends on.
///
/// `Err` means git could not be run at all; a nonzero exit is a successful
/// call returning `GitOutput { success: false, .. }`.
pub trait GitOps {
    /// `git ls-files -v -z`
    fn ls_files_verbose(&self) -> Result<GitOutput>;
    /// `git update-index --no-assume-unchanged -- <path>`
    fn no_assume_unchanged(&self, path: &str) -> Result<GitOutput>;
    /// `git add -A`
    fn add_all(&self) -> Result<GitOutput>;
    /// `git commit --no-verify -m <message>`
    fn commit_no_verify(&self, message: &str) -> Result<GitOutput>;
    /// `git push <remote> <branch>`
    fn push(&self, remote: &str, branch: &str) -> Result<GitOutput>;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            timeout: None,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }

    /// Kill any git call that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit_bytes = bytes;
        self
    }

    /// Build a git command in the working directory.
    ///
    /// Messages are pinned to the C locale: commit classification matches
    /// git's English output.
    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.workdir)
            .env("LC_ALL", "C")
            .env("LANGUAGE", "C");
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<GitOutput> {
        self.run_limited(args, self.output_limit_bytes)
    }

    fn run_limited(&self, args: &[&str], output_limit_bytes: usize) -> Result<GitOutput> {
        debug!(args = %args.join(" "), "running git");
        let output = run_command(self.command(args), self.timeout, output_limit_bytes)
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        Ok(output.into())
    }
}

impl GitOps for Git {
    #[instrument(skip_all)]
    fn ls_files_verbose(&self) -> Result<GitOutput> {
        // Every entry is needed; a cut listing would hide locked files.
        self.run_limited(&["ls-files", "-v", "-z"], usize::MAX)
    }

    #[instrument(skip_all, fields(path))]
    fn no_assume_unchanged(&self, path: &str) -> Result<GitOutput> {
        self.run(&["update-index", "--no-assume-unchanged", "--", path])
    }

    #[instrument(skip_all)]
    fn add_all(&self) -> Result<GitOutput> {
        self.run(&["add", "-A"])
    }

    #[instrument(skip_all)]
    fn commit_no_verify(&self, message: &str) -> Result<GitOutput> {
        self.run(&["commit", "--no-verify", "-m", message])
    }

    #[instrument(skip_all, fields(remote, branch))]
    fn push(&self, remote: &str, branch: &str) -> Result<GitOutput> {
        self.run(&["push", remote, branch])
    }
}
