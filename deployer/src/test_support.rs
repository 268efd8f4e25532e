//! Test-only helpers: a scripted git fake and a throwaway repository fixture.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::io::git::{GitOps, GitOutput};

/// A git call observed by [`ScriptedGit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LsFiles,
    Unlock(String),
    AddAll,
    Commit(String),
    Push { remote: String, branch: String },
}

/// [`GitOps`] fake returning fixed outputs and recording every call.
///
/// Defaults: empty listing, and every other call exits zero with no output.
pub struct ScriptedGit {
    ls_files: GitOutput,
    unlock: GitOutput,
    add: GitOutput,
    commit: GitOutput,
    push: GitOutput,
    calls: RefCell<Vec<Call>>,
    hooks_dir: Option<PathBuf>,
    hooks_at_commit: RefCell<Option<Vec<String>>>,
}

impl Default for ScriptedGit {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGit {
    pub fn new() -> Self {
        Self {
            ls_files: GitOutput::ok(""),
            unlock: GitOutput::ok(""),
            add: GitOutput::ok(""),
            commit: GitOutput::ok(""),
            push: GitOutput::ok(""),
            calls: RefCell::new(Vec::new()),
            hooks_dir: None,
            hooks_at_commit: RefCell::new(None),
        }
    }

    pub fn with_ls_files(mut self, out: GitOutput) -> Self {
        self.ls_files = out;
        self
    }

    pub fn with_unlock(mut self, out: GitOutput) -> Self {
        self.unlock = out;
        self
    }

    pub fn with_add(mut self, out: GitOutput) -> Self {
        self.add = out;
        self
    }

    pub fn with_commit(mut self, out: GitOutput) -> Self {
        self.commit = out;
        self
    }

    pub fn with_push(mut self, out: GitOutput) -> Self {
        self.push = out;
        self
    }

    /// Snapshot the file names in `dir` when the commit call happens.
    pub fn observe_hooks(mut self, dir: PathBuf) -> Self {
        self.hooks_dir = Some(dir);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Sorted file names seen in the observed hook directory at commit time.
    pub fn hooks_seen_at_commit(&self) -> Option<Vec<String>> {
        self.hooks_at_commit.borrow().clone()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl GitOps for ScriptedGit {
    fn ls_files_verbose(&self) -> Result<GitOutput> {
        self.record(Call::LsFiles);
        Ok(self.ls_files.clone())
    }

    fn no_assume_unchanged(&self, path: &str) -> Result<GitOutput> {
        self.record(Call::Unlock(path.to_string()));
        Ok(self.unlock.clone())
    }

    fn add_all(&self) -> Result<GitOutput> {
        self.record(Call::AddAll);
        Ok(self.add.clone())
    }

    fn commit_no_verify(&self, message: &str) -> Result<GitOutput> {
        self.record(Call::Commit(message.to_string()));
        if let Some(dir) = &self.hooks_dir {
            *self.hooks_at_commit.borrow_mut() = Some(list_dir(dir)?);
        }
        Ok(self.commit.clone())
    }

    fn push(&self, remote: &str, branch: &str) -> Result<GitOutput> {
        self.record(Call::Push {
            remote: remote.to_string(),
            branch: branch.to_string(),
        });
        Ok(self.push.clone())
    }
}

fn list_dir(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry.context("read dir entry")?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// A working repository on branch `main` with a bare `origin` remote, both in a tempdir.
pub struct TestRepo {
    _temp: TempDir,
    root: PathBuf,
    remote: PathBuf,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let root = temp.path().join("work");
        let remote = temp.path().join("origin.git");
        fs::create_dir_all(&root).with_context(|| format!("create {}", root.display()))?;
        fs::create_dir_all(&remote).with_context(|| format!("create {}", remote.display()))?;

        run_git(&remote, &["init", "--bare", "--quiet"])?;
        run_git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"])?;

        run_git(&root, &["init", "--quiet"])?;
        run_git(&root, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        run_git(&root, &["config", "user.name", "Deployer Test"])?;
        run_git(&root, &["config", "user.email", "deployer-test@local.invalid"])?;
        run_git(&root, &["config", "commit.gpgsign", "false"])?;
        run_git(&root, &["config", "core.hooksPath", ".git/hooks"])?;
        let remote_arg = remote.to_string_lossy().into_owned();
        run_git(&root, &["remote", "add", "origin", &remote_arg])?;

        Ok(Self {
            _temp: temp,
            root,
            remote,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn hooks_dir(&self) -> PathBuf {
        self.root.join(".git").join("hooks")
    }

    /// Run git in the working repository, failing on nonzero exit.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        run_git(&self.root, args)
    }

    pub fn write_file(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.git(&["add", "-A"])?;
        self.git(&["commit", "--quiet", "-m", message])?;
        Ok(())
    }

    /// Install an executable hook that always fails.
    pub fn install_failing_hook(&self, name: &str) -> Result<PathBuf> {
        let dir = self.hooks_dir();
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\necho \"blocked by hook\" >&2\nexit 1\n")
            .with_context(|| format!("write {}", path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perm = fs::metadata(&path)
                .with_context(|| format!("stat {}", path.display()))?
                .permissions();
            perm.set_mode(0o755);
            fs::set_permissions(&path, perm)
                .with_context(|| format!("chmod {}", path.display()))?;
        }
        Ok(path)
    }

    /// Commit subjects on the remote `main` branch, newest first.
    pub fn remote_log(&self) -> Result<Vec<String>> {
        let out = run_git(&self.remote, &["log", "--format=%s", "main"])?;
        Ok(out.lines().map(str::to_string).collect())
    }
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !out.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&out.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&out.stdout).to_string())
}
