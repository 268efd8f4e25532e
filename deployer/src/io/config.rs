//! Deployment configuration, stored by default in `.git/deploy.toml` so that
//! `git add -A` never stages it.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".git/deploy.toml";

/// Deployment configuration (TOML).
///
/// Every field is optional in the file; missing fields take the values the
/// workflow has always used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeployConfig {
    /// Remote to push to.
    pub remote: String,

    /// Branch to push.
    pub branch: String,

    /// Message for the deployment commit.
    pub commit_message: String,

    /// Hook directory, relative to the working directory unless absolute.
    pub hooks_dir: PathBuf,

    /// Hooks to disable for the duration of the run.
    pub hooks: Vec<String>,

    /// Appended to a hook's filename to disable it.
    pub disabled_suffix: String,

    /// `git ls-files -v` tag that marks an assume-unchanged file.
    pub locked_marker: char,

    /// Cap on captured stdout/stderr per git call.
    pub output_limit_bytes: usize,

    /// Kill git calls running longer than this. Unset waits forever. Output
    /// still held open by a killed call's own children is dropped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: "main".to_string(),
            commit_message: "Deploy: Complete styling updates".to_string(),
            hooks_dir: PathBuf::from(".git/hooks"),
            hooks: vec![
                "pre-merge".to_string(),
                "pre-pull".to_string(),
                "pre-rebase".to_string(),
            ],
            disabled_suffix: ".disabled".to_string(),
            locked_marker: 'h',
            output_limit_bytes: 1_000_000,
            command_timeout_secs: None,
        }
    }
}

impl DeployConfig {
    pub fn validate(&self) -> Result<()> {
        if self.remote.trim().is_empty() {
            return Err(anyhow!("remote must be non-empty"));
        }
        if self.branch.trim().is_empty() {
            return Err(anyhow!("branch must be non-empty"));
        }
        if self.commit_message.trim().is_empty() {
            return Err(anyhow!("commit_message must be non-empty"));
        }
        if self.disabled_suffix.is_empty() {
            return Err(anyhow!("disabled_suffix must be non-empty"));
        }
        if self.disabled_suffix.contains(['/', '\\']) {
            return Err(anyhow!("disabled_suffix must not contain path separators"));
        }
        let mut seen = HashSet::new();
        for hook in &self.hooks {
            if hook.trim().is_empty() || hook.contains(['/', '\\']) || hook == ".." {
                return Err(anyhow!("invalid hook name '{hook}'"));
            }
            if !seen.insert(hook.as_str()) {
                return Err(anyhow!("duplicate hook name '{hook}'"));
            }
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.command_timeout_secs == Some(0) {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    /// Hook directory resolved against `workdir`.
    pub fn hooks_dir_in(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.hooks_dir)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DeployConfig::default()`.
pub fn load_config(path: &Path) -> Result<DeployConfig> {
    if !path.exists() {
        let cfg = DeployConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DeployConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

pub fn render_config(cfg: &DeployConfig) -> Result<String> {
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    Ok(buf)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &DeployConfig) -> Result<()> {
    cfg.validate()?;
    let buf = render_config(cfg)?;
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
