//! Temporary hook disabling by rename.
//!
//! A hook is *enabled* at `<dir>/<name>` and *disabled* at
//! `<dir>/<name><suffix>`. [`disable_hooks`] returns a [`HookGuard`] recording
//! exactly the hooks it renamed; the guard restores them on
//! [`HookGuard::restore`] or, failing that, when dropped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Canonical and disabled locations for hooks in one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookPaths {
    dir: PathBuf,
    suffix: String,
}

impl HookPaths {
    pub fn new(dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.into(),
        }
    }

    pub fn enabled(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn disabled(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{}", self.suffix))
    }
}

/// One reportable hook transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    Disabled(String),
    DisableFailed { name: String, error: String },
    Restored(String),
    RestoreFailed { name: String, error: String },
    /// Both the canonical and the disabled copy exist; neither was touched.
    Conflict(String),
}

impl HookEvent {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            HookEvent::DisableFailed { .. } | HookEvent::RestoreFailed { .. }
        )
    }
}

/// Rename every present hook in `names` to its disabled form.
///
/// Hooks with no canonical file are skipped without an event. A failed
/// rename is reported and does not stop the remaining hooks.
pub fn disable_hooks(paths: HookPaths, names: &[String]) -> (HookGuard, Vec<HookEvent>) {
    let mut guard = HookGuard {
        paths,
        recorded: Vec::new(),
        released: false,
        rename,
    };
    let mut events = Vec::new();
    for name in names {
        let enabled = guard.paths.enabled(name);
        if !exists(&enabled) {
            debug!(hook = %name, "hook not present, skipping");
            continue;
        }
        match rename(&enabled, &guard.paths.disabled(name)) {
            Ok(()) => {
                debug!(hook = %name, "hook disabled");
                guard.recorded.push(name.clone());
                events.push(HookEvent::Disabled(name.clone()));
            }
            Err(err) => {
                warn!(hook = %name, err = %format!("{err:#}"), "failed to disable hook");
                events.push(HookEvent::DisableFailed {
                    name: name.clone(),
                    error: format!("{err:#}"),
                });
            }
        }
    }
    (guard, events)
}

type RenameFn = fn(&Path, &Path) -> Result<()>;

/// Record of hooks disabled by this run; restores them when released.
#[derive(Debug)]
pub struct HookGuard {
    paths: HookPaths,
    recorded: Vec<String>,
    released: bool,
    rename: RenameFn,
}

impl HookGuard {
    /// Hooks this guard disabled, in the order they were renamed.
    pub fn disabled(&self) -> &[String] {
        &self.recorded
    }

    /// Restore recorded hooks, plus any hook in `names` left disabled by an
    /// earlier interrupted run. Walks `names` in order; hooks with neither a
    /// record nor a disabled copy are skipped without an event.
    pub fn restore(mut self, names: &[String]) -> Vec<HookEvent> {
        self.released = true;
        let mut events = Vec::new();
        for name in names {
            let recorded = self.recorded.contains(name);
            let disabled = self.paths.disabled(name);
            if !exists(&disabled) {
                if recorded {
                    events.push(HookEvent::RestoreFailed {
                        name: name.clone(),
                        error: format!("{} no longer exists", disabled.display()),
                    });
                }
                continue;
            }
            if !recorded {
                debug!(hook = %name, "restoring hook left disabled by an earlier run");
            }
            if exists(&self.paths.enabled(name)) {
                warn!(hook = %name, "enabled and disabled copies both present");
                events.push(HookEvent::Conflict(name.clone()));
                continue;
            }
            events.push(restore_one(&self.paths, name, self.rename));
        }
        events
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        for name in &self.recorded {
            if exists(&self.paths.enabled(name)) {
                warn!(hook = %name, "hook already present, not restoring on drop");
                continue;
            }
            match restore_one(&self.paths, name, self.rename) {
                HookEvent::Restored(_) => warn!(hook = %name, "hook restored on drop"),
                other => warn!(hook = %name, event = ?other, "hook restore on drop failed"),
            }
        }
    }
}

fn restore_one(paths: &HookPaths, name: &str, rename: RenameFn) -> HookEvent {
    match rename(&paths.disabled(name), &paths.enabled(name)) {
        Ok(()) => {
            debug!(hook = %name, "hook re-enabled");
            HookEvent::Restored(name.to_string())
        }
        Err(err) => HookEvent::RestoreFailed {
            name: name.to_string(),
            error: format!("{err:#}"),
        },
    }
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to)
        .with_context(|| format!("rename {} -> {}", from.display(), to.display()))
}
