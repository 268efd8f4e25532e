//! Orchestration for a single deployment run.
//!
//! Six steps run in order. A failing step is reported and the sequence moves
//! on; only console write errors end the run early, and even then the hook
//! guard puts disabled hooks back.

use std::io::Write;
use std::path::Path;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument};

use crate::core::ls_files::locked_paths;
use crate::core::outcome::{classify_commit, classify_push};
use crate::core::types::{CommitOutcome, PushOutcome, RunReport, Step, StepStatus};
use crate::io::config::{DeployConfig, load_config};
use crate::io::console::Console;
use crate::io::git::{Git, GitOps};
use crate::io::hooks::{HookEvent, HookPaths, disable_hooks};

/// Run the full sequence in `root` against `git`, writing progress to `console`.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn run_deploy<G: GitOps, W: Write>(
    root: &Path,
    cfg: &DeployConfig,
    git: &G,
    console: &mut Console<W>,
) -> Result<RunReport> {
    let mut report = RunReport::default();

    console.header(Step::Unlock)?;
    match unlock_files(git, cfg.locked_marker) {
        Ok(count) => {
            report.unlocked = count;
            console.success(&format!("Unlocked {count} files"))?;
            report.record(Step::Unlock, StepStatus::Succeeded);
        }
        Err(err) => {
            console.failure(&format!("Unlock failed: {err:#}"))?;
            report.record(Step::Unlock, StepStatus::Failed);
        }
    }

    console.header(Step::DisableHooks)?;
    let paths = HookPaths::new(cfg.hooks_dir_in(root), cfg.disabled_suffix.as_str());
    let (guard, events) = disable_hooks(paths, &cfg.hooks);
    report.disabled_hooks = guard.disabled().to_vec();
    write_hook_events(console, &events)?;
    report.record(Step::DisableHooks, hook_status(&events));

    console.header(Step::Stage)?;
    let staged = match git.add_all() {
        Ok(out) if out.success => console.success("Changes staged").map(|()| true),
        Ok(out) => report_failure(console, "Staging failed", &out.stderr).map(|()| false),
        Err(err) => console
            .failure(&format!("Staging failed: {err:#}"))
            .map(|()| false),
    }?;
    report.record(
        Step::Stage,
        if staged {
            StepStatus::Succeeded
        } else {
            StepStatus::Failed
        },
    );

    console.header(Step::Commit)?;
    let commit = match git.commit_no_verify(&cfg.commit_message) {
        Ok(out) => classify_commit(out.success, &out.stdout, &out.stderr),
        Err(err) => CommitOutcome::Rejected(format!("{err:#}")),
    };
    match &commit {
        CommitOutcome::Committed => console.success("Committed")?,
        CommitOutcome::NothingToCommit => console.warning("No changes to commit")?,
        CommitOutcome::Rejected(stderr) => report_failure(console, "Commit failed", stderr)?,
    }
    report.record(Step::Commit, commit.status());
    report.commit = Some(commit);

    console.header(Step::Push)?;
    let push = match git.push(&cfg.remote, &cfg.branch) {
        Ok(out) => classify_push(out.success, &out.stdout, &out.stderr),
        Err(err) => PushOutcome::Failed(format!("{err:#}")),
    };
    match &push {
        PushOutcome::Pushed(stdout) => {
            console.success("Pushed successfully")?;
            echo(console, stdout)?;
        }
        PushOutcome::Failed(stderr) => report_failure(console, "Push failed", stderr)?,
    }
    report.record(Step::Push, push.status());
    report.push = Some(push);

    console.header(Step::EnableHooks)?;
    let events = guard.restore(&cfg.hooks);
    report.restored_hooks = events
        .iter()
        .filter_map(|event| match event {
            HookEvent::Restored(name) => Some(name.clone()),
            _ => None,
        })
        .collect();
    write_hook_events(console, &events)?;
    report.record(Step::EnableHooks, hook_status(&events));

    console.complete()?;
    info!(clean = report.is_clean(), "deployment finished");
    Ok(report)
}

/// Load config from `config_path` and run against the real `git` in `root`.
pub fn deploy_from_root<W: Write>(
    root: &Path,
    config_path: &Path,
    console: &mut Console<W>,
) -> Result<RunReport> {
    let cfg = load_config(config_path)?;
    let git = Git::new(root)
        .with_timeout(cfg.command_timeout())
        .with_output_limit(cfg.output_limit_bytes);
    run_deploy(root, &cfg, &git, console)
}

/// Clear the assume-unchanged bit on every locked file; returns the candidate count.
fn unlock_files<G: GitOps>(git: &G, marker: char) -> Result<usize> {
    let listing = git.ls_files_verbose()?;
    if !listing.success {
        return Err(anyhow!("git ls-files failed: {}", listing.stderr.trim()));
    }
    if listing.stdout_truncated > 0 {
        return Err(anyhow!(
            "git ls-files output truncated ({} bytes dropped)",
            listing.stdout_truncated
        ));
    }
    let locked = locked_paths(&listing.stdout, marker)?;
    for path in &locked {
        match git.no_assume_unchanged(path) {
            Ok(out) if out.success => debug!(path = %path, "unlocked"),
            Ok(out) => debug!(path = %path, code = ?out.code, "unlock exited nonzero"),
            Err(err) => debug!(path = %path, err = %format!("{err:#}"), "unlock failed"),
        }
    }
    Ok(locked.len())
}

fn write_hook_events<W: Write>(console: &mut Console<W>, events: &[HookEvent]) -> Result<()> {
    for event in events {
        match event {
            HookEvent::Disabled(name) => console.success(&format!("{name} disabled"))?,
            HookEvent::DisableFailed { name, error } => {
                console.failure(&format!("{name} could not be disabled: {error}"))?;
            }
            HookEvent::Restored(name) => console.success(&format!("{name} re-enabled"))?,
            HookEvent::RestoreFailed { name, error } => {
                console.failure(&format!("{name} could not be re-enabled: {error}"))?;
            }
            HookEvent::Conflict(name) => console.warning(&format!(
                "{name} has both enabled and disabled copies; leaving both"
            ))?,
        }
    }
    Ok(())
}

fn hook_status(events: &[HookEvent]) -> StepStatus {
    if events.is_empty() {
        StepStatus::Skipped
    } else if events.iter().any(HookEvent::is_failure) {
        StepStatus::Failed
    } else {
        StepStatus::Succeeded
    }
}

fn report_failure<W: Write>(console: &mut Console<W>, msg: &str, stderr: &str) -> Result<()> {
    console.failure(msg)?;
    echo(console, stderr)
}

/// Echo captured output without its trailing newline; empty output prints nothing.
fn echo<W: Write>(console: &mut Console<W>, text: &str) -> Result<()> {
    let text = text.trim_end_matches(['\r', '\n']);
    if text.is_empty() {
        return Ok(());
    }
    console.verbatim(text)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::io::git::GitOutput;
    use crate::test_support::{Call, ScriptedGit};

    fn run(git: &ScriptedGit, root: &Path) -> (RunReport, String) {
        let mut console = Console::new(Vec::new());
        let report = run_deploy(root, &DeployConfig::default(), git, &mut console).expect("run");
        let text = String::from_utf8(console.into_inner()).expect("utf8");
        (report, text)
    }

    fn hooks_dir(root: &Path) -> std::path::PathBuf {
        let dir = root.join(".git/hooks");
        fs::create_dir_all(&dir).expect("hooks dir");
        dir
    }

    #[test]
    fn two_locked_files_are_unlocked() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = ScriptedGit::new().with_ls_files(GitOutput::ok("h a.txt\0H b.txt\0h c d.txt\0"));

        let (report, text) = run(&git, temp.path());

        assert!(text.contains("✓ Unlocked 2 files\n"));
        assert_eq!(report.unlocked, 2);
        let unlocked: Vec<Call> = git
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Unlock(_)))
            .collect();
        assert_eq!(
            unlocked,
            vec![
                Call::Unlock("a.txt".to_string()),
                Call::Unlock("c d.txt".to_string())
            ]
        );
    }

    #[test]
    fn unlock_failures_are_not_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = ScriptedGit::new()
            .with_ls_files(GitOutput::ok("h a.txt\0"))
            .with_unlock(GitOutput::failed(128, "", "fatal: unable to mark"));

        let (report, text) = run(&git, temp.path());
        assert!(text.contains("✓ Unlocked 1 files\n"));
        assert!(!text.contains("unable to mark"));
        assert_eq!(report.status_of(Step::Unlock), Some(StepStatus::Succeeded));
    }

    #[test]
    fn malformed_listing_fails_step_one_and_continues() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = ScriptedGit::new().with_ls_files(GitOutput::ok("h\0"));

        let (report, text) = run(&git, temp.path());
        assert!(text.contains("✗ Unlock failed: unexpected ls-files entry"));
        assert_eq!(report.status_of(Step::Unlock), Some(StepStatus::Failed));
        assert_eq!(report.steps.len(), 6);
        assert!(git.calls().contains(&Call::Push {
            remote: "origin".to_string(),
            branch: "main".to_string()
        }));
    }

    #[test]
    fn truncated_listing_fails_step_one_without_unlocking() {
        let temp = tempfile::tempdir().expect("tempdir");
        let listing = GitOutput {
            stdout_truncated: 4096,
            ..GitOutput::ok("h a.txt\0h b/partial-na")
        };
        let git = ScriptedGit::new().with_ls_files(listing);

        let (report, text) = run(&git, temp.path());
        assert!(text.contains("✗ Unlock failed: git ls-files output truncated (4096 bytes dropped)"));
        assert!(!text.contains("Unlocked"));
        assert_eq!(report.status_of(Step::Unlock), Some(StepStatus::Failed));
        assert!(
            !git.calls()
                .iter()
                .any(|call| matches!(call, Call::Unlock(_)))
        );
    }

    /// Sink that fails on the first write mentioning `marker`.
    struct FailingWriter {
        marker: &'static str,
        written: Vec<u8>,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if String::from_utf8_lossy(buf).contains(self.marker) {
                return Err(std::io::Error::other("console closed"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn early_exit_after_disabling_restores_hooks() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = hooks_dir(temp.path());
        fs::write(dir.join("pre-merge"), "#!/bin/sh\n").expect("write");
        fs::write(dir.join("pre-pull"), "#!/bin/sh\n").expect("write");
        let git = ScriptedGit::new();
        let mut console = Console::new(FailingWriter {
            marker: "STEP 3",
            written: Vec::new(),
        });

        let err = run_deploy(temp.path(), &DeployConfig::default(), &git, &mut console)
            .expect_err("console failure should end the run");
        assert!(format!("{err:#}").contains("console closed"));

        let written = String::from_utf8(console.into_inner().written).expect("utf8");
        assert!(written.contains("✓ pre-merge disabled\n✓ pre-pull disabled\n"));
        assert!(!git.calls().contains(&Call::AddAll));
        for name in ["pre-merge", "pre-pull"] {
            assert!(dir.join(name).exists(), "{name} restored");
            assert!(!dir.join(format!("{name}.disabled")).exists());
        }
    }

    #[test]
    fn restore_failure_is_reported_and_fails_the_step() {
        let events = vec![
            HookEvent::Restored("pre-merge".to_string()),
            HookEvent::RestoreFailed {
                name: "pre-pull".to_string(),
                error: "rename denied".to_string(),
            },
        ];
        let mut console = Console::new(Vec::new());
        write_hook_events(&mut console, &events).expect("write");
        let text = String::from_utf8(console.into_inner()).expect("utf8");

        assert_eq!(
            text,
            "✓ pre-merge re-enabled\n✗ pre-pull could not be re-enabled: rename denied\n"
        );
        assert_eq!(hook_status(&events), StepStatus::Failed);
        assert_eq!(
            hook_status(&[HookEvent::Conflict("pre-merge".to_string())]),
            StepStatus::Succeeded
        );
    }

    #[test]
    fn no_hooks_prints_only_headers() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = ScriptedGit::new();

        let (report, text) = run(&git, temp.path());
        assert!(text.contains("=== STEP 2: Disabling hooks ===\n\n=== STEP 3: Adding changes ==="));
        assert!(
            text.contains("=== STEP 6: Re-enabling hooks ===\n\n✅ DEPLOYMENT COMPLETE!\n")
        );
        assert_eq!(
            report.status_of(Step::DisableHooks),
            Some(StepStatus::Skipped)
        );
        assert_eq!(
            report.status_of(Step::EnableHooks),
            Some(StepStatus::Skipped)
        );
    }

    #[test]
    fn hooks_are_disabled_during_commit_and_restored_after() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = hooks_dir(temp.path());
        fs::write(dir.join("pre-merge"), "#!/bin/sh\n").expect("write");
        fs::write(dir.join("pre-rebase"), "#!/bin/sh\n").expect("write");
        let git = ScriptedGit::new().observe_hooks(dir.clone());

        let (report, text) = run(&git, temp.path());

        assert!(text.contains("✓ pre-merge disabled\n✓ pre-rebase disabled\n"));
        assert!(text.contains("✓ pre-merge re-enabled\n✓ pre-rebase re-enabled\n"));
        assert!(!text.contains("pre-pull"));
        assert_eq!(report.disabled_hooks, vec!["pre-merge", "pre-rebase"]);
        assert_eq!(report.restored_hooks, vec!["pre-merge", "pre-rebase"]);
        assert_eq!(
            git.hooks_seen_at_commit(),
            Some(vec![
                "pre-merge.disabled".to_string(),
                "pre-rebase.disabled".to_string()
            ])
        );
        assert!(dir.join("pre-merge").exists());
        assert!(!dir.join("pre-merge.disabled").exists());
        assert!(dir.join("pre-rebase").exists());
    }

    #[test]
    fn nothing_to_commit_warns_and_still_pushes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = ScriptedGit::new().with_commit(GitOutput::failed(
            1,
            "nothing to commit, working tree clean\n",
            "",
        ));

        let (report, text) = run(&git, temp.path());
        assert!(text.contains("⚠ No changes to commit\n"));
        assert!(!text.contains("✓ Committed"));
        assert!(text.contains("=== STEP 5: Pushing ===\n✓ Pushed successfully"));
        assert_eq!(report.commit, Some(CommitOutcome::NothingToCommit));
        assert_eq!(report.status_of(Step::Commit), Some(StepStatus::Skipped));
    }

    #[test]
    fn rejected_commit_is_distinguished_from_nothing_to_commit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = ScriptedGit::new().with_commit(GitOutput::failed(
            128,
            "",
            "fatal: unable to auto-detect email address\n",
        ));

        let (report, text) = run(&git, temp.path());
        assert!(text.contains("✗ Commit failed\nfatal: unable to auto-detect email address\n"));
        assert!(!text.contains("No changes to commit"));
        assert_eq!(report.status_of(Step::Commit), Some(StepStatus::Failed));
        assert_eq!(report.status_of(Step::Push), Some(StepStatus::Succeeded));
    }

    #[test]
    fn successful_push_echoes_stdout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = ScriptedGit::new().with_push(GitOutput::ok("main -> main\n"));

        let (_, text) = run(&git, temp.path());
        assert!(text.contains("✓ Pushed successfully\nmain -> main\n"));
    }

    #[test]
    fn failed_push_echoes_stderr_and_restores_hooks() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = hooks_dir(temp.path());
        fs::write(dir.join("pre-pull"), "#!/bin/sh\n").expect("write");
        let git = ScriptedGit::new().with_push(GitOutput::failed(
            1,
            "",
            "! [rejected] main -> main (fetch first)\n",
        ));

        let (report, text) = run(&git, temp.path());
        assert!(text.contains("✗ Push failed\n! [rejected] main -> main (fetch first)\n"));
        assert!(text.contains("✓ pre-pull re-enabled\n"));
        assert!(dir.join("pre-pull").exists());
        assert!(!report.is_clean());
    }

    #[test]
    fn staging_failure_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = ScriptedGit::new().with_add(GitOutput::failed(
            128,
            "",
            "fatal: not a git repository\n",
        ));

        let (report, text) = run(&git, temp.path());
        assert!(text.contains("✗ Staging failed\nfatal: not a git repository\n"));
        assert!(!text.contains("✓ Changes staged"));
        assert_eq!(report.status_of(Step::Stage), Some(StepStatus::Failed));
    }

    #[test]
    fn uses_configured_remote_branch_and_message() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = DeployConfig {
            remote: "upstream".to_string(),
            branch: "release".to_string(),
            commit_message: "ship it".to_string(),
            ..DeployConfig::default()
        };
        let git = ScriptedGit::new();
        let mut console = Console::new(Vec::new());
        run_deploy(temp.path(), &cfg, &git, &mut console).expect("run");

        let calls = git.calls();
        assert!(calls.contains(&Call::Commit("ship it".to_string())));
        assert!(calls.contains(&Call::Push {
            remote: "upstream".to_string(),
            branch: "release".to_string()
        }));
    }

    #[test]
    fn steps_run_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = ScriptedGit::new();
        let (report, text) = run(&git, temp.path());

        let order: Vec<Step> = report.steps.iter().map(|record| record.step).collect();
        assert_eq!(order, Step::ALL.to_vec());
        let mut last = 0;
        for step in Step::ALL {
            let pos = text
                .find(&format!("=== {step} ==="))
                .expect("header present");
            assert!(pos >= last);
            last = pos;
        }
        assert!(matches!(git.calls().first(), Some(Call::LsFiles)));
        assert!(matches!(git.calls().last(), Some(Call::Push { .. })));
    }
}
