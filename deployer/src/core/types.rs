//! Shared deterministic types for the deployment sequence.
//!
//! These types carry no I/O. They describe what each step did so the
//! orchestrator can report it and tests can assert on it.

use std::fmt;

/// The six ordered steps of a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Unlock,
    DisableHooks,
    Stage,
    Commit,
    Push,
    EnableHooks,
}

impl Step {
    /// All steps in execution order.
    pub const ALL: [Step; 6] = [
        Step::Unlock,
        Step::DisableHooks,
        Step::Stage,
        Step::Commit,
        Step::Push,
        Step::EnableHooks,
    ];

    /// 1-indexed position in the sequence.
    pub fn number(self) -> u8 {
        match self {
            Step::Unlock => 1,
            Step::DisableHooks => 2,
            Step::Stage => 3,
            Step::Commit => 4,
            Step::Push => 5,
            Step::EnableHooks => 6,
        }
    }

    /// Human-readable title used in the step header.
    pub fn title(self) -> &'static str {
        match self {
            Step::Unlock => "Unlocking all files",
            Step::DisableHooks => "Disabling hooks",
            Step::Stage => "Adding changes",
            Step::Commit => "Committing",
            Step::Push => "Pushing",
            Step::EnableHooks => "Re-enabling hooks",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "STEP {}: {}", self.number(), self.title())
    }
}

/// Terminal status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Failed,
    /// Nothing to do (e.g. no hooks present, nothing to commit).
    Skipped,
}

/// Result of the commit step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// git refused because the index had nothing new.
    NothingToCommit,
    /// Any other nonzero exit; carries git's stderr.
    Rejected(String),
}

impl CommitOutcome {
    pub fn status(&self) -> StepStatus {
        match self {
            CommitOutcome::Committed => StepStatus::Succeeded,
            CommitOutcome::NothingToCommit => StepStatus::Skipped,
            CommitOutcome::Rejected(_) => StepStatus::Failed,
        }
    }
}

/// Result of the push step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Carries git's stdout.
    Pushed(String),
    /// Carries git's stderr.
    Failed(String),
}

impl PushOutcome {
    pub fn status(&self) -> StepStatus {
        match self {
            PushOutcome::Pushed(_) => StepStatus::Succeeded,
            PushOutcome::Failed(_) => StepStatus::Failed,
        }
    }
}

/// Per-step record kept for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub status: StepStatus,
}

/// Summary of a full deployment run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub steps: Vec<StepRecord>,
    /// Number of assume-unchanged candidates found in step 1.
    pub unlocked: usize,
    /// Hooks renamed to their disabled form in step 2.
    pub disabled_hooks: Vec<String>,
    /// Hooks renamed back to their canonical form in step 6.
    pub restored_hooks: Vec<String>,
    pub commit: Option<CommitOutcome>,
    pub push: Option<PushOutcome>,
}

impl RunReport {
    pub fn record(&mut self, step: Step, status: StepStatus) {
        self.steps.push(StepRecord { step, status });
    }

    pub fn status_of(&self, step: Step) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|record| record.step == step)
            .map(|record| record.status)
    }

    /// True if every step ran and none failed.
    pub fn is_clean(&self) -> bool {
        self.steps.len() == Step::ALL.len()
            && self
                .steps
                .iter()
                .all(|record| record.status != StepStatus::Failed)
    }
}
