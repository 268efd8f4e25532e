//! Classification of commit and push results.
//!
//! Only exit status and captured text are inspected; callers supply both.

use crate::core::types::{CommitOutcome, PushOutcome};

/// Phrases git prints (on stdout) when a commit has nothing new to record.
const NOTHING_TO_COMMIT: [&str; 3] = [
    "nothing to commit",
    "nothing added to commit",
    "no changes added to commit",
];

/// Classify a `git commit` result.
///
/// A nonzero exit only counts as "nothing to commit" when git says so;
/// every other failure keeps its stderr for reporting.
pub fn classify_commit(success: bool, stdout: &str, stderr: &str) -> CommitOutcome {
    if success {
        return CommitOutcome::Committed;
    }
    let says_nothing = NOTHING_TO_COMMIT
        .iter()
        .any(|phrase| stdout.contains(phrase) || stderr.contains(phrase));
    if says_nothing {
        CommitOutcome::NothingToCommit
    } else {
        CommitOutcome::Rejected(stderr.to_string())
    }
}

/// Classify a `git push` result.
pub fn classify_push(success: bool, stdout: &str, stderr: &str) -> PushOutcome {
    if success {
        PushOutcome::Pushed(stdout.to_string())
    } else {
        PushOutcome::Failed(stderr.to_string())
    }
}
