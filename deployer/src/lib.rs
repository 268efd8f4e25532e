//! Unlock, commit, and push a working tree with repository hooks held off.
//!
//! A deployment run is six ordered steps against `git`: clear
//! assume-unchanged bits, disable hooks, stage everything, commit without
//! verification, push, and restore hooks. The crate keeps a strict split:
//!
//! - **[`core`]**: Pure logic (output parsing, result classification, report types).
//! - **[`io`]**: Side effects (git subprocesses, hook renames, config, console).
//!
//! [`deploy`] coordinates the two to implement the CLI.

pub mod core;
pub mod deploy;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
