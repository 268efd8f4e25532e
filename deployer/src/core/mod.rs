//! Deterministic, pure logic shared by the deployment sequence.
//!
//! Core modules must be free of I/O side effects. They operate on captured
//! command output and return values suitable for tests.

pub mod ls_files;
pub mod outcome;
pub mod types;
