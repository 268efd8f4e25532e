//! I/O helpers for the deployment sequence.

pub mod config;
pub mod console;
pub mod git;
pub mod hooks;
pub mod process;
