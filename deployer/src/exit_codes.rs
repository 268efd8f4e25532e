//! Stable exit codes for deployer CLI commands.

/// The command ran to completion. Step failures during a deployment are
/// reported on stdout and do not change the exit code.
pub const OK: i32 = 0;
/// Startup failed: invalid config, unwritable output, or other errors.
pub const INVALID: i32 = 1;
