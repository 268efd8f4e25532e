//! Progress lines for the deployment run.
//!
//! This is product output (stdout), separate from `tracing` diagnostics on
//! stderr. Writes go through any `Write` sink so tests can capture them.

use std::io::Write;

use anyhow::{Context, Result};

use crate::core::types::Step;

pub const SUCCESS: &str = "✓";
pub const WARNING: &str = "⚠";
pub const FAILURE: &str = "✗";

/// Glyph-prefixed line writer.
pub struct Console<W: Write> {
    out: W,
    started: bool,
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            started: false,
        }
    }

    /// `=== STEP n: Title ===`, separated from the previous step by a blank line.
    pub fn header(&mut self, step: Step) -> Result<()> {
        if self.started {
            self.line("")?;
        }
        self.started = true;
        self.line(&format!("=== {step} ==="))
    }

    pub fn success(&mut self, msg: &str) -> Result<()> {
        self.line(&format!("{SUCCESS} {msg}"))
    }

    pub fn warning(&mut self, msg: &str) -> Result<()> {
        self.line(&format!("{WARNING} {msg}"))
    }

    pub fn failure(&mut self, msg: &str) -> Result<()> {
        self.line(&format!("{FAILURE} {msg}"))
    }

    /// Echo captured command output as-is.
    pub fn verbatim(&mut self, text: &str) -> Result<()> {
        self.line(text)
    }

    pub fn complete(&mut self) -> Result<()> {
        self.line("")?;
        self.line("✅ DEPLOYMENT COMPLETE!")
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}").context("write console output")?;
        self.out.flush().context("flush console output")
    }
}
