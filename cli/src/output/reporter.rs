//! `TerminalReporter`: the `ProgressReporter` the publish command hands to
//! the publish service.

use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::OutputContext;

/// Prints `→`, `✓` and `!` lines. When the context is quiet (including
/// `--json`), warnings still reach stderr through `tracing`.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
}

impl<'a> TerminalReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if !self.ctx.quiet {
            println!("  {} {message}", "→".style(self.ctx.styles.step));
        }
    }

    fn success(&self, message: &str) {
        self.ctx.success(message);
    }

    fn warn(&self, message: &str) {
        if self.ctx.quiet {
            tracing::warn!("{message}");
        } else {
            self.ctx.warn(message);
        }
    }
}
