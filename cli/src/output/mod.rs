//! Terminal output for humans; `json` holds the `--json` renderings.

pub mod json;
pub mod reporter;
pub mod styles;

use console::Term;
use owo_colors::OwoColorize as _;
pub use reporter::TerminalReporter;
pub use styles::Styles;

/// Styling plus the quiet switch, passed to every command.
pub struct OutputContext {
    pub styles: Styles,
    /// Suppresses everything except errors. Set by `--quiet` and `--json`.
    pub quiet: bool,
}

impl OutputContext {
    /// Colors are used only on a TTY, and never with `--no-color` or
    /// `NO_COLOR` set.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let use_colors =
            !no_color && Term::stdout().is_term() && std::env::var_os("NO_COLOR").is_none();
        Self {
            styles: if use_colors {
                Styles::colored()
            } else {
                Styles::default()
            },
            quiet,
        }
    }

    pub fn success(&self, msg: &str) {
        self.line("✓", self.styles.success, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.line("!", self.styles.warning, msg);
    }

    /// Printed to stderr even when quiet.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Key dimmed, value plain. Callers pad keys to align a block.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.dim));
        }
    }

    fn line(&self, marker: &str, style: owo_colors::Style, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", marker.style(style));
        }
    }
}
