//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::output::OutputContext;

/// Release publisher and self-applying update agent
#[derive(Parser)]
#[command(
    name = "iris-update",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Package the checkout as a new release
    Publish(commands::publish::PublishArgs),

    /// Run the update agent
    #[command(subcommand)]
    Agent(commands::agent::AgentCommand),

    /// Show version
    Version,
}

impl Command {
    /// Whether this command runs the long-lived agent, which logs at `info`
    /// by default rather than `warn`.
    #[must_use]
    pub fn is_agent(&self) -> bool {
        matches!(self, Self::Agent(_))
    }
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            no_color,
            quiet,
            json,
            command,
        } = self;
        // JSON output owns stdout; progress lines would corrupt it.
        let ctx = OutputContext::new(no_color, quiet || json);
        match command {
            Command::Version => {
                commands::version::run(json);
                Ok(())
            }
            Command::Publish(args) => commands::publish::run(&ctx, args, json).await,
            Command::Agent(cmd) => commands::agent::run(&ctx, cmd, json).await,
        }
    }
}
