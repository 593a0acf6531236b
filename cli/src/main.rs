//! iris-update: release publisher and self-applying update agent

use clap::Parser;
use iris_update_cli::cli::Cli;
use iris_update_cli::output::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.command.is_agent() { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;
    if let Err(e) = cli.run().await {
        let message = format!("{e:#}");
        match json::format_error(&message, json::error_code(&e)) {
            Ok(body) if json => println!("{body}"),
            _ => eprintln!("Error: {message}"),
        }
        std::process::exit(1);
    }
}
