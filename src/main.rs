//! Conformance Autopilot - unattended runs of conformance-suite test plans
//!
//! Registers each module of a plan with the suite, follows the browser
//! redirects it asks for and fires the plan's callback actions until the
//! module finishes.

use clap::Parser;
use autopilot::{cli, commands, common::logging};
use colored::Colorize;
use commands::Commands;

#[derive(Parser)]
#[command(name = "autopilot", about = "Conformance suite plan runner")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    logging::init(verbose);

    match cli::dispatch(cli.command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{}: {e}", "[ERROR]".red().bold());
            std::process::exit(1);
        }
    }
}
