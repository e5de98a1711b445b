//! CLI command definitions
//!
//! Defines the clap commands for the autopilot CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run every module of a plan against the conformance suite
    Run {
        /// Path to the plan file (*.config.json)
        #[arg(long, short)]
        config: PathBuf,

        /// Test plan identifier on the conformance server
        #[arg(long, env = "CONFORMANCE_PLAN_ID", hide_env_values = true)]
        plan_id: String,

        /// Bearer token for the conformance API
        #[arg(long, env = "CONFORMANCE_TOKEN", hide_env_values = true)]
        token: String,

        /// Conformance server base URL (default: settings file, then the public suite)
        #[arg(long, env = "CONFORMANCE_SERVER")]
        base_url: Option<String>,

        /// Seconds between status polls
        #[arg(long)]
        poll_interval: Option<f64>,

        /// Seconds a module may take before it times out
        #[arg(long)]
        timeout: Option<f64>,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Record a failing module and carry on with the next one
        #[arg(long)]
        continue_on_error: bool,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,
    },

    /// Serve the local web dashboard
    Dashboard {
        /// Port to listen on (default: settings file, then 3000)
        #[arg(long, short)]
        port: Option<u16>,

        /// Directory searched for plan files
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Check a plan file without contacting the server
    Validate {
        /// Path to the plan file
        config: PathBuf,
    },
}
