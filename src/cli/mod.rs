//! CLI command handling
//!
//! Dispatches CLI commands and formats the plan summary.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;

use crate::api::{ConformanceApi, HttpClient};
use crate::browser::ChromiumFactory;
use crate::commands::Commands;
use crate::common::config::{seconds, Config};
use crate::common::{Error, Result};
use crate::dashboard::{self, DashboardState, RunDefaults};
use crate::engine::{stop_pair, ExecutionSummary, Runner, RunnerOptions};
use crate::plan::PlanConfig;

/// Parameters for one plan execution, after merging flags and settings
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub config: PathBuf,
    pub plan_id: String,
    pub token: String,
    pub server: String,
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub headless: bool,
    pub continue_on_error: bool,
    pub http_timeout: Duration,
}

/// Dispatch a CLI command
///
/// Returns `Ok(false)` when the command ran but its outcome should fail the
/// process.
pub async fn dispatch(command: Commands) -> Result<bool> {
    let config = Config::load()?;

    match command {
        Commands::Run {
            config: plan_path,
            plan_id,
            token,
            base_url,
            poll_interval,
            timeout,
            headed,
            continue_on_error,
            verbose: _,
        } => {
            let settings = RunSettings {
                config: plan_path,
                plan_id: require("--plan-id", plan_id)?,
                token: require("--token", token)?,
                server: base_url.unwrap_or_else(|| config.defaults.server.clone()),
                poll_interval: seconds(
                    "poll interval",
                    poll_interval.unwrap_or(config.timeouts.poll_interval_secs),
                )?,
                timeout: seconds("timeout", timeout.unwrap_or(config.timeouts.module_secs))?,
                headless: config.defaults.headless && !headed,
                continue_on_error,
                http_timeout: Duration::from_secs(config.timeouts.http_request_secs),
            };

            let summary = run(settings).await?;
            print_summary(&summary);
            Ok(!summary.has_failures())
        }

        Commands::Dashboard { port, root } => {
            let port = port.unwrap_or(config.dashboard.port);
            let root = root.canonicalize().unwrap_or(root);
            let state = DashboardState::new(root, RunDefaults::from_env(&config));
            dashboard::serve(port, state).await?;
            Ok(true)
        }

        Commands::Validate { config: plan_path } => {
            let plan = PlanConfig::load(&plan_path)?;
            println!(
                "{} {} - {} module(s), {} action(s)",
                "✓".green(),
                plan_path.display(),
                plan.modules.len(),
                plan.actions.len()
            );
            Ok(true)
        }
    }
}

fn require(flag: &str, value: String) -> Result<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(Error::Config(format!("{flag} must not be empty")));
    }
    Ok(value)
}

/// Execute a plan from the terminal; Ctrl-C stops it
pub async fn run(settings: RunSettings) -> Result<ExecutionSummary> {
    let plan = PlanConfig::load(&settings.config)?;

    println!(
        "{} {}",
        "Targeting conformance host".cyan(),
        settings.server.white().bold()
    );
    println!(
        "Plan: {} [{}] - {} module(s)",
        file_label(&settings.config),
        settings.plan_id,
        plan.modules.len()
    );

    let api = ConformanceApi::new(&settings.server, &settings.token, settings.http_timeout)?;
    let (stop, signal) = stop_pair();
    let runner = Runner::new(
        Arc::new(api),
        Arc::new(ChromiumFactory {
            headless: settings.headless,
        }),
        HttpClient::new(None, None, settings.http_timeout)?,
        RunnerOptions {
            poll_interval: settings.poll_interval,
            timeout: settings.timeout,
            continue_on_error: settings.continue_on_error,
        },
    )
    .with_stop_signal(signal);

    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", "Stopping after the current step...".yellow());
            stop.stop();
        }
    });

    let outcome = runner.execute_plan(&settings.plan_id, &plan).await;
    ctrl_c.abort();
    outcome
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Summary lines shown after a run
pub fn summary_lines(summary: &ExecutionSummary) -> Vec<String> {
    let mut lines = vec![
        format!("Total:       {}", summary.total),
        format!("PASS:        {}", summary.passed),
        format!("FAIL:        {}", summary.failed),
    ];
    if summary.warning > 0 {
        lines.push(format!("WARNING:     {}", summary.warning));
    }
    lines.push(format!("SKIPPED:     {}", summary.skipped));
    if summary.review > 0 {
        lines.push(format!("REVIEW:      {}", summary.review));
    }
    if summary.interrupted > 0 {
        lines.push(format!("INTERRUPTED: {}", summary.interrupted));
    }
    lines
}

fn print_summary(summary: &ExecutionSummary) {
    println!("\n{}", "Execution Summary".bold());
    for line in summary_lines(summary) {
        if line.starts_with("FAIL") && summary.failed > 0 {
            println!("  {}", line.red());
        } else if line.starts_with("PASS") {
            println!("  {}", line.green());
        } else if line.starts_with("WARNING") || line.starts_with("INTERRUPTED") {
            println!("  {}", line.yellow());
        } else {
            println!("  {line}");
        }
    }

    for module in summary.modules.iter().filter(|m| m.error_message.is_some()) {
        if let Some(message) = &module.error_message {
            println!("  {} {}: {}", "✗".red(), module.name, message.dimmed());
        }
    }
}
