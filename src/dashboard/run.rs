//! Background plan execution for the dashboard

use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;

use super::state::{DashboardState, LaunchRequest, RunTicket};
use crate::api::{ConformanceApi, HttpClient};
use crate::browser::ChromiumFactory;
use crate::common::Result;
use crate::engine::{ExecutionSummary, RunEvents, Runner, RunnerOptions, Severity, StopSignal};
use crate::plan::PlanConfig;

/// Run a launched plan, feeding its events into the dashboard state
pub async fn run_plan(
    state: DashboardState,
    ticket: RunTicket,
    request: LaunchRequest,
    stop: StopSignal,
) {
    let (tx, mut rx) = broadcast::channel(1024);
    let events = RunEvents::new(tx);

    let work = execute(&state, &request, events.clone(), stop);
    tokio::pin!(work);

    let outcome = loop {
        tokio::select! {
            outcome = &mut work => break outcome,
            Ok(event) = rx.recv() => state.publish(ticket, event),
        }
    };
    while let Ok(event) = rx.try_recv() {
        state.publish(ticket, event);
    }

    if let Err(e) = &outcome {
        tracing::error!(error = %e, "Dashboard run failed");
    }
    state.finish(ticket, outcome.map_err(|e| e.to_string()));
}

async fn execute(
    state: &DashboardState,
    request: &LaunchRequest,
    events: RunEvents,
    stop: StopSignal,
) -> Result<ExecutionSummary> {
    events.log(
        Severity::Info,
        None,
        None,
        format!("Targeting conformance host \"{}\"", request.server_url),
    );

    let path = state.root.join(&request.config_path);
    let plan = PlanConfig::load(&path)?;
    let file_name = Path::new(&request.config_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| request.config_path.clone());
    events.log(
        Severity::Info,
        None,
        None,
        format!("Plan: {file_name} [{}] - {} module(s)", request.plan_id, plan.modules.len()),
    );

    let http_timeout = state.defaults.http_timeout;
    let api = ConformanceApi::new(&request.server_url, &request.token, http_timeout)?;
    let runner = Runner::new(
        Arc::new(api),
        Arc::new(ChromiumFactory {
            headless: request.headless,
        }),
        HttpClient::new(None, None, http_timeout)?,
        RunnerOptions {
            poll_interval: request.poll_interval,
            timeout: request.timeout,
            continue_on_error: false,
        },
    )
    .with_events(events)
    .with_stop_signal(stop);

    runner.execute_plan(&request.plan_id, &plan).await
}
