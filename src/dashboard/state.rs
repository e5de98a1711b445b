//! Shared dashboard state
//!
//! One run at a time. Events of the active run are folded into the log
//! history and module cards, then re-broadcast to feed subscribers.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::common::config::{seconds, Config};
use crate::engine::events::unix_millis;
use crate::engine::{
    ExecutionSummary, LogLine, ModuleCard, RunEvent, Severity, StopHandle, TestState,
};

/// Log lines kept for late subscribers
pub const LOG_LINE_CAP: usize = 5_000;

const STOPPED_MESSAGE: &str = "Stopped by user";

/// Values used when a launch request leaves a field out
#[derive(Debug, Clone)]
pub struct RunDefaults {
    pub plan_id: String,
    pub token: String,
    pub server: String,
    pub poll_interval_secs: f64,
    pub timeout_secs: f64,
    pub headless: bool,
    pub http_timeout: Duration,
}

impl RunDefaults {
    /// Settings file values overridden by `CONFORMANCE_*` environment variables
    pub fn from_env(config: &Config) -> Self {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            plan_id: env("CONFORMANCE_PLAN_ID").unwrap_or_default(),
            token: env("CONFORMANCE_TOKEN").unwrap_or_default(),
            server: env("CONFORMANCE_SERVER").unwrap_or_else(|| config.defaults.server.clone()),
            poll_interval_secs: config.timeouts.poll_interval_secs,
            timeout_secs: config.timeouts.module_secs,
            headless: config.defaults.headless,
            http_timeout: Duration::from_secs(config.timeouts.http_request_secs),
        }
    }
}

/// A validated launch request
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub config_path: String,
    pub plan_id: String,
    pub token: String,
    pub server_url: String,
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub headless: bool,
}

impl LaunchRequest {
    /// Read a launch body; wrongly typed optional fields fall back to defaults
    pub fn from_json(body: &Value, defaults: &RunDefaults) -> Result<Self, String> {
        let text = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
        };
        let duration = |key: &str, fallback: f64| -> Result<Duration, String> {
            let value = match body.get(key) {
                Some(v) if !v.is_null() => v.as_f64().unwrap_or(fallback),
                _ => fallback,
            };
            seconds(key, value).map_err(|e| e.to_string())
        };

        let (Some(config_path), Some(plan_id), Some(token)) =
            (text("configPath"), text("planId"), text("token"))
        else {
            return Err("configPath, planId, and token are required".to_string());
        };

        Ok(Self {
            config_path,
            plan_id,
            token,
            server_url: text("serverUrl").unwrap_or_else(|| defaults.server.clone()),
            poll_interval: duration("pollInterval", defaults.poll_interval_secs)?,
            timeout: duration("timeout", defaults.timeout_secs)?,
            headless: body
                .get("headless")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.headless),
        })
    }
}

/// `GET /api/health` body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub execution_in_flight: bool,
    pub line_count: usize,
    pub outcome: Option<ExecutionSummary>,
    pub error: Option<String>,
    pub module_cards: Vec<ModuleCard>,
}

/// Identifies one launched run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket(u64);

#[derive(Default)]
struct RunState {
    ticket: u64,
    in_flight: bool,
    stopped_by_user: bool,
    lines: VecDeque<LogLine>,
    outcome: Option<ExecutionSummary>,
    error: Option<String>,
    cards: Vec<ModuleCard>,
    stop: Option<StopHandle>,
}

/// Why a launch or stop was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunConflict {
    AlreadyRunning,
    NotRunning,
}

#[derive(Clone)]
pub struct DashboardState {
    /// Feed subscribers listen here
    pub feed: broadcast::Sender<RunEvent>,
    /// Directory searched for plans and used to resolve relative paths
    pub root: PathBuf,
    pub defaults: Arc<RunDefaults>,
    run: Arc<Mutex<RunState>>,
}

impl DashboardState {
    pub fn new(root: PathBuf, defaults: RunDefaults) -> Self {
        let (feed, _) = broadcast::channel(1024);
        Self {
            feed,
            root,
            defaults: Arc::new(defaults),
            run: Arc::new(Mutex::new(RunState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        // A panic while holding the lock leaves plain data behind
        self.run.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let run = self.lock();
        HealthSnapshot {
            execution_in_flight: run.in_flight,
            line_count: run.lines.len(),
            outcome: run.outcome.clone(),
            error: run.error.clone(),
            module_cards: run.cards.clone(),
        }
    }

    /// Log history, oldest first
    pub fn history(&self) -> Vec<LogLine> {
        self.lock().lines.iter().cloned().collect()
    }

    /// Reset for a new run and take ownership of its stop handle
    pub fn begin(&self, stop: StopHandle) -> Result<RunTicket, RunConflict> {
        let mut run = self.lock();
        if run.in_flight {
            return Err(RunConflict::AlreadyRunning);
        }
        let ticket = run.ticket + 1;
        *run = RunState {
            ticket,
            in_flight: true,
            stop: Some(stop),
            ..RunState::default()
        };
        Ok(RunTicket(ticket))
    }

    /// Fold an event of run `ticket` into the run state and forward it to
    /// subscribers
    ///
    /// Events of an earlier run, or arriving after a user stop, are dropped.
    pub fn publish(&self, ticket: RunTicket, event: RunEvent) {
        {
            let mut guard = self.lock();
            let run = &mut *guard;
            if run.stopped_by_user || run.ticket != ticket.0 {
                return;
            }
            match &event {
                RunEvent::Log(line) => {
                    if let Some(card) = line
                        .module_name
                        .as_deref()
                        .and_then(|name| run.cards.iter_mut().find(|c| c.name == name))
                    {
                        card.last_message = Some(line.message.clone());
                    }
                    run.lines.push_back(line.clone());
                    while run.lines.len() > LOG_LINE_CAP {
                        run.lines.pop_front();
                    }
                }
                RunEvent::ModuleList(names) => {
                    run.cards = names.iter().map(|name| ModuleCard::pending(name)).collect();
                }
                RunEvent::ModuleUpdate(update) => {
                    match run.cards.iter_mut().find(|c| c.name == update.name) {
                        Some(card) => merge_card(card, update),
                        None => run.cards.push(update.clone()),
                    }
                }
                RunEvent::PlanDone(summary) => run.outcome = Some(summary.clone()),
                RunEvent::Stopped => {}
            }
        }
        let _ = self.feed.send(event);
    }

    /// Record how the run ended
    pub fn finish(&self, ticket: RunTicket, outcome: Result<ExecutionSummary, String>) {
        let error_line = {
            let mut run = self.lock();
            if run.stopped_by_user || run.ticket != ticket.0 {
                return;
            }
            run.in_flight = false;
            run.stop = None;
            match outcome {
                Ok(summary) => {
                    run.outcome = Some(summary);
                    None
                }
                Err(message) => {
                    run.error = Some(message.clone());
                    Some(message)
                }
            }
        };

        if let Some(message) = error_line {
            self.publish(ticket, RunEvent::Log(LogLine {
                severity: Severity::Error,
                message,
                module_name: None,
                action_name: None,
                at: unix_millis(),
            }));
        }
    }

    /// Stop the active run
    pub fn stop(&self) -> Result<(), RunConflict> {
        {
            let mut run = self.lock();
            if !run.in_flight {
                return Err(RunConflict::NotRunning);
            }
            run.in_flight = false;
            run.stopped_by_user = true;
            run.error = Some(STOPPED_MESSAGE.to_string());
            for card in run.cards.iter_mut() {
                if card.state != Some(TestState::Finished) {
                    card.state = Some(TestState::Interrupted);
                    card.last_message = Some(STOPPED_MESSAGE.to_string());
                }
            }
            if let Some(handle) = run.stop.take() {
                handle.stop();
            }
        }
        let _ = self.feed.send(RunEvent::Stopped);
        Ok(())
    }
}

fn merge_card(card: &mut ModuleCard, update: &ModuleCard) {
    if update.runner_id.is_some() {
        card.runner_id = update.runner_id.clone();
    }
    if update.state.is_some() {
        card.state = update.state;
    }
    if update.result.is_some() {
        card.result = update.result;
    }
    if update.error.is_some() {
        card.error = update.error.clone();
    }
    if update.last_message.is_some() {
        card.last_message = update.last_message.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{stop_pair, TestResult};
    use serde_json::json;

    fn defaults() -> RunDefaults {
        RunDefaults {
            plan_id: String::new(),
            token: String::new(),
            server: "https://suite.example".to_string(),
            poll_interval_secs: 5.0,
            timeout_secs: 240.0,
            headless: true,
            http_timeout: Duration::from_secs(30),
        }
    }

    fn line(module: Option<&str>, message: &str) -> RunEvent {
        RunEvent::Log(LogLine {
            severity: Severity::Info,
            message: message.to_string(),
            module_name: module.map(str::to_string),
            action_name: None,
            at: 1,
        })
    }

    #[test]
    fn test_launch_request_requires_fields() {
        let err = LaunchRequest::from_json(&json!({"configPath": "a.config.json", "planId": "p"}), &defaults())
            .unwrap_err();
        assert_eq!(err, "configPath, planId, and token are required");
    }

    #[test]
    fn test_launch_request_defaults() {
        let request = LaunchRequest::from_json(
            &json!({"configPath": "a.config.json", "planId": "p", "token": "t", "pollInterval": "fast"}),
            &defaults(),
        )
        .unwrap();
        assert_eq!(request.server_url, "https://suite.example");
        assert_eq!(request.poll_interval, Duration::from_secs(5));
        assert_eq!(request.timeout, Duration::from_secs(240));
        assert!(request.headless);

        let err = LaunchRequest::from_json(
            &json!({"configPath": "a", "planId": "p", "token": "t", "timeout": -1}),
            &defaults(),
        )
        .unwrap_err();
        assert!(err.contains("timeout must be a positive number"));
    }

    #[test]
    fn test_launch_request_rejects_out_of_range_seconds() {
        let err = LaunchRequest::from_json(
            &json!({"configPath": "a", "planId": "p", "token": "t", "timeout": 1e30}),
            &defaults(),
        )
        .unwrap_err();
        assert!(err.contains("timeout is too large"));

        let mut bad_defaults = defaults();
        bad_defaults.poll_interval_secs = -1.0;
        let err = LaunchRequest::from_json(&json!({"configPath": "a", "planId": "p", "token": "t"}), &bad_defaults)
            .unwrap_err();
        assert!(err.contains("pollInterval must be a positive number"));
    }

    #[test]
    fn test_begin_rejects_second_run() {
        let state = DashboardState::new(PathBuf::from("."), defaults());
        let (first, _) = stop_pair();
        let (second, _) = stop_pair();
        state.begin(first).unwrap();
        assert_eq!(state.begin(second), Err(RunConflict::AlreadyRunning));
        assert!(state.snapshot().execution_in_flight);
    }

    #[test]
    fn test_events_of_previous_run_are_dropped() {
        let (state, old) = started();
        state.stop().unwrap();
        let (handle, _) = stop_pair();
        let current = state.begin(handle).unwrap();
        assert_ne!(old, current);

        state.publish(old, line(None, "stale"));
        state.publish(current, line(None, "fresh"));
        let history = state.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "fresh");
    }

    fn started() -> (DashboardState, RunTicket) {
        let state = DashboardState::new(PathBuf::from("."), defaults());
        let (handle, _) = stop_pair();
        let ticket = state.begin(handle).unwrap();
        (state, ticket)
    }

    #[test]
    fn test_history_is_capped() {
        let (state, ticket) = started();
        for i in 0..LOG_LINE_CAP + 10 {
            state.publish(ticket, line(None, &format!("line {i}")));
        }
        let history = state.history();
        assert_eq!(history.len(), LOG_LINE_CAP);
        assert_eq!(history[0].message, "line 10");
    }

    #[test]
    fn test_cards_follow_events() {
        let (state, ticket) = started();
        state.publish(ticket, RunEvent::ModuleList(vec!["a".into(), "b".into()]));
        state.publish(ticket, line(Some("a"), "Registering..."));
        state.publish(ticket, RunEvent::ModuleUpdate(ModuleCard {
            runner_id: Some("r-a".into()),
            state: Some(TestState::Finished),
            result: Some(TestResult::Passed),
            ..ModuleCard::pending("a")
        }));

        let cards = state.snapshot().module_cards;
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].runner_id.as_deref(), Some("r-a"));
        assert_eq!(cards[0].result, Some(TestResult::Passed));
        assert_eq!(cards[0].last_message.as_deref(), Some("Registering..."));
        assert_eq!(cards[1].state, None);
    }

    #[test]
    fn test_stop_interrupts_unfinished_cards_and_signals() {
        let state = DashboardState::new(PathBuf::from("."), defaults());
        assert_eq!(state.stop(), Err(RunConflict::NotRunning));

        let (handle, signal) = stop_pair();
        let ticket = state.begin(handle).unwrap();
        state.publish(ticket, RunEvent::ModuleList(vec!["a".into(), "b".into()]));
        state.publish(ticket, RunEvent::ModuleUpdate(ModuleCard {
            state: Some(TestState::Finished),
            ..ModuleCard::pending("a")
        }));
        let mut rx = state.feed.subscribe();

        state.stop().unwrap();

        assert!(signal.is_stopped());
        let snapshot = state.snapshot();
        assert!(!snapshot.execution_in_flight);
        assert_eq!(snapshot.error.as_deref(), Some("Stopped by user"));
        assert_eq!(snapshot.module_cards[0].state, Some(TestState::Finished));
        assert_eq!(snapshot.module_cards[1].state, Some(TestState::Interrupted));
        assert!(matches!(rx.try_recv().unwrap(), RunEvent::Stopped));

        // Late events from the stopped run are ignored
        state.publish(ticket, line(Some("b"), "Polling... Current state: RUNNING"));
        assert_eq!(state.snapshot().line_count, 0);
        state.finish(ticket, Err("late".into()));
        assert_eq!(state.snapshot().error.as_deref(), Some("Stopped by user"));
    }

    #[test]
    fn test_finish_records_error_line() {
        let (state, ticket) = started();
        state.finish(ticket, Err("Configuration error: boom".into()));

        let snapshot = state.snapshot();
        assert!(!snapshot.execution_in_flight);
        assert_eq!(snapshot.error.as_deref(), Some("Configuration error: boom"));
        let history = state.history();
        assert_eq!(history.last().unwrap().severity, Severity::Error);
    }
}
