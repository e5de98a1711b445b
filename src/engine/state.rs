//! Module state machine
//!
//! Polls a registered module until it reaches FINISHED or INTERRUPTED. While
//! the module is WAITING the [`WaitingHandler`] navigates the browser (once)
//! and then runs the module's pending actions (each once).

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;

use super::context::ModuleContext;
use super::events::{ModuleCard, RunEvent, RunEvents};
use super::types::{TestResult, TestState};
use crate::api::{ConformanceClient, ModuleInfo, RunnerInfo};
use crate::common::{Error, Result};

/// Requests a stop of the run holding the paired [`StopSignal`]
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

/// Observes a stop request
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected stop handle and signal
pub fn stop_pair() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl StopSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_, signal) = stop_pair();
        signal
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once a stop has been requested
    pub async fn stopped(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Handle dropped without stopping
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Poll cadence and the wall-clock budget of one module
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

/// How a module ended
#[derive(Debug, Clone)]
pub struct TerminalState {
    pub state: TestState,
    pub result: TestResult,
    pub info: ModuleInfo,
}

/// Reactions to the WAITING state
#[async_trait]
pub trait WaitingHandler: Send {
    /// Drive the browser to the runner's target; `Ok(false)` when there was
    /// nothing to navigate to
    async fn navigate(&mut self, runner: &RunnerInfo, ctx: &mut ModuleContext) -> Result<bool>;

    /// Run the context's pending actions, marking each one executed
    async fn execute_actions(&mut self, ctx: &mut ModuleContext) -> Result<()>;
}

pub struct StateManager<'a> {
    api: &'a dyn ConformanceClient,
    settings: PollSettings,
    capture_vars: &'a [String],
    events: &'a RunEvents,
    stop: StopSignal,
}

impl<'a> StateManager<'a> {
    pub fn new(
        api: &'a dyn ConformanceClient,
        settings: PollSettings,
        capture_vars: &'a [String],
        events: &'a RunEvents,
        stop: StopSignal,
    ) -> Self {
        Self {
            api,
            settings,
            capture_vars,
            events,
            stop,
        }
    }

    /// Poll `ctx.runner_id` until it reaches a terminal state
    ///
    /// Fails with `StateTimeout` once the module has been polled for longer
    /// than the configured timeout, and with `Cancelled` when a stop is
    /// requested.
    pub async fn poll_until_terminal(
        &mut self,
        ctx: &mut ModuleContext,
        handler: &mut dyn WaitingHandler,
    ) -> Result<TerminalState> {
        let start = Instant::now();

        loop {
            if start.elapsed() > self.settings.timeout {
                let timeout_ms =
                    u64::try_from(self.settings.timeout.as_millis()).unwrap_or(u64::MAX);
                return Err(Error::state_timeout(
                    &ctx.runner_id,
                    &ctx.last_state.to_string(),
                    timeout_ms,
                ));
            }
            if self.stop.is_stopped() {
                return Err(Error::Cancelled);
            }

            let info = self.api.module_info(&ctx.runner_id).await?;
            info.capture_into(self.capture_vars, &mut ctx.captured);
            let previous = std::mem::replace(&mut ctx.last_state, info.status);
            if previous != info.status {
                self.events.emit(RunEvent::ModuleUpdate(ModuleCard {
                    runner_id: Some(ctx.runner_id.clone()),
                    state: Some(info.status),
                    ..ModuleCard::pending(&ctx.module_name)
                }));
            }
            self.events
                .info(&ctx.module_name, format!("Polling... Current state: {}", info.status));

            if info.status == TestState::Waiting {
                self.handle_waiting(ctx, handler).await?;
            }

            if info.status.is_terminal() {
                return Ok(TerminalState {
                    state: info.status,
                    result: info.result,
                    info,
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = self.stop.stopped() => return Err(Error::Cancelled),
            }
        }
    }

    async fn handle_waiting(
        &mut self,
        ctx: &mut ModuleContext,
        handler: &mut dyn WaitingHandler,
    ) -> Result<()> {
        if !ctx.is_navigated() {
            let runner = self.api.runner_info(&ctx.runner_id).await?;
            runner.capture_into(self.capture_vars, &mut ctx.captured);
            if handler.navigate(&runner, ctx).await? {
                ctx.mark_navigated();
            }
        }

        if ctx.is_navigated() && ctx.has_pending_actions() {
            handler.execute_actions(ctx).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fakes::{state, status, ScriptedApi};
    use serde_json::json;

    /// Counts calls; navigates successfully unless told otherwise
    #[derive(Default)]
    struct CountingHandler {
        navigations: usize,
        action_rounds: usize,
        no_target: bool,
    }

    #[async_trait]
    impl WaitingHandler for CountingHandler {
        async fn navigate(&mut self, _runner: &RunnerInfo, _ctx: &mut ModuleContext) -> Result<bool> {
            self.navigations += 1;
            Ok(!self.no_target)
        }

        async fn execute_actions(&mut self, ctx: &mut ModuleContext) -> Result<()> {
            self.action_rounds += 1;
            for name in ctx.pending_actions() {
                ctx.mark_executed(&name);
            }
            Ok(())
        }
    }

    fn settings(poll_secs: u64, timeout_secs: u64) -> PollSettings {
        PollSettings {
            poll_interval: Duration::from_secs(poll_secs),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn context(module: &str, actions: &[&str]) -> ModuleContext {
        let actions: Vec<String> = actions.iter().map(|a| a.to_string()).collect();
        let mut ctx = ModuleContext::new(module, &actions);
        ctx.runner_id = ScriptedApi::runner_id(module);
        ctx
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_happens_once_across_waiting_polls() {
        let api = ScriptedApi::new().polls(
            "m",
            vec![state("WAITING"), state("WAITING"), state("WAITING"), status("FINISHED", "PASSED")],
        );
        let events = RunEvents::disabled();
        let mut manager = StateManager::new(&api, settings(1, 60), &[], &events, StopSignal::never());
        let mut ctx = context("m", &[]);
        let mut handler = CountingHandler::default();

        let terminal = manager.poll_until_terminal(&mut ctx, &mut handler).await.unwrap();

        assert_eq!(terminal.state, TestState::Finished);
        assert_eq!(terminal.result, TestResult::Passed);
        assert_eq!(handler.navigations, 1);
        assert_eq!(api.count("runner:m-runner"), 1);
        assert_eq!(api.count("info:m-runner"), 4);
        assert_eq!(handler.action_rounds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_retried_while_no_target() {
        let api = ScriptedApi::new().polls(
            "m",
            vec![state("WAITING"), state("WAITING"), status("FINISHED", "FAILED")],
        );
        let events = RunEvents::disabled();
        let mut manager = StateManager::new(&api, settings(1, 60), &[], &events, StopSignal::never());
        let mut ctx = context("m", &["a"]);
        let mut handler = CountingHandler {
            no_target: true,
            ..Default::default()
        };

        manager.poll_until_terminal(&mut ctx, &mut handler).await.unwrap();

        assert_eq!(handler.navigations, 2);
        assert!(!ctx.is_navigated());
        // Actions wait for a navigation
        assert_eq!(handler.action_rounds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_actions_run_once_across_waiting_polls() {
        let api = ScriptedApi::new().polls(
            "m",
            vec![
                state("WAITING"),
                state("WAITING"),
                state("RUNNING"),
                state("WAITING"),
                status("FINISHED", "PASSED"),
            ],
        );
        let events = RunEvents::disabled();
        let mut manager = StateManager::new(&api, settings(1, 60), &[], &events, StopSignal::never());
        let mut ctx = context("m", &["a", "b"]);
        let mut handler = CountingHandler::default();

        manager.poll_until_terminal(&mut ctx, &mut handler).await.unwrap();

        assert_eq!(handler.navigations, 1);
        assert_eq!(handler.action_rounds, 1);
        assert!(!ctx.has_pending_actions());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_last_state() {
        let api = ScriptedApi::new().polls("m", vec![state("RUNNING")]);
        let events = RunEvents::disabled();
        let mut manager = StateManager::new(&api, settings(1, 5), &[], &events, StopSignal::never());
        let mut ctx = context("m", &[]);
        let mut handler = CountingHandler::default();

        let start = Instant::now();
        let err = manager.poll_until_terminal(&mut ctx, &mut handler).await.unwrap_err();
        let elapsed = start.elapsed();

        match err {
            Error::StateTimeout {
                runner_id,
                last_state,
                timeout_ms,
            } => {
                assert_eq!(runner_id, "m-runner");
                assert_eq!(last_state, "RUNNING");
                assert_eq!(timeout_ms, 5000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(elapsed > Duration::from_secs(5));
        assert!(elapsed <= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_captures_from_status_payload() {
        let api = ScriptedApi::new().polls(
            "m",
            vec![json!({
                "status": "finished",
                "result": "passed",
                "exposed": {"client_id": "cid-1", "redirect": "https://rp.example/cb?state=st-2"}
            })],
        );
        let events = RunEvents::disabled();
        let names = vec!["client_id".to_string(), "state".to_string()];
        let mut manager = StateManager::new(&api, settings(1, 60), &names, &events, StopSignal::never());
        let mut ctx = context("m", &[]);
        let mut handler = CountingHandler::default();

        manager.poll_until_terminal(&mut ctx, &mut handler).await.unwrap();

        assert_eq!(ctx.captured["client_id"], "cid-1");
        assert_eq!(ctx.captured["state"], "st-2");
        assert_eq!(ctx.last_state, TestState::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_poll() {
        let api = ScriptedApi::new();
        let events = RunEvents::disabled();
        let (handle, signal) = stop_pair();
        handle.stop();
        let mut manager = StateManager::new(&api, settings(1, 60), &[], &events, signal);
        let mut ctx = context("m", &[]);
        let mut handler = CountingHandler::default();

        let err = manager.poll_until_terminal(&mut ctx, &mut handler).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_sleep() {
        let api = ScriptedApi::new().polls("m", vec![state("RUNNING")]);
        let events = RunEvents::disabled();
        let (handle, signal) = stop_pair();
        let mut manager = StateManager::new(&api, settings(30, 600), &[], &events, signal);
        let mut ctx = context("m", &[]);
        let mut handler = CountingHandler::default();

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            handle.stop();
            handle
        });

        let start = Instant::now();
        let err = manager.poll_until_terminal(&mut ctx, &mut handler).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(30));
        assert_eq!(api.count("info:m-runner"), 1);
        stopper.await.unwrap();
    }
}
