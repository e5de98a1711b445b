//! Plan runner
//!
//! Executes the modules of a plan one after another. Each module gets its own
//! context, browser session and remote runner; the summary keeps plan order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::Instrument;

use super::actions::ActionExecutor;
use super::capture;
use super::context::ModuleContext;
use super::events::{ModuleCard, RunEvent, RunEvents, Severity};
use super::state::{PollSettings, StateManager, StopSignal, WaitingHandler};
use super::types::{ExecutionSummary, ModuleResult, TestResult, TestState};
use super::Variables;
use crate::api::{ConformanceClient, HttpClient, RunnerInfo};
use crate::browser::{Navigator, NavigatorFactory};
use crate::common::{Error, Result};
use crate::plan::{ModuleConfig, PlanConfig, WaitUntil};

/// Upper bound for the remote cleanup spawned on stop
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

const STOPPED_MESSAGE: &str = "Stopped by user";

#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Record a failing module as FAILED and keep going instead of aborting
    pub continue_on_error: bool,
}

pub struct Runner {
    api: Arc<dyn ConformanceClient>,
    navigators: Arc<dyn NavigatorFactory>,
    http: HttpClient,
    options: RunnerOptions,
    events: RunEvents,
    stop: StopSignal,
}

impl Runner {
    /// `http` is used by `api` actions and should carry no base URL or token
    pub fn new(
        api: Arc<dyn ConformanceClient>,
        navigators: Arc<dyn NavigatorFactory>,
        http: HttpClient,
        options: RunnerOptions,
    ) -> Self {
        Self {
            api,
            navigators,
            http,
            options,
            events: RunEvents::disabled(),
            stop: StopSignal::never(),
        }
    }

    pub fn with_events(mut self, events: RunEvents) -> Self {
        self.events = events;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Execute every module of `plan` in order
    ///
    /// Registration failures abort the plan as-is. Other module failures
    /// abort it as `ModuleExecution` errors unless `continue_on_error` is
    /// set. A stop request ends the run early with the in-flight and
    /// remaining modules recorded as INTERRUPTED.
    pub async fn execute_plan(&self, plan_id: &str, plan: &PlanConfig) -> Result<ExecutionSummary> {
        let executor = ActionExecutor::new(plan, self.http.clone());
        let mut summary = ExecutionSummary::new(plan_id);

        self.events.emit(RunEvent::ModuleList(
            plan.modules.iter().map(|m| m.name.clone()).collect(),
        ));

        for (index, module) in plan.modules.iter().enumerate() {
            if self.stop.is_stopped() {
                self.interrupt_remaining(&mut summary, &plan.modules[index..]);
                break;
            }

            let mut ctx = ModuleContext::new(&module.name, &module.actions);
            let span = tracing::info_span!(
                "module",
                name = %module.name,
                correlation_id = %ctx.correlation_id
            );
            let outcome = self
                .execute_module(plan_id, plan, module, &executor, &mut ctx)
                .instrument(span)
                .await;

            match outcome {
                Ok(result) => self.record(&mut summary, result),
                Err(err) if err.is_cancelled() => {
                    self.events.warn(&module.name, "Execution stopped by user");
                    self.spawn_cleanup(&ctx.runner_id);
                    self.record(
                        &mut summary,
                        interrupted(&module.name, &ctx.runner_id, ctx.captured.clone()),
                    );
                    self.interrupt_remaining(&mut summary, &plan.modules[index + 1..]);
                    break;
                }
                Err(err @ Error::ModuleExecution { .. }) if self.options.continue_on_error => {
                    self.record(
                        &mut summary,
                        ModuleResult {
                            name: module.name.clone(),
                            runner_id: ctx.runner_id.clone(),
                            state: ctx.last_state,
                            result: TestResult::Failed,
                            error_message: Some(err.to_string()),
                            captured: ctx.captured.clone(),
                        },
                    );
                }
                Err(err) => return Err(err),
            }
        }

        tracing::info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            interrupted = summary.interrupted,
            "Plan execution finished"
        );
        self.events.emit(RunEvent::PlanDone(summary.clone()));
        Ok(summary)
    }

    async fn execute_module(
        &self,
        plan_id: &str,
        plan: &PlanConfig,
        module: &ModuleConfig,
        executor: &ActionExecutor,
        ctx: &mut ModuleContext,
    ) -> Result<ModuleResult> {
        self.events.info(&module.name, "Registering...");
        let registered = self.api.register_runner(plan_id, &module.name).await?;
        registered.capture_into(&plan.capture_vars, &mut ctx.captured);
        ctx.runner_id = registered.id;
        self.events
            .info(&module.name, format!("Registering... OK (ID: {})", ctx.runner_id));
        self.events.emit(RunEvent::ModuleUpdate(ModuleCard {
            runner_id: Some(ctx.runner_id.clone()),
            state: Some(TestState::Created),
            ..ModuleCard::pending(&module.name)
        }));

        let mut driver = ModuleDriver {
            api: self.api.as_ref(),
            executor,
            module,
            capture_vars: &plan.capture_vars,
            navigator: self.navigators.open(),
            events: &self.events,
        };
        let settings = PollSettings {
            poll_interval: self.options.poll_interval,
            timeout: self.options.timeout,
        };
        let mut manager = StateManager::new(
            self.api.as_ref(),
            settings,
            &plan.capture_vars,
            &self.events,
            self.stop.clone(),
        );

        let outcome = manager.poll_until_terminal(ctx, &mut driver).await;

        if let Err(e) = driver.navigator.close().await {
            tracing::warn!(error = %e, "Failed to close browser");
        }

        let terminal = match outcome {
            Ok(terminal) => terminal,
            Err(err) => {
                if !err.is_cancelled() {
                    self.report_failure(&module.name, &err);
                }
                return Err(Error::module_failed(
                    &module.name,
                    &ctx.last_state.to_string(),
                    err,
                ));
            }
        };

        self.events.info(
            &module.name,
            format!("Module execution completed ({} / {})", terminal.state, terminal.result),
        );

        Ok(ModuleResult {
            name: module.name.clone(),
            runner_id: ctx.runner_id.clone(),
            state: terminal.state,
            result: terminal.result,
            error_message: None,
            captured: ctx.captured.clone(),
        })
    }

    fn report_failure(&self, module: &str, err: &Error) {
        match err {
            Error::StateTimeout { last_state, .. } => {
                self.events.error(module, format!("Timeout in state {last_state}"))
            }
            Error::ActionExecution { action, message, .. } => self.events.log(
                Severity::Error,
                Some(module),
                Some(action),
                format!("Action {action} failed: {message}"),
            ),
            other => self.events.error(module, other.to_string()),
        }
    }

    fn record(&self, summary: &mut ExecutionSummary, result: ModuleResult) {
        self.events.emit(RunEvent::ModuleUpdate(ModuleCard::from(&result)));
        summary.record(result);
    }

    fn interrupt_remaining(&self, summary: &mut ExecutionSummary, modules: &[ModuleConfig]) {
        for module in modules {
            self.record(summary, interrupted(&module.name, "", Default::default()));
        }
    }

    /// Best-effort remote stop; never awaited by the run
    fn spawn_cleanup(&self, runner_id: &str) {
        if runner_id.is_empty() {
            return;
        }
        let api = Arc::clone(&self.api);
        let runner_id = runner_id.to_string();

        tokio::spawn(async move {
            let cleanup = async {
                if let Err(e) = api.delete_runner(&runner_id).await {
                    tracing::warn!(runner_id, error = %e, "Failed to stop remote runner");
                }
                match api.module_info(&runner_id).await {
                    Ok(info) => {
                        tracing::info!(runner_id, state = %info.status, "Runner state after stop")
                    }
                    Err(e) => {
                        tracing::debug!(runner_id, error = %e, "No runner state after stop")
                    }
                }
            };
            if tokio::time::timeout(CLEANUP_TIMEOUT, cleanup).await.is_err() {
                tracing::warn!(runner_id, "Remote cleanup timed out");
            }
        });
    }
}

fn interrupted(name: &str, runner_id: &str, captured: Variables) -> ModuleResult {
    ModuleResult {
        name: name.to_string(),
        runner_id: runner_id.to_string(),
        state: TestState::Interrupted,
        result: TestResult::Unknown,
        error_message: Some(STOPPED_MESSAGE.to_string()),
        captured,
    }
}

/// Navigates and runs actions for one module
struct ModuleDriver<'a> {
    api: &'a dyn ConformanceClient,
    executor: &'a ActionExecutor,
    module: &'a ModuleConfig,
    capture_vars: &'a [String],
    navigator: Box<dyn Navigator>,
    events: &'a RunEvents,
}

#[async_trait]
impl WaitingHandler for ModuleDriver<'_> {
    async fn navigate(&mut self, runner: &RunnerInfo, ctx: &mut ModuleContext) -> Result<bool> {
        let Some(url) = runner.browser.select_url() else {
            self.events.info(
                &self.module.name,
                format!("No browser URL found. {}", runner.browser.describe()),
            );
            return Ok(false);
        };

        self.events.info(&self.module.name, format!("Navigating to URL: {url}"));
        capture::capture_from_url(url, self.capture_vars, &mut ctx.captured);
        let final_url = self.navigator.navigate(url, WaitUntil::NetworkIdle).await?;
        capture::capture_from_url(&final_url, self.capture_vars, &mut ctx.captured);
        self.events.info(
            &self.module.name,
            format!("Navigation completed for URL: {final_url}"),
        );
        Ok(true)
    }

    async fn execute_actions(&mut self, ctx: &mut ModuleContext) -> Result<()> {
        let logs = self.api.module_logs(&ctx.runner_id).await?;
        capture::capture_from_value(&Value::Array(logs), self.capture_vars, &mut ctx.captured);
        self.events.debug(&self.module.name, "Logs retrieved for action execution.");

        for name in ctx.pending_actions() {
            self.events
                .action(&self.module.name, &name, format!("Executing action '{name}'..."));

            let fresh = self
                .executor
                .execute(&name, &ctx.captured, &self.module.variables, self.navigator.as_mut())
                .instrument(tracing::info_span!("action", name = %name))
                .await?;
            ctx.absorb(fresh);
            ctx.mark_executed(&name);

            self.events
                .action(&self.module.name, &name, format!("Action '{name}' completed."));
        }
        Ok(())
    }
}
