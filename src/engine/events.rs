//! Run events
//!
//! Progress lines are written to tracing and, when a listener is attached,
//! broadcast to it as [`RunEvent`]s. The dashboard is the only listener.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::broadcast;

use super::types::{ExecutionSummary, ModuleResult, TestResult, TestState};

/// Milliseconds since the Unix epoch
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// One log-feed line
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
    /// Unix milliseconds
    pub at: u64,
}

/// Dashboard view of one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCard {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<TestState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
}

impl ModuleCard {
    pub fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            runner_id: None,
            state: None,
            result: None,
            error: None,
            last_message: None,
        }
    }
}

impl From<&ModuleResult> for ModuleCard {
    fn from(module: &ModuleResult) -> Self {
        Self {
            name: module.name.clone(),
            runner_id: Some(module.runner_id.clone()).filter(|id| !id.is_empty()),
            state: Some(module.state),
            result: Some(module.result),
            error: module.error_message.clone(),
            last_message: None,
        }
    }
}

/// Something that happened during a run
#[derive(Debug, Clone)]
pub enum RunEvent {
    Log(LogLine),
    ModuleList(Vec<String>),
    ModuleUpdate(ModuleCard),
    PlanDone(ExecutionSummary),
    Stopped,
}

impl RunEvent {
    /// SSE event name; `None` for plain log lines
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Self::Log(_) => None,
            Self::ModuleList(_) => Some("moduleList"),
            Self::ModuleUpdate(_) => Some("moduleUpdate"),
            Self::PlanDone(_) => Some("planDone"),
            Self::Stopped => Some("stopped"),
        }
    }

    /// JSON payload sent to listeners
    pub fn payload(&self) -> serde_json::Value {
        let value = match self {
            Self::Log(line) => serde_json::to_value(line),
            Self::ModuleList(names) => serde_json::to_value(names),
            Self::ModuleUpdate(card) => serde_json::to_value(card),
            Self::PlanDone(summary) => serde_json::to_value(summary),
            Self::Stopped => Ok(serde_json::json!({})),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

/// Logs progress and forwards it to an optional listener
#[derive(Debug, Clone, Default)]
pub struct RunEvents {
    tx: Option<broadcast::Sender<RunEvent>>,
}

impl RunEvents {
    pub fn new(tx: broadcast::Sender<RunEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Events go to tracing only
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.tx {
            // No subscribers is fine
            let _ = tx.send(event);
        }
    }

    pub fn log(
        &self,
        severity: Severity,
        module: Option<&str>,
        action: Option<&str>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        match severity {
            Severity::Debug => tracing::debug!(action, "{message}"),
            Severity::Info => tracing::info!(action, "{message}"),
            Severity::Warn => tracing::warn!(action, "{message}"),
            Severity::Error => tracing::error!(action, "{message}"),
        }

        if self.tx.is_some() {
            self.emit(RunEvent::Log(LogLine {
                severity,
                message,
                module_name: module.map(str::to_string),
                action_name: action.map(str::to_string),
                at: unix_millis(),
            }));
        }
    }

    pub fn debug(&self, module: &str, message: impl Into<String>) {
        self.log(Severity::Debug, Some(module), None, message);
    }

    pub fn info(&self, module: &str, message: impl Into<String>) {
        self.log(Severity::Info, Some(module), None, message);
    }

    pub fn warn(&self, module: &str, message: impl Into<String>) {
        self.log(Severity::Warn, Some(module), None, message);
    }

    pub fn error(&self, module: &str, message: impl Into<String>) {
        self.log(Severity::Error, Some(module), None, message);
    }

    pub fn action(&self, module: &str, action: &str, message: impl Into<String>) {
        self.log(Severity::Info, Some(module), Some(action), message);
    }
}
