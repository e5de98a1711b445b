//! Module states, results and the plan summary

use serde::{Deserialize, Serialize};

use super::Variables;

/// Remote module state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestState {
    #[default]
    Created,
    Configured,
    Waiting,
    Running,
    Finished,
    Interrupted,
}

impl TestState {
    /// Decode a remote state string, case-insensitively
    ///
    /// Unrecognised or missing values decode to `Created`.
    pub fn from_remote(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
            Some("CONFIGURED") => Self::Configured,
            Some("WAITING") => Self::Waiting,
            Some("RUNNING") => Self::Running,
            Some("FINISHED") => Self::Finished,
            Some("INTERRUPTED") => Self::Interrupted,
            _ => Self::Created,
        }
    }

    /// FINISHED and INTERRUPTED end the polling loop
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Interrupted)
    }
}

impl std::fmt::Display for TestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Configured => write!(f, "CONFIGURED"),
            Self::Waiting => write!(f, "WAITING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Interrupted => write!(f, "INTERRUPTED"),
        }
    }
}

/// Remote module outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestResult {
    Passed,
    Failed,
    Warning,
    Skipped,
    Review,
    #[default]
    Unknown,
}

impl TestResult {
    /// Decode a remote result string, case-insensitively
    ///
    /// Unrecognised or missing values decode to `Unknown`.
    pub fn from_remote(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
            Some("PASSED") => Self::Passed,
            Some("FAILED") => Self::Failed,
            Some("WARNING") => Self::Warning,
            Some("SKIPPED") => Self::Skipped,
            Some("REVIEW") => Self::Review,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for TestResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Warning => write!(f, "WARNING"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::Review => write!(f, "REVIEW"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Outcome of one module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleResult {
    pub name: String,
    /// Empty when the module never registered
    pub runner_id: String,
    pub state: TestState,
    pub result: TestResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub captured: Variables,
}

/// Plan-level rollup of module outcomes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub plan_id: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warning: usize,
    pub skipped: usize,
    pub review: usize,
    pub unknown: usize,
    pub interrupted: usize,
    pub modules: Vec<ModuleResult>,
}

impl ExecutionSummary {
    pub fn new(plan_id: &str) -> Self {
        Self {
            plan_id: plan_id.to_string(),
            ..Self::default()
        }
    }

    /// Append a module outcome, updating its result bucket and the
    /// independent interrupted count
    pub fn record(&mut self, module: ModuleResult) {
        self.total += 1;
        match module.result {
            TestResult::Passed => self.passed += 1,
            TestResult::Failed => self.failed += 1,
            TestResult::Warning => self.warning += 1,
            TestResult::Skipped => self.skipped += 1,
            TestResult::Review => self.review += 1,
            TestResult::Unknown => self.unknown += 1,
        }
        if module.state == TestState::Interrupted {
            self.interrupted += 1;
        }
        self.modules.push(module);
    }

    /// Whether the run should be reported as unsuccessful
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.interrupted > 0
    }
}
