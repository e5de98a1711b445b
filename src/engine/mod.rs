//! Plan execution engine
//!
//! The runner registers each module with the remote service and hands it to
//! the state manager, which polls until the module reaches a terminal state.
//! While the module is WAITING the runner's handler drives the browser and
//! the configured actions. Captured variables live in the per-module
//! [`context::ModuleContext`] and flow into templates from there.

pub mod actions;
pub mod capture;
pub mod context;
pub mod events;
pub mod runner;
pub mod state;
pub mod template;
pub mod types;

#[cfg(test)]
pub(crate) mod fakes;

use std::collections::BTreeMap;

/// Name to value map used for template inputs and captured values
pub type Variables = BTreeMap<String, String>;

pub use actions::ActionExecutor;
pub use context::ModuleContext;
pub use events::{LogLine, ModuleCard, RunEvent, RunEvents, Severity};
pub use runner::{Runner, RunnerOptions};
pub use state::{
    stop_pair, PollSettings, StateManager, StopHandle, StopSignal, TerminalState, WaitingHandler,
};
pub use types::{ExecutionSummary, ModuleResult, TestResult, TestState};
