//! Per-module execution context

use std::collections::HashSet;

use super::events::unix_millis;
use super::types::TestState;
use super::Variables;

/// Mutable state owned by one module's execution
///
/// Navigation and each configured action happen at most once per module,
/// however many times the remote module re-enters WAITING.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    pub module_name: String,
    /// Remote runner id; empty until registration succeeds
    pub runner_id: String,
    /// `{module}-{unix_ms}`, attached to the module span
    pub correlation_id: String,
    pub captured: Variables,
    /// Last state observed while polling
    pub last_state: TestState,
    actions: Vec<String>,
    navigated: bool,
    executed_actions: HashSet<String>,
}

impl ModuleContext {
    pub fn new(module_name: &str, actions: &[String]) -> Self {
        Self {
            module_name: module_name.to_string(),
            runner_id: String::new(),
            correlation_id: format!("{module_name}-{}", unix_millis()),
            captured: Variables::new(),
            last_state: TestState::Created,
            actions: actions.to_vec(),
            navigated: false,
            executed_actions: HashSet::new(),
        }
    }

    pub fn is_navigated(&self) -> bool {
        self.navigated
    }

    pub fn mark_navigated(&mut self) {
        self.navigated = true;
    }

    /// Configured actions not yet executed, in configured order
    /// Actions not yet executed, in plan order, each name once
    pub fn pending_actions(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.actions
            .iter()
            .filter(|name| !self.executed_actions.contains(name.as_str()))
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect()
    }

    pub fn has_pending_actions(&self) -> bool {
        self.actions
            .iter()
            .any(|name| !self.executed_actions.contains(name.as_str()))
    }

    pub fn mark_executed(&mut self, action: &str) {
        self.executed_actions.insert(action.to_string());
    }

    /// Merge newly captured values; new values win
    pub fn absorb(&mut self, captured: Variables) {
        self.captured.extend(captured);
    }
}
