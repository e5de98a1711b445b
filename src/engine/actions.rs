//! Action executor
//!
//! Runs named `api` and `browser` actions with templated inputs and returns
//! what each call captured. The executor itself only holds the action
//! registry; the browser session belongs to the calling module.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use super::{capture, template, Variables};
use crate::api::{ExpectStatus, HttpClient, JsonRequest};
use crate::browser::Navigator;
use crate::common::{Error, Result};
use crate::plan::{ActionConfig, ApiAction, BrowserAction, BrowserOperation, PlanConfig};

pub struct ActionExecutor {
    actions: HashMap<String, ActionConfig>,
    capture_vars: Vec<String>,
    global_variables: Variables,
    http: HttpClient,
}

impl ActionExecutor {
    /// Build the registry from a plan; `http` carries no base URL or token
    pub fn new(plan: &PlanConfig, http: HttpClient) -> Self {
        Self {
            actions: plan
                .actions
                .iter()
                .map(|action| (action.name().to_string(), action.clone()))
                .collect(),
            capture_vars: plan.capture_vars.clone(),
            global_variables: plan.variables.clone(),
            http,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ActionConfig> {
        self.actions.get(name)
    }

    /// Template inputs: globals, then module variables, then captured values
    pub fn merge_variables(&self, captured: &Variables, module_variables: &Variables) -> Variables {
        let mut merged = self.global_variables.clone();
        merged.extend(module_variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.extend(captured.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Execute the action `name`, returning only the values it captured
    pub async fn execute(
        &self,
        name: &str,
        captured: &Variables,
        module_variables: &Variables,
        navigator: &mut dyn Navigator,
    ) -> Result<Variables> {
        let action = self.actions.get(name).ok_or_else(|| {
            let message = format!("Action '{name}' not found in config");
            Error::action_failed(name, "UNKNOWN", &message, None)
        })?;

        let variables = self.merge_variables(captured, module_variables);
        let outcome = match action {
            ActionConfig::Api(api) => self.execute_api(api, &variables).await,
            ActionConfig::Browser(browser) => {
                self.execute_browser(browser, &variables, navigator).await
            }
        };

        outcome.map_err(|e| match e {
            e @ Error::ActionExecution { .. } => e,
            e => Error::action_failed(
                name,
                action.type_name(),
                &format!("Action execution failed: {e}"),
                Some(e),
            ),
        })
    }

    async fn execute_api(&self, action: &ApiAction, variables: &Variables) -> Result<Variables> {
        let endpoint = template::apply_str(&action.endpoint, variables);
        let payload = action
            .payload
            .as_ref()
            .map(|payload| template::apply(payload, variables));
        let headers: Option<BTreeMap<String, String>> = action.headers.as_ref().map(|headers| {
            headers
                .iter()
                .map(|(k, v)| (k.clone(), template::apply_str(v, variables)))
                .collect()
        });

        let expect = match &action.expected_status {
            Some(codes) if !codes.is_empty() => ExpectStatus::Codes(codes.clone()),
            _ => ExpectStatus::Success,
        };

        tracing::debug!(method = ?action.method, endpoint = %endpoint, "Calling action endpoint");
        let reply = self
            .http
            .request_json(
                JsonRequest::new(action.method.into(), &endpoint)
                    .headers(self.http.auth_headers(headers.as_ref())?)
                    .body(payload.as_ref())
                    .expect(expect)
                    .allow_non_json(action.allow_non_json),
            )
            .await?;

        let mut fresh = Variables::new();
        reply.capture_into(&self.capture_vars, &mut fresh);
        Ok(fresh)
    }

    async fn execute_browser(
        &self,
        action: &BrowserAction,
        variables: &Variables,
        navigator: &mut dyn Navigator,
    ) -> Result<Variables> {
        let mut fresh = Variables::new();
        match action.operation {
            BrowserOperation::Navigate => {
                let url = template::apply_str(&action.url, variables);
                let final_url = navigator.navigate(&url, action.wait_for).await?;
                let final_url = Value::String(final_url);
                capture::capture_from_value(&final_url, &self.capture_vars, &mut fresh);
            }
        }
        Ok(fresh)
    }
}
