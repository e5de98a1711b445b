//! Plan configuration types
//!
//! Defines the data structures for deserializing JSON plan files.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::common::{Error, Result};
use crate::engine::Variables;

/// A complete plan loaded from a JSON file
#[derive(Deserialize, Debug, Clone)]
pub struct PlanConfig {
    /// Names harvested from every API response, URL and action reply
    #[serde(default)]
    pub capture_vars: Vec<String>,
    /// Global template variables
    #[serde(default)]
    pub variables: Variables,
    /// Named actions referenced by modules
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
    /// Modules in execution order
    pub modules: Vec<ModuleConfig>,
}

/// One test module of the plan
#[derive(Deserialize, Debug, Clone)]
pub struct ModuleConfig {
    /// Remote test name; unique within the plan
    pub name: String,
    /// Per-module variables, overriding globals
    #[serde(default)]
    pub variables: Variables,
    /// Actions to run while the module is WAITING, in order
    #[serde(default)]
    pub actions: Vec<String>,
}

/// A named side-effecting step
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    /// HTTP call
    Api(ApiAction),
    /// Browser navigation
    Browser(BrowserAction),
}

impl ActionConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Api(action) => &action.name,
            Self::Browser(action) => &action.name,
        }
    }

    /// Type tag as written in the config file
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Api(_) => "api",
            Self::Browser(_) => "browser",
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiAction {
    pub name: String,
    /// Endpoint URL template
    pub endpoint: String,
    pub method: HttpMethod,
    /// JSON payload template
    pub payload: Option<Value>,
    /// Header templates
    pub headers: Option<BTreeMap<String, String>>,
    /// Tolerate non-JSON response bodies (default: true)
    #[serde(default = "default_allow_non_json")]
    pub allow_non_json: bool,
    /// Accepted statuses; any 2xx when absent
    pub expected_status: Option<Vec<u16>>,
}

fn default_allow_non_json() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone)]
pub struct BrowserAction {
    pub name: String,
    pub operation: BrowserOperation,
    /// Target URL template
    pub url: String,
    /// Load state to wait for (default: networkidle)
    #[serde(default)]
    pub wait_for: WaitUntil,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrowserOperation {
    Navigate,
}

/// Page load state a navigation waits for
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    #[serde(rename = "load")]
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[default]
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

/// HTTP methods allowed for `api` actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unsupported HTTP method '{other}'")),
        }
    }
}

impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl PlanConfig {
    /// Read, parse and validate a plan file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let config = Self::parse(&content)
            .map_err(|e| Error::ConfigParse(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a plan without validating cross references
    pub fn parse(content: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Check structural invariants that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.modules.is_empty() {
            return Err(Error::Config(
                "No test modules found in configuration file".to_string(),
            ));
        }

        if let Some(name) = self.capture_vars.iter().find(|n| n.trim().is_empty()) {
            return Err(Error::Config(format!(
                "Capture variable names must not be empty (got '{name}')"
            )));
        }

        let mut action_names = HashSet::new();
        for action in &self.actions {
            if action.name().is_empty() {
                return Err(Error::Config("Action name must not be empty".to_string()));
            }
            if !action_names.insert(action.name()) {
                return Err(Error::Config(format!(
                    "Duplicate action name '{}'",
                    action.name()
                )));
            }
        }

        let mut module_names = HashSet::new();
        for module in &self.modules {
            if module.name.is_empty() {
                return Err(Error::Config("Module name must not be empty".to_string()));
            }
            if !module_names.insert(module.name.as_str()) {
                return Err(Error::Config(format!(
                    "Duplicate module name '{}'",
                    module.name
                )));
            }
            if let Some(missing) = module
                .actions
                .iter()
                .find(|name| !action_names.contains(name.as_str()))
            {
                return Err(Error::Config(format!(
                    "Module '{}' references unknown action '{}'",
                    module.name, missing
                )));
            }
        }

        Ok(())
    }
}
