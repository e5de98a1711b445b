//! Remote certification service client
//!
//! Replies are decoded leniently: state and result strings are
//! case-normalised with CREATED/UNKNOWN fallbacks, and every typed reply keeps
//! the raw payload so variables can be harvested from fields the engine does
//! not model.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use super::client::{ExpectStatus, HttpClient, HttpReply, JsonRequest};
use crate::common::{Error, Result};
use crate::engine::capture;
use crate::engine::types::{TestResult, TestState};
use crate::engine::Variables;

/// Reply to runner registration
#[derive(Debug, Clone)]
pub struct RegisteredRunner {
    pub id: String,
    /// URL the reply was requested from; empty when unknown
    pub request_url: String,
    pub raw: Value,
}

/// Module status as reported by `GET /api/info/{id}`
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub status: TestState,
    pub result: TestResult,
    pub redirect_to: Option<String>,
    pub request_url: String,
    pub raw: Value,
}

/// A navigation target tagged with an HTTP method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodUrl {
    pub url: String,
    pub method: String,
}

/// Browser navigation targets published by the remote runner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowserTargets {
    pub urls: Vec<String>,
    pub urls_with_method: Vec<MethodUrl>,
}

impl BrowserTargets {
    /// The first direct URL, else the first GET entry of the method-tagged list
    pub fn select_url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str).or_else(|| {
            self.urls_with_method
                .iter()
                .find(|entry| entry.method.eq_ignore_ascii_case("GET"))
                .map(|entry| entry.url.as_str())
        })
    }

    /// Human-readable listing for "no URL" diagnostics
    pub fn describe(&self) -> String {
        let urls = if self.urls.is_empty() {
            "(empty)".to_string()
        } else {
            self.urls.join(", ")
        };
        let with_method = if self.urls_with_method.is_empty() {
            "(empty)".to_string()
        } else {
            self.urls_with_method
                .iter()
                .map(|entry| format!("{} {}", entry.method, entry.url))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("urls={urls} urlsWithMethod={with_method}")
    }
}

/// Runner details as reported by `GET /api/runner/{id}`
#[derive(Debug, Clone)]
pub struct RunnerInfo {
    pub status: TestState,
    pub browser: BrowserTargets,
    pub request_url: String,
    pub raw: Value,
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn capture_reply(request_url: &str, raw: &Value, names: &[String], store: &mut Variables) {
    capture::capture_from_url(request_url, names, store);
    capture::capture_from_value(raw, names, store);
}

impl RegisteredRunner {
    pub fn from_json(raw: Value) -> Result<Self> {
        let id = str_field(&raw, "id")
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::InvalidResponse("registration reply has no runner id".to_string())
            })?;
        Ok(Self {
            id,
            request_url: String::new(),
            raw,
        })
    }

    pub fn with_request_url(mut self, url: &str) -> Self {
        self.request_url = url.to_string();
        self
    }

    /// Capture from the request URL, then the payload
    pub fn capture_into(&self, names: &[String], store: &mut Variables) {
        capture_reply(&self.request_url, &self.raw, names, store);
    }
}

impl ModuleInfo {
    pub fn from_json(raw: Value) -> Self {
        Self {
            status: TestState::from_remote(str_field(&raw, "status")),
            result: TestResult::from_remote(str_field(&raw, "result")),
            redirect_to: str_field(&raw, "redirect_to").map(str::to_string),
            request_url: String::new(),
            raw,
        }
    }

    pub fn with_request_url(mut self, url: &str) -> Self {
        self.request_url = url.to_string();
        self
    }

    /// Capture from the request URL, then the payload
    pub fn capture_into(&self, names: &[String], store: &mut Variables) {
        capture_reply(&self.request_url, &self.raw, names, store);
    }
}

impl RunnerInfo {
    pub fn from_json(raw: Value) -> Self {
        let browser = raw.get("browser");

        let urls = browser
            .and_then(|b| b.get("urls"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let urls_with_method = browser
            .and_then(|b| b.get("urlsWithMethod"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|entry| {
                        let url = str_field(entry, "url").filter(|u| !u.is_empty())?;
                        let method = str_field(entry, "method")
                            .filter(|m| !m.is_empty())
                            .unwrap_or("GET");
                        Some(MethodUrl {
                            url: url.to_string(),
                            method: method.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            status: TestState::from_remote(str_field(&raw, "status")),
            browser: BrowserTargets {
                urls,
                urls_with_method,
            },
            request_url: String::new(),
            raw,
        }
    }

    pub fn with_request_url(mut self, url: &str) -> Self {
        self.request_url = url.to_string();
        self
    }

    /// Capture from the request URL, then the payload
    pub fn capture_into(&self, names: &[String], store: &mut Variables) {
        capture_reply(&self.request_url, &self.raw, names, store);
    }
}

/// Typed access to the remote certification service
#[async_trait]
pub trait ConformanceClient: Send + Sync {
    /// Register a module of `plan_id` as a new remote runner
    async fn register_runner(&self, plan_id: &str, test_name: &str) -> Result<RegisteredRunner>;

    /// Poll module status
    async fn module_info(&self, runner_id: &str) -> Result<ModuleInfo>;

    /// Fetch navigation targets
    async fn runner_info(&self, runner_id: &str) -> Result<RunnerInfo>;

    /// Fetch log entries; non-array replies decode to an empty list
    async fn module_logs(&self, runner_id: &str) -> Result<Vec<Value>>;

    /// Best-effort stop of a runner
    async fn delete_runner(&self, runner_id: &str) -> Result<()>;
}

/// HTTP implementation of [`ConformanceClient`]
#[derive(Debug, Clone)]
pub struct ConformanceApi {
    http: HttpClient,
}

impl ConformanceApi {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(Some(base_url), Some(token), timeout)?,
        })
    }

    async fn get_json(&self, endpoint: &str) -> Result<HttpReply> {
        let url = self.http.build_url(endpoint)?;
        let reply = self
            .http
            .request_json(
                JsonRequest::new(Method::GET, url.as_str())
                    .headers(self.http.auth_headers(None)?)
                    .expect(ExpectStatus::Codes(vec![200])),
            )
            .await?;
        Ok(reply)
    }
}

#[async_trait]
impl ConformanceClient for ConformanceApi {
    async fn register_runner(&self, plan_id: &str, test_name: &str) -> Result<RegisteredRunner> {
        let mut url = self.http.build_url("api/runner")?;
        url.query_pairs_mut()
            .append_pair("plan", plan_id)
            .append_pair("test", test_name);

        let reply = self
            .http
            .request_json(
                JsonRequest::new(Method::POST, url.as_str())
                    .headers(self.http.auth_headers(None)?)
                    .expect(ExpectStatus::Codes(vec![200, 201])),
            )
            .await?;
        Ok(RegisteredRunner::from_json(reply.body)?.with_request_url(&reply.url))
    }

    async fn module_info(&self, runner_id: &str) -> Result<ModuleInfo> {
        let reply = self.get_json(&format!("api/info/{runner_id}")).await?;
        Ok(ModuleInfo::from_json(reply.body).with_request_url(&reply.url))
    }

    async fn runner_info(&self, runner_id: &str) -> Result<RunnerInfo> {
        let reply = self.get_json(&format!("api/runner/{runner_id}")).await?;
        Ok(RunnerInfo::from_json(reply.body).with_request_url(&reply.url))
    }

    async fn module_logs(&self, runner_id: &str) -> Result<Vec<Value>> {
        match self.get_json(&format!("api/log/{runner_id}")).await?.body {
            Value::Array(entries) => Ok(entries),
            _ => Ok(Vec::new()),
        }
    }

    async fn delete_runner(&self, runner_id: &str) -> Result<()> {
        let url = self.http.build_url(&format!("api/runner/{runner_id}"))?;
        let result = self
            .http
            .request_json(
                JsonRequest::new(Method::DELETE, url.as_str())
                    .headers(self.http.auth_headers(None)?)
                    .expect(ExpectStatus::Codes(vec![200]))
                    .allow_non_json(true),
            )
            .await;
        match result {
            Ok(_) => {
                tracing::debug!(runner_id, "Runner deleted");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(runner_id, error = %e, "Runner deletion failed");
                Err(e)
            }
        }
    }
}
