//! Scripted collaborators for engine tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::{ConformanceClient, ModuleInfo, RegisteredRunner, RunnerInfo};
use crate::browser::{Navigator, NavigatorFactory};
use crate::common::{Error, Result};
use crate::plan::WaitUntil;

pub fn status(state: &str, result: &str) -> Value {
    json!({"status": state, "result": result})
}

pub fn state(state: &str) -> Value {
    json!({"status": state})
}

#[derive(Default)]
struct Script {
    polls: HashMap<String, VecDeque<Value>>,
    runners: HashMap<String, Value>,
    logs: HashMap<String, Value>,
    failing_registrations: HashSet<String>,
    calls: Vec<String>,
}

/// Conformance service replaying canned replies
///
/// Runner ids are `{test}-runner`. The last scripted poll reply repeats;
/// unscripted modules report RUNNING forever.
#[derive(Default)]
pub struct ScriptedApi {
    script: Mutex<Script>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runner_id(test_name: &str) -> String {
        format!("{test_name}-runner")
    }

    fn edit(mut self, f: impl FnOnce(&mut Script)) -> Self {
        f(self.script.get_mut().unwrap());
        self
    }

    pub fn polls(self, test_name: &str, replies: Vec<Value>) -> Self {
        let id = Self::runner_id(test_name);
        self.edit(|s| {
            s.polls.insert(id, replies.into());
        })
    }

    pub fn runner(self, test_name: &str, reply: Value) -> Self {
        let id = Self::runner_id(test_name);
        self.edit(|s| {
            s.runners.insert(id, reply);
        })
    }

    pub fn logs(self, test_name: &str, reply: Value) -> Self {
        let id = Self::runner_id(test_name);
        self.edit(|s| {
            s.logs.insert(id, reply);
        })
    }

    pub fn failing_registration(self, test_name: &str) -> Self {
        let name = test_name.to_string();
        self.edit(|s| {
            s.failing_registrations.insert(name);
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: String) {
        self.script.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl ConformanceClient for ScriptedApi {
    async fn register_runner(&self, plan_id: &str, test_name: &str) -> Result<RegisteredRunner> {
        self.record(format!("register:{test_name}"));
        if self.script.lock().unwrap().failing_registrations.contains(test_name) {
            return Err(Error::HttpStatus {
                status: 500,
                body: "registration refused".to_string(),
            });
        }
        let url = format!("https://suite.example/api/runner?plan={plan_id}&test={test_name}");
        let registered = RegisteredRunner::from_json(json!({"id": Self::runner_id(test_name)}))?;
        Ok(registered.with_request_url(&url))
    }

    async fn module_info(&self, runner_id: &str) -> Result<ModuleInfo> {
        self.record(format!("info:{runner_id}"));
        let mut script = self.script.lock().unwrap();
        let reply = match script.polls.get_mut(runner_id) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(ModuleInfo::from_json(reply.unwrap_or_else(|| state("RUNNING"))))
    }

    async fn runner_info(&self, runner_id: &str) -> Result<RunnerInfo> {
        self.record(format!("runner:{runner_id}"));
        let reply = self
            .script
            .lock()
            .unwrap()
            .runners
            .get(runner_id)
            .cloned()
            .unwrap_or_else(|| json!({}));
        Ok(RunnerInfo::from_json(reply))
    }

    async fn module_logs(&self, runner_id: &str) -> Result<Vec<Value>> {
        self.record(format!("log:{runner_id}"));
        let reply = self.script.lock().unwrap().logs.get(runner_id).cloned();
        match reply {
            Some(Value::Array(entries)) => Ok(entries),
            _ => Ok(Vec::new()),
        }
    }

    async fn delete_runner(&self, runner_id: &str) -> Result<()> {
        self.record(format!("delete:{runner_id}"));
        Ok(())
    }
}

#[derive(Default)]
struct NavLog {
    visits: Vec<String>,
    opened: usize,
    closed: usize,
}

/// Navigator factory recording every visit
#[derive(Clone, Default)]
pub struct RecordingFactory {
    log: Arc<Mutex<NavLog>>,
    redirects: HashMap<String, String>,
    failing: bool,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `to` as the final URL when `from` is visited
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    /// Every navigation fails
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn navigator(&self) -> RecordingNavigator {
        RecordingNavigator {
            log: Arc::clone(&self.log),
            redirects: self.redirects.clone(),
            failing: self.failing,
        }
    }

    pub fn visits(&self) -> Vec<String> {
        self.log.lock().unwrap().visits.clone()
    }

    pub fn opened(&self) -> usize {
        self.log.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.log.lock().unwrap().closed
    }
}

impl NavigatorFactory for RecordingFactory {
    fn open(&self) -> Box<dyn Navigator> {
        self.log.lock().unwrap().opened += 1;
        Box::new(self.navigator())
    }
}

pub struct RecordingNavigator {
    log: Arc<Mutex<NavLog>>,
    redirects: HashMap<String, String>,
    failing: bool,
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn navigate(&mut self, url: &str, _wait_until: WaitUntil) -> Result<String> {
        self.log.lock().unwrap().visits.push(url.to_string());
        if self.failing {
            return Err(Error::navigation_failed(url, "net::ERR_CONNECTION_REFUSED"));
        }
        Ok(self.redirects.get(url).cloned().unwrap_or_else(|| url.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().closed += 1;
        Ok(())
    }
}
