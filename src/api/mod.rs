//! Remote certification API
//!
//! `client` is a small JSON-over-HTTP layer shared with `api` actions;
//! `conformance` models the endpoints the engine drives.

pub mod client;
pub mod conformance;

pub use client::{ExpectStatus, HttpClient, HttpReply, JsonRequest};
pub use conformance::{
    BrowserTargets, ConformanceApi, ConformanceClient, MethodUrl, ModuleInfo, RegisteredRunner,
    RunnerInfo,
};
