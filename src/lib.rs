//! Conformance Autopilot
//!
//! Drives conformance-suite test plans without a human at the browser:
//! modules are registered, polled until they finish, pointed at the
//! relying party through a headless browser and fed the callback requests
//! the plan describes.

pub mod api;
pub mod browser;
pub mod cli;
pub mod commands;
pub mod common;
pub mod dashboard;
pub mod engine;
pub mod plan;

// Re-export commonly used types for tests
pub use common::{Error, Result};
