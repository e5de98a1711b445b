//! Plan configuration
//!
//! A plan is an ordered list of modules plus the shared variables, actions
//! and capture names they use. Plans are JSON files validated at load time,
//! so the engine never meets an unknown action type or a dangling reference.

mod config;
mod discover;

pub use config::*;
pub use discover::{discover_plan_files, PLAN_SUFFIX};
