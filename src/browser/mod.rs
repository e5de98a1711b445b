//! Browser capability
//!
//! The engine only needs "open this URL and tell me where the redirects
//! ended". [`Navigator`] is that capability; [`NavigatorFactory`] hands out
//! one navigator per module so browser state never leaks between modules.

pub mod chromium;

use async_trait::async_trait;

use crate::common::Result;
use crate::plan::WaitUntil;

pub use chromium::{ChromiumFactory, ChromiumNavigator};

/// A browser session that can follow redirects
#[async_trait]
pub trait Navigator: Send {
    /// Navigate to `url` and return the final URL after redirects
    async fn navigate(&mut self, url: &str, wait_until: WaitUntil) -> Result<String>;

    /// Release the session; safe to call when nothing was opened
    async fn close(&mut self) -> Result<()>;
}

/// Creates a fresh navigator for each module
pub trait NavigatorFactory: Send + Sync {
    fn open(&self) -> Box<dyn Navigator>;
}
