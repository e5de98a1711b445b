//! Chromium navigator using chromiumoxide

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use super::{Navigator, NavigatorFactory};
use crate::common::{Error, Result};
use crate::plan::WaitUntil;

/// Upper bound for a single navigation
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Find a Chromium-family browser binary
///
/// `AUTOPILOT_CHROMIUM_PATH` wins; otherwise the usual names are looked up on
/// PATH. `None` lets chromiumoxide apply its own detection.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("AUTOPILOT_CHROMIUM_PATH") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Opens [`ChromiumNavigator`]s
#[derive(Debug, Clone, Copy)]
pub struct ChromiumFactory {
    pub headless: bool,
}

impl NavigatorFactory for ChromiumFactory {
    fn open(&self) -> Box<dyn Navigator> {
        Box::new(ChromiumNavigator::new(self.headless))
    }
}

struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
}

/// A Chromium session launched on first navigation
pub struct ChromiumNavigator {
    headless: bool,
    session: Option<ChromiumSession>,
}

impl ChromiumNavigator {
    pub fn new(headless: bool) -> Self {
        Self {
            headless,
            session: None,
        }
    }

    pub fn is_launched(&self) -> bool {
        self.session.is_some()
    }

    async fn launch(&mut self, url: &str) -> Result<&Page> {
        if self.session.is_none() {
            let mut builder = BrowserConfig::builder()
                .arg("--no-sandbox")
                .arg("--disable-dev-shm-usage")
                .arg("--disable-gpu")
                .arg("--ignore-certificate-errors");
            if !self.headless {
                builder = builder.with_head();
            }
            if let Some(path) = find_chromium() {
                builder = builder.chrome_executable(path);
            }
            let config = builder.build().map_err(|e| {
                Error::navigation_failed(url, format!("invalid browser config: {e}"))
            })?;

            tracing::debug!(headless = self.headless, "Launching Chromium");
            let (mut browser, mut handler) = Browser::launch(config).await.map_err(|e| {
                Error::navigation_failed(url, format!("failed to launch Chromium: {e}"))
            })?;

            let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

            let page = match browser.new_page("about:blank").await {
                Ok(page) => page,
                Err(e) => {
                    let _ = browser.close().await;
                    handler.abort();
                    return Err(Error::navigation_failed(url, format!("failed to open page: {e}")));
                }
            };

            self.session = Some(ChromiumSession {
                browser,
                handler,
                page,
            });
        }

        match &self.session {
            Some(session) => Ok(&session.page),
            None => Err(Error::Internal("browser session missing after launch".to_string())),
        }
    }
}

#[async_trait]
impl Navigator for ChromiumNavigator {
    async fn navigate(&mut self, url: &str, wait_until: WaitUntil) -> Result<String> {
        let page = self.launch(url).await?;

        match tokio::time::timeout(NAVIGATION_TIMEOUT, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(Error::navigation_failed(url, e)),
            Err(_) => {
                return Err(Error::navigation_failed(
                    url,
                    format!("timed out after {}s", NAVIGATION_TIMEOUT.as_secs()),
                ))
            }
        }

        if wait_until != WaitUntil::DomContentLoaded {
            let _ = tokio::time::timeout(NAVIGATION_TIMEOUT, page.wait_for_navigation()).await;
        }

        let final_url = page
            .url()
            .await
            .map_err(|e| Error::navigation_failed(url, e))?
            .unwrap_or_else(|| url.to_string());
        Ok(final_url)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            tracing::debug!("Closing Chromium");
            let _ = session.page.close().await;
            let _ = session.browser.close().await;
            let _ = session.browser.wait().await;
            session.handler.abort();
        }
        Ok(())
    }
}
