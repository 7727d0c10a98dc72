//! Browser driver capability set
//!
//! The harness never talks to a browser directly. Everything it needs is
//! expressed here, so any automation backend that implements these traits
//! is interchangeable with the bundled Playwright bridge.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::E2eResult;
use crate::locator::Locator;

/// One isolated browser context, owned by exactly one scenario
#[async_trait]
pub trait BrowserDriver: Send {
    /// Load a URL. Relative paths resolve against the configured base URL.
    async fn goto(&mut self, url: &str) -> E2eResult<()>;

    /// Wait until the current URL ends with `route`. Returns `false` on timeout.
    async fn wait_for_url(&mut self, route: &str, timeout: Duration) -> E2eResult<bool>;

    /// Wait until the element is attached and visible. Returns `false` on timeout.
    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<bool>;

    /// Replace the contents of a text input
    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()>;

    /// Pick an option in a `<select>` by value or label
    async fn select_option(&mut self, locator: &Locator, value: &str) -> E2eResult<()>;

    async fn click(&mut self, locator: &Locator) -> E2eResult<()>;

    /// Text content of the element, `None` when it is empty
    async fn text_content(&mut self, locator: &Locator) -> E2eResult<Option<String>>;

    async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool>;

    async fn current_url(&mut self) -> E2eResult<String>;

    /// Write a full-page screenshot to `path`
    async fn screenshot(&mut self, path: &Path) -> E2eResult<()>;

    /// Tear down the browser context. Called once at scenario end.
    async fn close(&mut self) -> E2eResult<()>;
}

/// Creates a fresh, isolated session for each scenario
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserDriver>>;
}
