//! Playwright browser automation
//!
//! Each session runs a small Node.js bridge that owns one browser, one
//! context and one page. Rust sends one JSON command per line on stdin and
//! reads one JSON response per line from stdout; requests are strictly
//! sequential.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, info, warn};

use crate::driver::{BrowserDriver, BrowserLauncher};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

/// Extra time given to the bridge on top of the Playwright-side timeout
const BRIDGE_GRACE: Duration = Duration::from_secs(5);

/// Budget for starting the browser itself
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for Playwright sessions
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub node_path: PathBuf,
    pub node_modules_dir: Option<PathBuf>,
    pub navigation_timeout: Duration,
    pub action_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_path: PathBuf::from("node"),
            node_modules_dir: None,
            navigation_timeout: Duration::from_secs(10),
            action_timeout: Duration::from_secs(5),
        }
    }
}

/// One request to the bridge. The `op` tag matches a `case` in [`BRIDGE_SCRIPT`].
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeCommand<'a> {
    Launch {
        browser: &'a str,
        headless: bool,
        base_url: &'a str,
        width: u32,
        height: u32,
    },
    Goto {
        url: &'a str,
        timeout_ms: u64,
    },
    WaitForUrl {
        route: &'a str,
        timeout_ms: u64,
    },
    WaitFor {
        locator: &'a Locator,
        timeout_ms: u64,
    },
    Fill {
        locator: &'a Locator,
        value: &'a str,
        timeout_ms: u64,
    },
    SelectOption {
        locator: &'a Locator,
        value: &'a str,
        timeout_ms: u64,
    },
    Click {
        locator: &'a Locator,
        timeout_ms: u64,
    },
    TextContent {
        locator: &'a Locator,
        timeout_ms: u64,
    },
    IsVisible {
        locator: &'a Locator,
    },
    CurrentUrl,
    Screenshot {
        path: &'a Path,
    },
    Close,
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    command: BridgeCommand<'a>,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    timeout: bool,
}

/// Node.js side of the bridge
pub const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const { chromium, firefox, webkit } = require('playwright');

const engines = { chromium, firefox, webkit };
let browser = null;
let page = null;

function locate(l) {
  switch (l.kind) {
    case 'test_id': return page.getByTestId(l.key).first();
    case 'role': return page.getByRole(l.role, { name: l.name, exact: true }).first();
    case 'text': return page.getByText(l.text).first();
    default: throw new Error('unknown locator kind: ' + l.kind);
  }
}

function onRoute(route) {
  const want = route.replace(/\/$/, '');
  return (url) => {
    const path = url.pathname.replace(/\/$/, '');
    return want === '' ? path === '' : path.endsWith(want);
  };
}

async function orFalse(promise) {
  try {
    await promise;
    return true;
  } catch (e) {
    if (e.name === 'TimeoutError') return false;
    throw e;
  }
}

async function handle(cmd) {
  switch (cmd.op) {
    case 'launch': {
      browser = await engines[cmd.browser].launch({ headless: cmd.headless });
      const context = await browser.newContext({
        baseURL: cmd.base_url,
        viewport: { width: cmd.width, height: cmd.height },
      });
      page = await context.newPage();
      return null;
    }
    case 'goto':
      await page.goto(cmd.url, { timeout: cmd.timeout_ms });
      return null;
    case 'wait_for_url':
      return await orFalse(page.waitForURL(onRoute(cmd.route), { timeout: cmd.timeout_ms }));
    case 'wait_for':
      return await orFalse(locate(cmd.locator).waitFor({ state: 'visible', timeout: cmd.timeout_ms }));
    case 'fill':
      await locate(cmd.locator).fill(cmd.value, { timeout: cmd.timeout_ms });
      return null;
    case 'select_option':
      await locate(cmd.locator).selectOption(cmd.value, { timeout: cmd.timeout_ms });
      return null;
    case 'click':
      await locate(cmd.locator).click({ timeout: cmd.timeout_ms });
      return null;
    case 'text_content':
      return await locate(cmd.locator).textContent({ timeout: cmd.timeout_ms });
    case 'is_visible':
      return await locate(cmd.locator).isVisible();
    case 'current_url':
      return page.url();
    case 'screenshot':
      await page.screenshot({ path: cmd.path, fullPage: true });
      return null;
    case 'close':
      if (browser) await browser.close();
      browser = null;
      return null;
    default:
      throw new Error('unknown op: ' + cmd.op);
  }
}

function reply(obj) {
  process.stdout.write(JSON.stringify(obj) + '\n');
}

const rl = readline.createInterface({ input: process.stdin });
let queue = Promise.resolve();
rl.on('line', (line) => {
  queue = queue.then(async () => {
    let cmd = null;
    try {
      cmd = JSON.parse(line);
      const value = await handle(cmd);
      reply({ id: cmd.id, ok: true, value: value === undefined ? null : value });
    } catch (e) {
      reply({ id: cmd ? cmd.id : null, ok: false, error: String(e.message || e), timeout: e.name === 'TimeoutError' });
    }
    if (cmd && cmd.op === 'close') process.exit(0);
  });
});
rl.on('close', async () => {
  if (browser) await browser.close();
  process.exit(0);
});
"#;

/// A live Playwright session backed by one bridge process
pub struct PlaywrightDriver {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    navigation_timeout: Duration,
    action_timeout: Duration,
    /// Set once a response went missing; the stream can no longer be trusted
    poisoned: bool,
    closed: bool,
    // Holds the bridge script for the lifetime of the process
    _script_dir: tempfile::TempDir,
}

impl PlaywrightDriver {
    /// Start a bridge process and open a fresh browser context
    pub async fn launch(config: &PlaywrightConfig) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("formflow-bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let node_modules = config
            .node_modules_dir
            .clone()
            .or_else(|| std::env::current_dir().ok().map(|d| d.join("node_modules")));

        let mut cmd = TokioCommand::new(&config.node_path);
        cmd.arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &node_modules {
            cmd.env("NODE_PATH", dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            E2eError::Playwright(format!(
                "Failed to start {}: {}",
                config.node_path.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdout unavailable".into()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[bridge] {}", line);
                }
            });
        }

        let mut driver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            navigation_timeout: config.navigation_timeout,
            action_timeout: config.action_timeout,
            poisoned: false,
            closed: false,
            _script_dir: script_dir,
        };

        driver
            .request(
                BridgeCommand::Launch {
                    browser: config.browser.as_str(),
                    headless: config.headless,
                    base_url: &config.base_url,
                    width: config.viewport_width,
                    height: config.viewport_height,
                },
                LAUNCH_TIMEOUT,
            )
            .await?;

        debug!("Playwright session ready ({})", config.browser.as_str());
        Ok(driver)
    }

    /// Send one command and wait for its response.
    ///
    /// `budget` is the Playwright-side timeout; the Rust side waits a little
    /// longer so the bridge can report its own timeout first.
    async fn request(
        &mut self,
        command: BridgeCommand<'_>,
        budget: Duration,
    ) -> E2eResult<serde_json::Value> {
        if self.poisoned {
            return Err(E2eError::Bridge("session is unusable after a lost response".into()));
        }

        self.next_id += 1;
        let id = self.next_id;
        let mut line = serde_json::to_string(&Envelope { id, command })?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let read = tokio::time::timeout(budget + BRIDGE_GRACE, self.stdout.next_line()).await;
        let line = match read {
            Ok(result) => result?,
            Err(_) => {
                self.poisoned = true;
                return Err(E2eError::Timeout(format!("bridge response to request {}", id)));
            }
        };
        let line = line.ok_or_else(|| {
            self.poisoned = true;
            E2eError::Bridge("bridge exited unexpectedly".into())
        })?;

        let response: BridgeResponse = serde_json::from_str(&line)?;
        if response.id != Some(id) {
            self.poisoned = true;
            return Err(E2eError::Bridge(format!(
                "response id {:?} does not match request {}",
                response.id, id
            )));
        }

        if response.ok {
            Ok(response.value)
        } else {
            let error = response.error.unwrap_or_else(|| "unknown bridge error".into());
            if response.timeout {
                Err(E2eError::Timeout(error))
            } else {
                Err(E2eError::Playwright(error))
            }
        }
    }

    fn millis(d: Duration) -> u64 {
        d.as_millis() as u64
    }
}

fn expect_bool(value: serde_json::Value) -> E2eResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| E2eError::Bridge(format!("expected boolean, got {}", value)))
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    async fn goto(&mut self, url: &str) -> E2eResult<()> {
        let timeout = self.navigation_timeout;
        let timeout_ms = Self::millis(timeout);
        self.request(BridgeCommand::Goto { url, timeout_ms }, timeout)
            .await
            .map(|_| ())
    }

    async fn wait_for_url(&mut self, route: &str, timeout: Duration) -> E2eResult<bool> {
        let timeout_ms = Self::millis(timeout);
        let value = self
            .request(BridgeCommand::WaitForUrl { route, timeout_ms }, timeout)
            .await?;
        expect_bool(value)
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<bool> {
        let timeout_ms = Self::millis(timeout);
        let value = self
            .request(BridgeCommand::WaitFor { locator, timeout_ms }, timeout)
            .await?;
        expect_bool(value)
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        let timeout = self.action_timeout;
        let timeout_ms = Self::millis(timeout);
        self.request(
            BridgeCommand::Fill {
                locator,
                value,
                timeout_ms,
            },
            timeout,
        )
        .await
        .map(|_| ())
    }

    async fn select_option(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        let timeout = self.action_timeout;
        let timeout_ms = Self::millis(timeout);
        self.request(
            BridgeCommand::SelectOption {
                locator,
                value,
                timeout_ms,
            },
            timeout,
        )
        .await
        .map(|_| ())
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        let timeout = self.action_timeout;
        let timeout_ms = Self::millis(timeout);
        self.request(BridgeCommand::Click { locator, timeout_ms }, timeout)
            .await
            .map(|_| ())
    }

    async fn text_content(&mut self, locator: &Locator) -> E2eResult<Option<String>> {
        let timeout = self.action_timeout;
        let timeout_ms = Self::millis(timeout);
        let value = self
            .request(BridgeCommand::TextContent { locator, timeout_ms }, timeout)
            .await?;
        Ok(value
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from))
    }

    async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool> {
        let timeout = self.action_timeout;
        let value = self
            .request(BridgeCommand::IsVisible { locator }, timeout)
            .await?;
        expect_bool(value)
    }

    async fn current_url(&mut self) -> E2eResult<String> {
        let timeout = self.action_timeout;
        let value = self.request(BridgeCommand::CurrentUrl, timeout).await?;
        value
            .as_str()
            .map(String::from)
            .ok_or_else(|| E2eError::Bridge(format!("expected url string, got {}", value)))
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let timeout = self.action_timeout;
        self.request(BridgeCommand::Screenshot { path }, timeout)
            .await
            .map(|_| ())
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = if self.poisoned {
            Ok(())
        } else {
            let timeout = self.action_timeout;
            self.request(BridgeCommand::Close, timeout).await.map(|_| ())
        };

        match tokio::time::timeout(BRIDGE_GRACE, self.child.wait()).await {
            Ok(status) => {
                status?;
            }
            Err(_) => {
                warn!("Bridge did not exit after close, killing it");
                self.child.kill().await?;
            }
        }
        result
    }
}

/// Launches one Playwright session per scenario
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    /// Create a launcher, failing early when Playwright is not installed
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;
        info!(
            "Using Playwright {} against {}",
            config.browser.as_str(),
            config.base_url
        );
        Ok(Self { config })
    }

    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }
}

#[async_trait]
impl BrowserLauncher for PlaywrightLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserDriver>> {
        let driver = PlaywrightDriver::launch(&self.config).await?;
        Ok(Box::new(driver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(command: BridgeCommand<'_>) -> serde_json::Value {
        serde_json::to_value(Envelope { id: 7, command }).unwrap()
    }

    #[test]
    fn test_command_wire_shape() {
        let locator = Locator::test_id("firstName");
        let json = encode(BridgeCommand::Fill {
            locator: &locator,
            value: "John",
            timeout_ms: 5000,
        });
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "op": "fill",
                "locator": { "kind": "test_id", "key": "firstName" },
                "value": "John",
                "timeout_ms": 5000
            })
        );

        let json = encode(BridgeCommand::CurrentUrl);
        assert_eq!(json, serde_json::json!({ "id": 7, "op": "current_url" }));
    }

    #[test]
    fn test_every_op_is_handled_by_bridge() {
        let locator = Locator::role("button", "Submit");
        let path = PathBuf::from("shot.png");
        let commands = vec![
            BridgeCommand::Launch {
                browser: "chromium",
                headless: true,
                base_url: "http://127.0.0.1:3000",
                width: 1280,
                height: 720,
            },
            BridgeCommand::Goto { url: "/", timeout_ms: 1 },
            BridgeCommand::WaitForUrl { route: "/", timeout_ms: 1 },
            BridgeCommand::WaitFor { locator: &locator, timeout_ms: 1 },
            BridgeCommand::Fill { locator: &locator, value: "", timeout_ms: 1 },
            BridgeCommand::SelectOption { locator: &locator, value: "", timeout_ms: 1 },
            BridgeCommand::Click { locator: &locator, timeout_ms: 1 },
            BridgeCommand::TextContent { locator: &locator, timeout_ms: 1 },
            BridgeCommand::IsVisible { locator: &locator },
            BridgeCommand::CurrentUrl,
            BridgeCommand::Screenshot { path: &path },
            BridgeCommand::Close,
        ];
        for command in commands {
            let json = encode(command);
            let op = json["op"].as_str().unwrap();
            assert!(
                BRIDGE_SCRIPT.contains(&format!("case '{}'", op)),
                "bridge script has no handler for op '{}'",
                op
            );
        }
        for kind in ["test_id", "role", "text"] {
            assert!(BRIDGE_SCRIPT.contains(&format!("case '{}'", kind)));
        }
    }

    #[test]
    fn test_bridge_never_builds_css_from_keys() {
        assert!(BRIDGE_SCRIPT.contains("page.getByTestId(l.key)"));
        assert!(!BRIDGE_SCRIPT.contains("[data-testid="));
    }

    #[test]
    fn test_error_response_parsing() {
        let response: BridgeResponse = serde_json::from_str(
            r#"{"id":3,"ok":false,"error":"Timeout 5000ms exceeded","timeout":true}"#,
        )
        .unwrap();
        assert!(!response.ok);
        assert!(response.timeout);
        assert_eq!(response.value, serde_json::Value::Null);
    }

    #[test]
    fn test_browser_from_str() {
        assert_eq!("webkit".parse::<Browser>().unwrap(), Browser::Webkit);
        assert!("safari".parse::<Browser>().is_err());
    }
}
