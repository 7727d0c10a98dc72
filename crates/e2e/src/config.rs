//! Harness configuration
//!
//! Loaded from `formflow.toml`, then overridden by `FORMFLOW_*` environment
//! variables, then by command-line flags. Every field has a default so an
//! empty file is a valid configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::playwright::{Browser, PlaywrightConfig};
use crate::server::ServerConfig;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "formflow.toml";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the application under test
    pub base_url: String,

    /// Browser engine
    pub browser: Browser,

    pub headless: bool,

    pub viewport: Viewport,

    pub timeouts: Timeouts,

    /// Scenarios executed concurrently, each in its own session
    pub workers: usize,

    /// Directory of scenario tables. Relative paths in a config file are
    /// resolved against the file's directory.
    pub scenarios_dir: PathBuf,

    /// Directory for the JSON report
    pub output_dir: PathBuf,

    /// Directory for failure screenshots
    pub screenshot_dir: PathBuf,

    /// Node.js executable used for the Playwright bridge
    pub node_path: PathBuf,

    /// `node_modules` containing `playwright` (sets NODE_PATH)
    pub node_modules_dir: Option<PathBuf>,

    /// Out-of-band fixture API
    pub hooks: Option<HooksConfig>,

    /// Application server to spawn before running
    pub server: Option<ServerSection>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            browser: Browser::Chromium,
            headless: true,
            viewport: Viewport::default(),
            timeouts: Timeouts::default(),
            workers: 4,
            scenarios_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("test-results"),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            node_path: PathBuf::from("node"),
            node_modules_dir: None,
            hooks: None,
            server: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Bounds for every wait the harness performs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Route changes after `goto` and the login prelude
    pub navigation_ms: u64,

    /// Locating an input or button before interacting with it
    pub action_ms: u64,

    /// Waiting for attribute-based outcome elements
    pub outcome_primary_ms: u64,

    /// Waiting for text/role fallbacks, after the primary wait timed out
    pub outcome_fallback_ms: u64,

    /// Secondary success elements rendered just after the first one
    pub settle_ms: u64,

    pub poll_interval_ms: u64,

    /// Hard ceiling for one whole scenario
    pub scenario_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 10_000,
            action_ms: 5_000,
            outcome_primary_ms: 5_000,
            outcome_fallback_ms: 2_000,
            settle_ms: 1_000,
            poll_interval_ms: 100,
            scenario_ms: 120_000,
        }
    }
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn action(&self) -> Duration {
        Duration::from_millis(self.action_ms)
    }

    pub fn outcome_primary(&self) -> Duration {
        Duration::from_millis(self.outcome_primary_ms)
    }

    pub fn outcome_fallback(&self) -> Duration {
        Duration::from_millis(self.outcome_fallback_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn scenario(&self) -> Duration {
        Duration::from_millis(self.scenario_ms)
    }
}

/// Test-support API used for account/customer fixtures and fault injection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksConfig {
    pub base_url: String,

    /// Sent as a bearer token when set
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_hook_timeout")]
    pub timeout_secs: u64,
}

fn default_hook_timeout() -> u64 {
    10
}

/// `[server]` section; converted into a [`ServerConfig`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    pub binary_path: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Port to listen on (None = find a free port)
    #[serde(default)]
    pub port: Option<u16>,

    /// Environment variable the server reads its port from
    #[serde(default = "default_port_env")]
    pub port_env: String,

    #[serde(default = "default_health_path")]
    pub health_path: String,

    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

fn default_port_env() -> String {
    "PORT".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_startup_timeout() -> u64 {
    30
}

impl ServerSection {
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            binary_path: self.binary_path.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            port: self.port,
            port_env: self.port_env.clone(),
            health_path: self.health_path.clone(),
            startup_timeout: Duration::from_secs(self.startup_timeout_secs),
        }
    }
}

impl HarnessConfig {
    pub fn from_toml(content: &str) -> E2eResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        if config.scenarios_dir.is_relative() {
            if let Some(dir) = path.parent() {
                config.scenarios_dir = dir.join(&config.scenarios_dir);
            }
        }
        Ok(config)
    }

    /// Load `path` if given, else `formflow.toml` when present, else defaults.
    /// Environment overrides are applied in every case.
    pub fn load(path: Option<&Path>) -> E2eResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE))?,
            None => {
                debug!("No {} found, using defaults", CONFIG_FILE);
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `FORMFLOW_*` overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FORMFLOW_BASE_URL") {
            self.base_url = url;
        }
        if let Some(workers) = lookup("FORMFLOW_WORKERS") {
            self.workers = workers.parse().map_err(|_| {
                E2eError::Config(format!("FORMFLOW_WORKERS is not a number: {}", workers))
            })?;
        }
        if let Some(dir) = lookup("FORMFLOW_SCENARIOS") {
            self.scenarios_dir = PathBuf::from(dir);
        }
        if let Some(headless) = lookup("FORMFLOW_HEADLESS") {
            self.headless = matches!(headless.as_str(), "1" | "true" | "yes");
        }
        if let Some(url) = lookup("FORMFLOW_HOOKS_URL") {
            match &mut self.hooks {
                Some(hooks) => hooks.base_url = url,
                None => {
                    self.hooks = Some(HooksConfig {
                        base_url: url,
                        token: lookup("FORMFLOW_HOOKS_TOKEN"),
                        timeout_secs: default_hook_timeout(),
                    })
                }
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.workers == 0 {
            return Err(E2eError::Config("workers must be at least 1".into()));
        }
        if self.base_url.is_empty() {
            return Err(E2eError::Config("base_url must not be empty".into()));
        }
        let t = &self.timeouts;
        if t.navigation_ms == 0 || t.action_ms == 0 || t.outcome_primary_ms == 0 {
            return Err(E2eError::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }

    /// Hooks settings with a path-only `base_url` (e.g. `/__test`) resolved
    /// against the application's base URL
    pub fn hooks_config(&self) -> Option<HooksConfig> {
        let mut hooks = self.hooks.clone()?;
        if hooks.base_url.starts_with('/') {
            hooks.base_url = format!("{}{}", self.base_url.trim_end_matches('/'), hooks.base_url);
        }
        Some(hooks)
    }

    pub fn playwright(&self) -> PlaywrightConfig {
        PlaywrightConfig {
            base_url: self.base_url.clone(),
            browser: self.browser,
            headless: self.headless,
            viewport_width: self.viewport.width,
            viewport_height: self.viewport.height,
            node_path: self.node_path.clone(),
            node_modules_dir: self.node_modules_dir.clone(),
            navigation_timeout: self.timeouts.navigation(),
            action_timeout: self.timeouts.action(),
        }
    }
}
