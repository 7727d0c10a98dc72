//! Application-under-test lifecycle: spawning and health checking

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

const SIGTERM_GRACE: Duration = Duration::from_millis(500);

/// Handle to a running application process
pub struct ServerHandle {
    child: Child,
    pub base_url: String,
    pub port: u16,
    stopped: bool,
}

impl ServerHandle {
    /// Spawn the application and wait until its health endpoint answers
    pub async fn spawn(config: ServerConfig) -> E2eResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("Spawning {} on port {}", config.binary_path.display(), port);

        let mut cmd = Command::new(&config.binary_path);
        cmd.args(&config.args)
            .envs(&config.env)
            .env(&config.port_env, port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!(
                "Failed to spawn {}: {}",
                config.binary_path.display(),
                e
            ))
        })?;

        let handle = ServerHandle {
            child,
            base_url: base_url.clone(),
            port,
            stopped: false,
        };

        handle
            .wait_for_healthy(&config.health_path, config.startup_timeout)
            .await?;

        info!("Application is healthy at {}", base_url);
        Ok(handle)
    }

    /// Poll the health endpoint until it returns 2xx or the timeout passes
    async fn wait_for_healthy(&self, health_path: &str, timeout_duration: Duration) -> E2eResult<()> {
        let health_url = format!("{}{}", self.base_url, health_path);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for application to start...");
                    }
                    // Connection refused is expected while the process boots
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Stop the application: SIGTERM, short grace period, then kill.
    /// Later calls are no-ops.
    pub async fn stop(&mut self) -> E2eResult<()> {
        if self.stopped {
            return Ok(());
        }
        info!("Stopping application (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                sleep(SIGTERM_GRACE).await;
            }
        }

        self.kill()
    }

    fn kill(&mut self) -> E2eResult<()> {
        if let Err(e) = self.child.kill() {
            // Already exited after SIGTERM
            if e.kind() != std::io::ErrorKind::InvalidInput {
                warn!("Failed to kill application: {}", e);
            }
        }
        self.child.wait()?;
        self.stopped = true;
        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        // Drop cannot await the SIGTERM grace period
        if !self.stopped {
            if let Err(e) = self.kill() {
                warn!("Application shutdown failed: {}", e);
            }
        }
    }
}

/// Configuration for spawning the application under test
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub binary_path: PathBuf,

    pub args: Vec<String>,

    /// Extra environment for the process
    pub env: HashMap<String, String>,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    /// Name of the variable carrying the port
    pub port_env: String,

    pub health_path: String,

    pub startup_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("target/debug/app"),
            args: Vec::new(),
            env: HashMap::new(),
            port: None,
            port_env: "PORT".to_string(),
            health_path: "/health".to_string(),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

/// Ask the OS for an unused port
fn find_free_port() -> E2eResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
