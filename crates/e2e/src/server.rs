//! Backend management - optionally spawning the backend and waiting for it

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Configuration for the backend under test
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Origin the fixture commands are sent to
    pub origin: String,

    /// Binary to spawn (None = backend is already running)
    pub binary_path: Option<PathBuf>,

    /// Extra arguments for the binary
    pub args: Vec<String>,

    /// How long to wait for the origin to answer
    pub startup_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080/".to_string(),
            binary_path: None,
            args: Vec::new(),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle to the backend; owns the child process if we spawned it
pub struct BackendHandle {
    child: Option<Child>,
    origin: String,
}

impl BackendHandle {
    /// Spawn the backend if a binary is configured, then wait until its
    /// origin answers HTTP
    pub async fn start(config: BackendConfig) -> E2eResult<Self> {
        let child = match &config.binary_path {
            Some(path) => {
                info!("Spawning backend {}", path.display());
                let child = Command::new(path)
                    .args(&config.args)
                    .stdout(Stdio::null())
                    .stderr(Stdio::inherit())
                    .spawn()
                    .map_err(|e| {
                        E2eError::BackendStartup(format!(
                            "Failed to spawn {}: {}",
                            path.display(),
                            e
                        ))
                    })?;
                Some(child)
            }
            None => None,
        };

        let handle = BackendHandle {
            child,
            origin: config.origin.clone(),
        };

        handle.wait_for_reachable(config.startup_timeout).await?;

        info!("Backend is reachable at {}", handle.origin);
        Ok(handle)
    }

    /// Any HTTP response counts: the backend exposes no health route, and
    /// the account endpoints only accept POST.
    async fn wait_for_reachable(&self, timeout_duration: Duration) -> E2eResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&self.origin).send().await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for backend at {}...", self.origin);
                    }
                    // Connection refused is expected while the backend starts
                    if !e.is_connect() {
                        warn!("Backend not reachable yet: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::BackendUnreachable {
            origin: self.origin.clone(),
            attempts,
        })
    }

    /// Stop the backend if we spawned it
    pub fn stop(&mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        info!("Stopping backend (pid: {})", child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        let _ = child.kill();
        let _ = child.wait();

        Ok(())
    }
}

impl Drop for BackendHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
