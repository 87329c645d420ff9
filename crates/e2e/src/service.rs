//! Service lifecycle - waiting for, or spawning, the system under test

use std::collections::BTreeMap;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{HarnessError, HarnessResult};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How to start a service under test
#[derive(Debug, Clone)]
pub struct ServiceCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// URL polled until it answers
    pub url: String,
    pub startup_timeout: Duration,
}

impl ServiceCommand {
    /// Split a shell-like command line on whitespace
    pub fn parse(
        command_line: &str,
        url: impl Into<String>,
        startup_timeout: Duration,
    ) -> HarnessResult<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| HarnessError::Setup("empty service command".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
            env: BTreeMap::new(),
            url: url.into(),
            startup_timeout,
        })
    }
}

/// Handle to a service process started by the harness
pub struct ServiceHandle {
    child: Child,
    url: String,
}

impl ServiceHandle {
    /// Spawn the service and wait until it answers
    pub async fn spawn(command: ServiceCommand) -> HarnessResult<Self> {
        info!("Starting {} for {}", command.program, command.url);

        let child = Command::new(&command.program)
            .args(&command.args)
            .envs(&command.env)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                HarnessError::Setup(format!("Failed to spawn {}: {}", command.program, e))
            })?;

        let handle = ServiceHandle {
            child,
            url: command.url.clone(),
        };

        Self::wait_until_reachable(&command.url, command.startup_timeout).await?;
        Ok(handle)
    }

    /// Poll `url` until any HTTP response arrives.
    ///
    /// Error statuses count as reachable: the service is up even if the
    /// root path is not a valid endpoint.
    pub async fn wait_until_reachable(url: &str, timeout: Duration) -> HarnessResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match client.get(url).send().await {
                Ok(resp) => {
                    info!("{} is reachable ({})", url, resp.status());
                    return Ok(());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for {}...", url);
                    }
                    if !e.is_connect() && !e.is_timeout() {
                        warn!("Reachability check error: {}", e);
                    }
                }
            }

            if start.elapsed() >= timeout {
                return Err(HarnessError::ServiceUnreachable(attempts));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Stop the service: SIGTERM first, then kill
    pub fn stop(&mut self) -> HarnessResult<()> {
        if let Ok(Some(_)) = self.child.try_wait() {
            return Ok(());
        }
        info!("Stopping service at {} (pid: {})", self.url, self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        let _ = self.child.kill();
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_service_reports_attempts() {
        // Bind then drop to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let url = format!("http://127.0.0.1:{}", port);

        let err = ServiceHandle::wait_until_reachable(&url, Duration::from_millis(250))
            .await
            .unwrap_err();
        match err {
            HarnessError::ServiceUnreachable(attempts) => assert!(attempts >= 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_command_line() {
        let cmd = ServiceCommand::parse(
            "node server.js --port 3030",
            "http://localhost:3030",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(cmd.program, "node");
        assert_eq!(cmd.args, vec!["server.js", "--port", "3030"]);
        assert!(ServiceCommand::parse("   ", "x", Duration::from_secs(1)).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_failure_stops_process() {
        let cmd = ServiceCommand {
            program: "sleep".into(),
            args: vec!["30".into()],
            env: BTreeMap::new(),
            url: "http://127.0.0.1:9".into(),
            startup_timeout: Duration::from_millis(200),
        };
        assert!(ServiceHandle::spawn(cmd).await.is_err());
    }
}
