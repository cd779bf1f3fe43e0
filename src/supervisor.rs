//! Supervision loop for the declared process.
//!
//! Spawns the child, captures its output, and applies the restart policy on
//! exit. Exactly one child is supervised per session: the loop ends when the
//! child is left stopped or failed, or when shutdown is signalled.

use chrono::{DateTime, Utc};
use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::{error, info, warn};

use crate::config::ProcessSpec;
use crate::errors::{ProcessError, ProcessResult};
use crate::lifecycle::{ProcessLifecycle, RestartDecision, RestartPolicy, RestartStats};
use crate::logging::{LogSource, OutputWriter};
use crate::process;
use crate::state::{ProcessState, ProcessStateMachine};

/// Snapshot of the supervised process for status reporting
#[derive(Debug, Clone)]
pub struct ProcessStatus {
    pub name: String,
    pub state: ProcessState,
    pub pid: Option<u32>,
    pub start_time: Option<DateTime<Utc>>,
    pub uptime: Option<Duration>,
    pub restart_stats: RestartStats,
}

/// Supervises one child process according to its declaration
pub struct Supervisor {
    spec: ProcessSpec,
    state_machine: ProcessStateMachine,
    lifecycle: ProcessLifecycle,
    pid: Option<u32>,
    start_time: Option<DateTime<Utc>>,
}

/// Output capture attached to one child launch
struct Capture {
    writer: OutputWriter,
    readers: Vec<JoinHandle<()>>,
}

enum ExitReason {
    Exited(std::process::ExitStatus),
    Shutdown,
}

impl Supervisor {
    pub fn new(spec: ProcessSpec) -> Self {
        let state_machine = ProcessStateMachine::new(spec.name.clone());
        let lifecycle = ProcessLifecycle::new(spec.name.clone(), RestartPolicy::from_spec(&spec));

        Self {
            spec,
            state_machine,
            lifecycle,
            pid: None,
            start_time: None,
        }
    }

    /// Current state of the supervised process
    pub fn state(&self) -> ProcessState {
        self.state_machine.current_state()
    }

    /// Status snapshot
    pub fn status(&self) -> ProcessStatus {
        let uptime = match (self.state(), self.start_time) {
            (ProcessState::Running, Some(start)) => {
                let secs = Utc::now().signed_duration_since(start).num_seconds().max(0);
                Some(Duration::from_secs(secs as u64))
            }
            _ => None,
        };

        ProcessStatus {
            name: self.spec.name.clone(),
            state: self.state(),
            pid: self.pid,
            start_time: self.start_time,
            uptime,
            restart_stats: self.lifecycle.stats(),
        }
    }

    /// Run the supervision session.
    ///
    /// Returns once the child is left stopped (autorestart disabled or
    /// shutdown signalled) or failed (launch error, or the consecutive
    /// restart cap is exhausted).
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> ProcessResult<()> {
        loop {
            self.state_machine.transition_to_starting()?;

            let mut child = match self.launch() {
                Ok(child) => child,
                Err(e) => {
                    error!("Failed to launch process {}: {}", self.spec.name, e);
                    let _ = self.state_machine.transition_to_failed();
                    return Err(e);
                }
            };

            self.pid = child.id();
            self.start_time = Some(Utc::now());
            self.state_machine.transition_to_running()?;
            info!(
                "Process started: {} (PID: {})",
                self.spec.name,
                self.pid.unwrap_or(0)
            );

            let capture = if self.spec.captures_output() {
                Some(self.attach_capture(&mut child).await?)
            } else {
                None
            };

            let launched = Instant::now();
            let reason = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => ExitReason::Exited(status),
                    Err(e) => {
                        let _ = self.state_machine.transition_to_failed();
                        return Err(ProcessError::stop_failed(
                            &self.spec.name,
                            format!("failed to wait on child: {}", e),
                        ));
                    }
                },
                _ = shutdown.changed() => ExitReason::Shutdown,
            };

            match reason {
                ExitReason::Shutdown => {
                    info!("Shutdown requested, stopping process: {}", self.spec.name);
                    self.stop_child(&mut child).await?;
                    if let Some(capture) = capture {
                        finish_capture(capture).await;
                    }
                    self.pid = None;
                    self.state_machine.transition_to_stopped()?;
                    return Ok(());
                }
                ExitReason::Exited(status) => {
                    let uptime = launched.elapsed();
                    if let Some(capture) = capture {
                        finish_capture(capture).await;
                    }
                    self.pid = None;
                    warn!(
                        "Process {} exited with {} after {:?}",
                        self.spec.name, status, uptime
                    );

                    self.lifecycle.record_exit(uptime);
                    match self.lifecycle.evaluate() {
                        RestartDecision::Stay => {
                            self.state_machine.transition_to_stopped()?;
                            info!("Process {} stopped, autorestart is disabled", self.spec.name);
                            return Ok(());
                        }
                        RestartDecision::GiveUp => {
                            let stats = self.lifecycle.stats();
                            self.state_machine.transition_to_failed()?;
                            error!(
                                "Process {} left stopped after {} consecutive restarts",
                                self.spec.name, stats.consecutive_restarts
                            );
                            return Err(ProcessError::RestartLimitExceeded {
                                name: self.spec.name.clone(),
                                attempts: stats.consecutive_restarts,
                                max: self.lifecycle.max_restarts(),
                            });
                        }
                        RestartDecision::Restart => {
                            self.state_machine.transition_to_restarting()?;
                            // The fixed delay stays responsive to shutdown
                            tokio::select! {
                                _ = sleep(self.lifecycle.restart_delay()) => {}
                                _ = shutdown.changed() => {
                                    info!(
                                        "Shutdown requested during restart delay: {}",
                                        self.spec.name
                                    );
                                    self.state_machine.transition_to_stopped()?;
                                    return Ok(());
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Verify the script invariant and spawn the child
    fn launch(&self) -> ProcessResult<Child> {
        process::resolve_script(&self.spec)?;

        let mut cmd = process::build_command(&self.spec, self.spec.captures_output());
        cmd.spawn()
            .map_err(|e| ProcessError::spawn_failed(&self.spec.name, e.to_string()))
    }

    /// Wire the child's pipes into the log writer
    async fn attach_capture(&self, child: &mut Child) -> ProcessResult<Capture> {
        let writer = OutputWriter::open(&self.spec).await?;
        let mut readers = Vec::new();

        if let Some(stdout) = child.stdout.take() {
            readers.push(writer.spawn_reader(LogSource::Stdout, stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(writer.spawn_reader(LogSource::Stderr, stderr));
        }

        Ok(Capture { writer, readers })
    }

    /// Stop the child: SIGTERM, then SIGKILL after the kill timeout
    async fn stop_child(&mut self, child: &mut Child) -> ProcessResult<()> {
        let Some(pid) = child.id() else {
            // Child already reaped
            return Ok(());
        };

        process::terminate_gracefully(&self.spec.name, pid)?;

        match timeout(self.spec.kill_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                info!(
                    "Process {} exited with {} after SIGTERM",
                    self.spec.name, status
                );
                Ok(())
            }
            Ok(Err(e)) => Err(ProcessError::stop_failed(&self.spec.name, e.to_string())),
            Err(_) => {
                warn!(
                    "Graceful shutdown timed out for {}, force killing",
                    self.spec.name
                );
                child
                    .kill()
                    .await
                    .map_err(|e| ProcessError::stop_failed(&self.spec.name, e.to_string()))
            }
        }
    }
}

/// Wait for the pipes to drain, then for the writer to flush
async fn finish_capture(capture: Capture) {
    for reader in capture.readers {
        let _ = reader.await;
    }
    capture.writer.finish().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn create_test_spec() -> ProcessSpec {
        ProcessSpec {
            name: "test-process".to_string(),
            script: PathBuf::from("run.py"),
            interpreter: Some("python".to_string()),
            args: vec![],
            cwd: None,
            autorestart: true,
            watch: false,
            max_restarts: 5,
            restart_delay: Duration::ZERO,
            min_uptime: Duration::from_secs(1),
            kill_timeout: Duration::from_secs(1),
            env: HashMap::new(),
            out_file: None,
            error_file: None,
            merge_logs: false,
        }
    }

    #[test]
    fn test_initial_status() {
        let supervisor = Supervisor::new(create_test_spec());
        let status = supervisor.status();

        assert_eq!(status.name, "test-process");
        assert_eq!(status.state, ProcessState::Stopped);
        assert!(status.pid.is_none());
        assert!(status.uptime.is_none());
        assert_eq!(status.restart_stats.total_restarts, 0);
    }

    #[tokio::test]
    async fn test_missing_script_fails_launch() {
        let (_tx, rx) = watch::channel(false);
        let mut supervisor = Supervisor::new(create_test_spec());

        let err = supervisor.run(rx).await.unwrap_err();
        assert!(matches!(err, ProcessError::ScriptNotFound { .. }));
        assert_eq!(supervisor.state(), ProcessState::Failed);
    }
}
