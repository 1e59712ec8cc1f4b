// src/system/executor.rs

use crate::{
    CancellationToken,
    constants::{POLL_INTERVAL, READER_DRAIN_TIMEOUT, TERMINATION_GRACE_PERIOD},
    models::{Action, Invocation, RunMode, RunResult, RunSummary},
    system::{
        console::SharedSink,
        interrupt::is_cancelled,
        process::{self, CommandLine, LiveProcess},
    },
};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("The command of action '{action}' could not be parsed: {command}")]
    CommandParse { action: String, command: String },
    #[error("No command specified for action '{0}'.")]
    EmptyCommand(String),
    #[error("Executable '{program}' for action '{action}' was not found: {source}")]
    ExecutableNotFound {
        action: String,
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Action '{action}' could not be started: {source}")]
    SpawnFailed {
        action: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not get the status of action '{action}': {source}")]
    Wait {
        action: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Operation was cancelled by the user.")]
    Interrupted,
}

/// Timing knobs of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Sleep between two completion checks.
    pub poll_interval: Duration,
    /// Time a child gets to exit after SIGTERM before it is killed.
    pub grace_period: Duration,
    /// Shared deadline for stream readers to flush once their processes are gone.
    pub drain_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            grace_period: TERMINATION_GRACE_PERIOD,
            drain_timeout: READER_DRAIN_TIMEOUT,
        }
    }
}

/// Runs the actions of an [`Invocation`] and supervises their processes.
///
/// All status lines and captured child output go to the [`SharedSink`]. Every
/// process spawned by a `run` call is either reaped or torn down before it returns.
pub struct Orchestrator {
    sink: SharedSink,
    settings: OrchestratorSettings,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(sink: SharedSink) -> Self {
        Self {
            sink,
            settings: OrchestratorSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Runs every action of `invocation`, concurrently if all of them are
    /// backgroundable and one after another otherwise.
    ///
    /// The children's own exit codes are reported in the summary, they never turn
    /// into errors.
    ///
    /// # Errors
    /// Spawn and wait failures abort the run after the already started processes
    /// have been torn down. `Interrupted` once `token` is cancelled.
    pub async fn run(
        &self,
        invocation: &Invocation,
        token: &CancellationToken,
    ) -> Result<RunSummary, ExecutionError> {
        let mode = invocation.run_mode();
        log::debug!(
            "Running '{}' ({} action(s), {} mode)",
            invocation.action_name,
            invocation.actions.len(),
            mode
        );

        // A single module-qualified action gets no group banner.
        let is_group = invocation.actions.len() > 1;
        let results = match mode {
            RunMode::Concurrent => {
                if is_group {
                    self.sink
                        .info("Running all actions within the action group simultaneously.");
                }
                self.run_concurrent(invocation, token).await?
            }
            RunMode::Sequential => {
                if is_group {
                    self.sink.info(
                        "One or more actions within the action group cannot run simultaneously. Running them in series.",
                    );
                }
                self.run_sequential(invocation, token).await?
            }
        };

        self.sink.info("All actions completed.");
        Ok(RunSummary { mode, results })
    }

    // --- Concurrent mode ---

    async fn run_concurrent(
        &self,
        invocation: &Invocation,
        token: &CancellationToken,
    ) -> Result<Vec<RunResult>, ExecutionError> {
        let mut live: Vec<LiveProcess> = Vec::with_capacity(invocation.actions.len());
        let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(invocation.actions.len() * 2);

        for action in &invocation.actions {
            let spawned = CommandLine::for_action(action, invocation.args_for(action))
                .and_then(|line| {
                    self.sink.info(&format!("Running action {action}"));
                    process::spawn_captured(action, &line)
                });

            let mut child = match spawned {
                Ok(child) => child,
                Err(e) => {
                    log::debug!("Aborting the run: {}", e);
                    self.teardown(&mut live).await;
                    self.drain(readers).await;
                    return Err(e);
                }
            };

            let name = action.qualified_name();
            if let Some(stdout) = child.stdout.take() {
                readers.push(tokio::spawn(forward_lines(
                    stdout,
                    format!("[{name}]"),
                    Arc::clone(&self.sink),
                )));
            }
            if let Some(stderr) = child.stderr.take() {
                readers.push(tokio::spawn(forward_lines(
                    stderr,
                    format!("[{name} {}]", "ERR".red()),
                    Arc::clone(&self.sink),
                )));
            }
            live.push(LiveProcess {
                action: Arc::clone(action),
                child,
            });
        }

        let mut results = Vec::with_capacity(live.len());
        while !live.is_empty() {
            if is_cancelled(token) {
                self.sink.info("Received interrupt, killing all child processes...");
                self.teardown(&mut live).await;
                self.drain(readers).await;
                return Err(ExecutionError::Interrupted);
            }

            let mut index = 0;
            while let Some(entry) = live.get_mut(index) {
                match entry.child.try_wait() {
                    Ok(Some(status)) => {
                        let finished = live.remove(index);
                        results.push(self.report_completion(finished.action, process::exit_code(status)));
                    }
                    Ok(None) => index += 1,
                    Err(source) => {
                        let failed = live.remove(index);
                        self.teardown(&mut live).await;
                        self.drain(readers).await;
                        return Err(ExecutionError::Wait {
                            action: failed.action.qualified_name(),
                            source,
                        });
                    }
                }
            }

            if !live.is_empty() {
                tokio::time::sleep(self.settings.poll_interval).await;
            }
        }

        self.drain(readers).await;
        Ok(results)
    }

    // --- Sequential mode ---

    async fn run_sequential(
        &self,
        invocation: &Invocation,
        token: &CancellationToken,
    ) -> Result<Vec<RunResult>, ExecutionError> {
        let mut results = Vec::with_capacity(invocation.actions.len());

        for action in &invocation.actions {
            if is_cancelled(token) {
                self.sink.info("Received interrupt, killing all child processes...");
                return Err(ExecutionError::Interrupted);
            }

            let line = CommandLine::for_action(action, invocation.args_for(action))?;
            self.sink.info(&format!("Running action {action}"));
            let mut running = LiveProcess {
                action: Arc::clone(action),
                child: process::spawn_inherited(action, &line)?,
            };

            let code = loop {
                if is_cancelled(token) {
                    self.sink.info("Received interrupt, killing all child processes...");
                    self.teardown(&mut vec![running]).await;
                    return Err(ExecutionError::Interrupted);
                }
                match running.child.try_wait() {
                    Ok(Some(status)) => break process::exit_code(status),
                    Ok(None) => tokio::time::sleep(self.settings.poll_interval).await,
                    Err(source) => {
                        self.teardown(&mut vec![running]).await;
                        return Err(ExecutionError::Wait {
                            action: action.qualified_name(),
                            source,
                        });
                    }
                }
            };

            results.push(self.report_completion(Arc::clone(action), code));
        }

        Ok(results)
    }

    // --- Shared helpers ---

    fn report_completion(&self, action: Arc<Action>, exit_code: i32) -> RunResult {
        self.sink.info(&format!(
            "Action {action} completed with exit code {exit_code}"
        ));
        RunResult { action, exit_code }
    }

    /// Terminates every live process in parallel and empties `live`.
    ///
    /// A failure for one process is reported and does not stop the others.
    async fn teardown(&self, live: &mut Vec<LiveProcess>) {
        if live.is_empty() {
            return;
        }
        let grace = self.settings.grace_period;
        let pending: Vec<_> = live
            .drain(..)
            .map(|mut entry| {
                tokio::spawn(async move {
                    let outcome = process::terminate(&mut entry.child, grace).await;
                    (entry.action, outcome)
                })
            })
            .collect();

        for handle in pending {
            match handle.await {
                Ok((action, Ok(Some(pid)))) => {
                    self.sink
                        .info(&format!("Killed process for {action} (PID: {pid})"));
                }
                Ok((action, Ok(None))) => {
                    log::debug!("Process for {} had already exited.", action);
                }
                Ok((action, Err(e))) => {
                    log::warn!("Teardown of {} failed: {}", action, e);
                    self.sink
                        .error(&format!("Error killing process for {action}: {e}"));
                }
                Err(e) => log::warn!("Teardown task failed: {}", e),
            }
        }
        self.sink.info("All child processes have been terminated.");
    }

    /// Waits for the stream readers, aborting those still open at the shared deadline.
    ///
    /// A reader can outlive its process when a grandchild inherited the pipe.
    async fn drain(&self, readers: Vec<JoinHandle<()>>) {
        let deadline = tokio::time::Instant::now() + self.settings.drain_timeout;
        for mut handle in readers {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("Output reader failed: {}", e),
                Err(_) => {
                    log::debug!("Output reader still open after the drain timeout; aborting it.");
                    handle.abort();
                }
            }
        }
    }
}

/// Copies one child stream to the sink line by line, each line behind `prefix`.
///
/// Invalid UTF-8 is replaced rather than dropped. Ends at EOF or on the first
/// read error, which is reported with the same prefix.
async fn forward_lines<R>(stream: R, prefix: String, sink: SharedSink)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buffer);
                let line = text.trim_end_matches(['\n', '\r']);
                sink.emit(&format!("{prefix} {line}"));
            }
            Err(e) => {
                log::warn!("{} Error reading output: {}", prefix, e);
                sink.error(&format!("{prefix} Error reading output: {e}"));
                break;
            }
        }
    }
}
