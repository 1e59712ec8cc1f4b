// src/system/process.rs

use crate::{models::Action, system::executor::ExecutionError};
use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};

/// Failure to stop one child during teardown. Reported, never escalated.
#[derive(Error, Debug)]
pub enum TeardownError {
    #[error("process id {0} does not fit the platform's pid type")]
    InvalidPid(u32),
    #[error("could not send the termination signal to PID {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("could not wait for the process to exit: {0}")]
    Wait(#[source] std::io::Error),
    #[error("could not kill the process: {0}")]
    Kill(#[source] std::io::Error),
}

/// A tokenized command: the program plus its arguments, extra args already appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Executable to launch.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
}

impl CommandLine {
    /// Splits `action.command` into shell words and appends `extra_args`.
    ///
    /// # Errors
    /// `CommandParse` for unbalanced quoting, `EmptyCommand` when no word remains.
    pub fn for_action(action: &Action, extra_args: &[String]) -> Result<Self, ExecutionError> {
        let words = shlex::split(&action.command).ok_or_else(|| ExecutionError::CommandParse {
            action: action.qualified_name(),
            command: action.command.clone(),
        })?;
        let mut words = words.into_iter();
        let program = words
            .next()
            .ok_or_else(|| ExecutionError::EmptyCommand(action.qualified_name()))?;
        let mut args: Vec<String> = words.collect();
        args.extend(extra_args.iter().cloned());
        Ok(Self { program, args })
    }

    fn to_command(&self, action: &Action) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(dunce::simplified(&action.working_directory));
        command
    }
}

/// A spawned child owned by the orchestrator for the duration of one run.
#[derive(Debug)]
pub(crate) struct LiveProcess {
    pub(crate) action: Arc<Action>,
    pub(crate) child: Child,
}

/// Spawns `line` with stdout and stderr piped separately.
pub(crate) fn spawn_captured(action: &Action, line: &CommandLine) -> Result<Child, ExecutionError> {
    log::debug!(
        "Spawning {} (captured): {} {:?} in '{}'",
        action,
        line.program,
        line.args,
        action.working_directory.display()
    );
    line.to_command(action)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| spawn_error(action, line, source))
}

/// Spawns `line` attached to the terminal.
pub(crate) fn spawn_inherited(action: &Action, line: &CommandLine) -> Result<Child, ExecutionError> {
    log::debug!(
        "Spawning {} (inherited): {} {:?} in '{}'",
        action,
        line.program,
        line.args,
        action.working_directory.display()
    );
    line.to_command(action)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| spawn_error(action, line, source))
}

fn spawn_error(action: &Action, line: &CommandLine, source: std::io::Error) -> ExecutionError {
    if source.kind() == ErrorKind::NotFound {
        ExecutionError::ExecutableNotFound {
            action: action.qualified_name(),
            program: line.program.clone(),
            source,
        }
    } else {
        ExecutionError::SpawnFailed {
            action: action.qualified_name(),
            source,
        }
    }
}

/// Converts an exit status to the code that is reported to the user.
///
/// Processes killed by a signal have no exit code; on Unix they are reported as
/// `128 + signal`, as shells do. Anything else without a code becomes `-1`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Stops one child: cooperative termination, a bounded wait, then a forced kill.
///
/// Returns the PID the child had, or `None` if it had already been reaped.
pub(crate) async fn terminate(child: &mut Child, grace: Duration) -> Result<Option<u32>, TeardownError> {
    let Some(pid) = child.id() else {
        return Ok(None);
    };

    request_termination(child, pid)?;

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            log::debug!("PID {} exited after termination request ({})", pid, status);
        }
        Ok(Err(e)) => return Err(TeardownError::Wait(e)),
        Err(_) => {
            log::debug!("PID {} still alive after {:?}; killing.", pid, grace);
            child.kill().await.map_err(TeardownError::Kill)?;
        }
    }
    Ok(Some(pid))
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn request_termination(_child: &mut Child, pid: u32) -> Result<(), TeardownError> {
    let raw = libc::pid_t::try_from(pid).map_err(|_| TeardownError::InvalidPid(pid))?;
    // SAFETY: kill(2) takes plain integers and touches no memory of ours. The pid
    // belongs to a child that has not been reaped yet, so it cannot have been reused.
    let rc = unsafe { libc::kill(raw, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(TeardownError::Signal {
            pid,
            source: std::io::Error::last_os_error(),
        })
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child, pid: u32) -> Result<(), TeardownError> {
    // No cooperative signal to send here; the forced kill is the termination request.
    child.start_kill().map_err(|source| TeardownError::Signal { pid, source })
}
