//! Subprocess execution with a hard wall-clock limit.
//!
//! On Unix the child runs in its own process group so a timeout can take
//! down anything it spawned, not just the direct child.

use std::ffi::OsString;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::Instant;

#[derive(Debug)]
pub struct RunOutput {
    pub status: ExitStatus,
    pub stderr: String,
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("cannot start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("killed after {0:?}")]
    TimedOut(Duration),

    #[error("wait failed: {0}")]
    Wait(#[from] io::Error),
}

/// Run `program` to completion, killing it (and its process group) once
/// `limit` elapses. Stderr is captured; stdout is discarded. The limit
/// covers draining stderr too, so a grandchild holding the pipe open
/// cannot stall the caller.
pub async fn run(program: &str, args: &[OsString], limit: Duration) -> Result<RunOutput, RunError> {
    let deadline = Instant::now() + limit;
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|source| RunError::Spawn {
        program: program.to_string(),
        source,
    })?;
    // `Child::id` is gone once the child is reaped; the group outlives it.
    let pid = child.id();

    // Drain stderr concurrently so a chatty child never blocks on a full pipe.
    let mut stderr_task = child.stderr.take().map(|mut pipe| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).into_owned()
        })
    });

    let status = match tokio::time::timeout_at(deadline, child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            tracing::warn!("{} exceeded {:?}, killing", program, limit);
            kill_group(pid);
            if let Err(e) = child.kill().await {
                tracing::debug!("kill after timeout: {}", e);
            }
            if let Some(task) = stderr_task {
                task.abort();
            }
            return Err(RunError::TimedOut(limit));
        }
    };

    let stderr = match stderr_task.as_mut() {
        Some(task) => match tokio::time::timeout_at(deadline, &mut *task).await {
            Ok(drained) => drained.unwrap_or_default(),
            Err(_) => {
                tracing::warn!("{} exited but its stderr stayed open past {:?}", program, limit);
                kill_group(pid);
                task.abort();
                return Err(RunError::TimedOut(limit));
            }
        },
        None => String::new(),
    };
    Ok(RunOutput { status, stderr })
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // SAFETY: plain syscall. The child was spawned with process_group(0),
        // so its pid is the group id, and a pid is not reused while its
        // process group still has members.
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}
