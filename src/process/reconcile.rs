use crate::error::{Result, SupervisorError};
use crate::process::handle::{MANAGED_MARKER, ProcessHandle, open_pid};
use crate::process::pid_file::PidFile;
use std::path::Path;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// How often a terminating leftover process is checked for exit
pub const EXIT_CHECK_INTERVAL: Duration = Duration::from_millis(200);

/// Terminate the process recorded in `pid_file` if it is a leftover of a
/// previous supervisor instance for the same binary.
///
/// The PID file itself is left in place; it is overwritten once a new
/// generation starts.
pub async fn maybe_kill_pid_file(
    pid_file: &PidFile,
    bin_path: &Path,
    stop_timeout: Duration,
) -> Result<()> {
    let Some(pid) = pid_file.read().await? else {
        return Ok(());
    };

    let handle = match open_pid(pid) {
        Ok(handle) => handle,
        Err(SupervisorError::NoSuchProcess(_)) => {
            debug!(
                "Process {} from PID file {} is already gone",
                pid,
                pid_file.path().display()
            );
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    kill_process(handle.as_ref(), bin_path, stop_timeout).await
}

/// Terminate `handle` gracefully if it belongs to us, killing it if it is
/// still around after `stop_timeout`.
///
/// Platform limitations are only tolerated while deciding eligibility. Once
/// the process is known to be ours, failing to signal it is a hard error.
pub async fn kill_process(
    handle: &dyn ProcessHandle,
    bin_path: &Path,
    stop_timeout: Duration,
) -> Result<()> {
    if !should_kill_process(handle, bin_path)? {
        return Ok(());
    }

    info!(
        "Terminating leftover process {} of {}",
        handle.pid(),
        bin_path.display()
    );

    match handle.request_graceful_shutdown() {
        Ok(()) => {}
        Err(SupervisorError::NoSuchProcess(_)) => return Ok(()),
        Err(e) => {
            return Err(SupervisorError::ProcessError(format!(
                "failed to request graceful termination of PID {}: {e}",
                handle.pid()
            )));
        }
    }

    if !wait_for_termination(handle, bin_path, stop_timeout).await {
        return Ok(());
    }

    info!(
        "Leftover process {} did not exit within {:?}, killing it",
        handle.pid(),
        stop_timeout
    );
    match handle.kill() {
        Ok(()) | Err(SupervisorError::NoSuchProcess(_)) => Ok(()),
        Err(e) => Err(SupervisorError::ProcessError(format!(
            "failed to kill PID {}: {e}",
            handle.pid()
        ))),
    }
}

/// Poll until the process is gone or no longer ours. Returns true when the
/// deadline passed and the process still needs to be killed.
async fn wait_for_termination(
    handle: &dyn ProcessHandle,
    bin_path: &Path,
    stop_timeout: Duration,
) -> bool {
    let deadline = tokio::time::sleep(stop_timeout);
    tokio::pin!(deadline);
    let mut check = tokio::time::interval_at(Instant::now() + EXIT_CHECK_INTERVAL, EXIT_CHECK_INTERVAL);
    check.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut deadline => return true,
            _ = check.tick() => {
                if !matches!(should_kill_process(handle, bin_path), Ok(true)) {
                    return false;
                }
            }
        }
    }
}

/// A process is ours only if it runs `bin_path` and carries the managed
/// marker in its environment. A vanished process is never ours.
fn should_kill_process(handle: &dyn ProcessHandle, bin_path: &Path) -> Result<bool> {
    let cmdline = match handle.cmdline() {
        Ok(cmdline) => cmdline,
        Err(SupervisorError::NoSuchProcess(_)) => return Ok(false),
        Err(e) => return Err(e),
    };
    if let Some(arg0) = cmdline.first() {
        if Path::new(arg0) != bin_path {
            return Ok(false);
        }
    }

    let environ = match handle.environ() {
        Ok(environ) => environ,
        Err(SupervisorError::NoSuchProcess(_)) => return Ok(false),
        Err(e) => return Err(e),
    };

    Ok(environ.iter().any(|entry| entry == MANAGED_MARKER))
}
