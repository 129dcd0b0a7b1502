use crate::error::{Result, SupervisorError};
use tokio::process::Command;

/// Environment entry marking a process as owned by this supervisor.
pub const MANAGED_MARKER: &str = "_K0S_MANAGED=yes";

/// Handle to a running OS process looked up by PID
///
/// Implementations are platform specific. Every operation reports a vanished
/// process as [`SupervisorError::NoSuchProcess`] so callers can treat it as
/// the desired end state.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessHandle: Send + Sync {
    /// Numeric process identifier
    fn pid(&self) -> u32;

    /// Whether the process still exists and is not a zombie
    fn is_alive(&self) -> Result<bool>;

    /// Command line of the process, argv[0] first
    fn cmdline(&self) -> Result<Vec<String>>;

    /// Environment of the process as `KEY=VALUE` entries
    fn environ(&self) -> Result<Vec<String>>;

    /// Ask the process to terminate (SIGTERM / CTRL_BREAK)
    fn request_graceful_shutdown(&self) -> Result<()>;

    /// Forcefully kill the process (SIGKILL / TerminateProcess)
    fn kill(&self) -> Result<()>;
}

/// Open a handle for `pid`.
///
/// Fails with [`SupervisorError::Unsupported`] on platforms that cannot
/// introspect foreign processes.
pub fn open_pid(pid: u32) -> Result<Box<dyn ProcessHandle>> {
    if pid == 0 {
        return Err(SupervisorError::ProcessError(
            "PID 0 does not identify a single process".to_string(),
        ));
    }
    platform::open_pid(pid)
}

/// Ask the process `pid` to shut down gracefully.
pub fn request_graceful_shutdown(pid: u32) -> Result<()> {
    open_pid(pid)?.request_graceful_shutdown()
}

/// Detach a command from the supervisor's process group and apply the
/// configured credentials, so signals aimed at the supervisor (terminal
/// interrupts, console break events) do not reach the child directly.
pub fn detach_command(command: &mut Command, uid: Option<u32>, gid: Option<u32>) {
    platform::detach_command(command, uid, gid)
}

#[cfg(unix)]
use super::handle_unix as platform;

#[cfg(windows)]
use super::handle_windows as platform;

#[cfg(not(any(unix, windows)))]
mod platform {
    use super::*;

    pub fn open_pid(pid: u32) -> Result<Box<dyn ProcessHandle>> {
        Err(SupervisorError::Unsupported(format!(
            "cannot open PID {pid}: process introspection is not available"
        )))
    }

    pub fn detach_command(_command: &mut Command, _uid: Option<u32>, _gid: Option<u32>) {}
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::{Command as StdCommand, Stdio};

    #[test]
    fn test_open_pid_zero_is_rejected() {
        let err = open_pid(0).err().unwrap();
        assert!(matches!(err, SupervisorError::ProcessError(_)));
    }

    #[test]
    fn test_handle_reports_cmdline_and_environ() {
        let mut child = StdCommand::new("/bin/sleep")
            .arg("30")
            .env("_K0S_MANAGED", "yes")
            .stdout(Stdio::null())
            .spawn()
            .unwrap();

        let handle = open_pid(child.id()).unwrap();
        assert_eq!(handle.pid(), child.id());
        assert!(handle.is_alive().unwrap());

        let cmdline = handle.cmdline().unwrap();
        assert_eq!(cmdline.first().map(String::as_str), Some("/bin/sleep"));
        assert!(handle.environ().unwrap().iter().any(|e| e == MANAGED_MARKER));

        handle.kill().unwrap();
        child.wait().unwrap();

        assert!(handle.kill().unwrap_err().is_no_such_process());
    }

    #[test]
    fn test_open_pid_of_exited_process() {
        let mut child = StdCommand::new("/bin/sh")
            .args(["-c", "exit 0"])
            .spawn()
            .unwrap();
        let pid = child.id();
        child.wait().unwrap();

        match open_pid(pid) {
            Err(e) => assert!(e.is_no_such_process()),
            // The PID may have been recycled already.
            Ok(handle) => assert_eq!(handle.pid(), pid),
        }
    }
}
