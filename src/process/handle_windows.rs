use crate::error::{Result, SupervisorError};
use crate::process::handle::ProcessHandle;
use sysinfo::{Pid as SysPid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tokio::process::Command;
use windows::Win32::System::Console::{CTRL_BREAK_EVENT, GenerateConsoleCtrlEvent};
use windows::Win32::System::Threading::CREATE_NEW_PROCESS_GROUP;

/// Windows process handle backed by the system process table and console
/// control events
pub struct WindowsProcessHandle {
    pid: u32,
}

pub fn open_pid(pid: u32) -> Result<Box<dyn ProcessHandle>> {
    let handle = WindowsProcessHandle { pid };
    handle.inspect(|_| ())?;
    Ok(Box::new(handle))
}

/// Puts the child into its own process group so that Ctrl+Break events only
/// reach the spawned process. Credentials are not applicable on Windows.
pub fn detach_command(command: &mut Command, _uid: Option<u32>, _gid: Option<u32>) {
    command.creation_flags(CREATE_NEW_PROCESS_GROUP.0);
}

impl WindowsProcessHandle {
    fn inspect<T>(&self, extract: impl FnOnce(&sysinfo::Process) -> T) -> Result<T> {
        let sys_pid = SysPid::from_u32(self.pid);
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::nothing()
                .with_cmd(UpdateKind::Always)
                .with_environ(UpdateKind::Always),
        );

        system
            .process(sys_pid)
            .map(extract)
            .ok_or(SupervisorError::NoSuchProcess(self.pid))
    }
}

impl ProcessHandle for WindowsProcessHandle {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn is_alive(&self) -> Result<bool> {
        match self.inspect(|_| ()) {
            Ok(()) => Ok(true),
            Err(SupervisorError::NoSuchProcess(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn cmdline(&self) -> Result<Vec<String>> {
        self.inspect(|process| {
            process
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect()
        })
    }

    fn environ(&self) -> Result<Vec<String>> {
        self.inspect(|process| {
            process
                .environ()
                .iter()
                .map(|entry| entry.to_string_lossy().into_owned())
                .collect()
        })
    }

    fn request_graceful_shutdown(&self) -> Result<()> {
        if !self.is_alive()? {
            return Err(SupervisorError::NoSuchProcess(self.pid));
        }

        // The child was started with CREATE_NEW_PROCESS_GROUP, so its PID is
        // also its process group ID.
        unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, self.pid) }.map_err(|e| {
            SupervisorError::ProcessError(format!(
                "GenerateConsoleCtrlEvent failed for PID {}: {e}",
                self.pid
            ))
        })
    }

    fn kill(&self) -> Result<()> {
        let killed = self.inspect(|process| process.kill())?;
        if killed {
            Ok(())
        } else {
            Err(SupervisorError::ProcessError(format!(
                "TerminateProcess failed for PID {}",
                self.pid
            )))
        }
    }
}
