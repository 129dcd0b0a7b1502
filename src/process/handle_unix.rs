use crate::error::{Result, SupervisorError};
use crate::process::handle::ProcessHandle;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use sysinfo::{
    Pid as SysPid, ProcessRefreshKind, ProcessStatus as SysProcessStatus, ProcessesToUpdate,
    System, UpdateKind,
};
use tokio::process::Command;

/// Unix process handle backed by signals and the system process table
pub struct UnixProcessHandle {
    pid: Pid,
}

pub fn open_pid(pid: u32) -> Result<Box<dyn ProcessHandle>> {
    let raw = i32::try_from(pid)
        .map_err(|_| SupervisorError::ProcessError(format!("PID {pid} is out of range")))?;
    let handle = UnixProcessHandle {
        pid: Pid::from_raw(raw),
    };

    // Signal 0 probes for existence without delivering anything.
    match kill(handle.pid, None::<Signal>) {
        Ok(()) | Err(Errno::EPERM) => Ok(Box::new(handle)),
        Err(Errno::ESRCH) => Err(SupervisorError::NoSuchProcess(pid)),
        Err(e) => Err(SupervisorError::ProcessError(format!(
            "cannot probe PID {pid}: {e}"
        ))),
    }
}

pub fn detach_command(command: &mut Command, uid: Option<u32>, gid: Option<u32>) {
    command.process_group(0);

    if let Some(gid) = gid.filter(|gid| *gid != 0) {
        command.gid(gid);
    }
    if let Some(uid) = uid.filter(|uid| *uid != 0) {
        command.uid(uid);
    }
}

impl UnixProcessHandle {
    fn raw_pid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    fn send(&self, signal: Signal) -> Result<()> {
        match kill(self.pid, signal) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(SupervisorError::NoSuchProcess(self.raw_pid())),
            Err(e) => Err(SupervisorError::ProcessError(format!(
                "failed to send {signal} to PID {}: {e}",
                self.pid
            ))),
        }
    }

    /// Refresh this single process and extract data from it.
    fn inspect<T>(&self, extract: impl FnOnce(&sysinfo::Process) -> T) -> Result<T> {
        let sys_pid = SysPid::from_u32(self.raw_pid());
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::nothing()
                .with_cmd(UpdateKind::Always)
                .with_environ(UpdateKind::Always),
        );

        match system.process(sys_pid) {
            Some(process) if process.status() != SysProcessStatus::Zombie => Ok(extract(process)),
            _ => Err(SupervisorError::NoSuchProcess(self.raw_pid())),
        }
    }
}

impl ProcessHandle for UnixProcessHandle {
    fn pid(&self) -> u32 {
        self.raw_pid()
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
        self.send(Signal::SIGTERM)
    }

    fn kill(&self) -> Result<()> {
        self.send(Signal::SIGKILL)
    }
}
