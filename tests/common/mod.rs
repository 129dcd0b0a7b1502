#![allow(dead_code)]

pub mod assertions;

use k0s_supervisor::process::{PidFile, Supervisor};
use k0s_supervisor::test_utils::{MemoryLogSink, SupervisorConfigBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Scratch run/data directories plus an in-memory sink for one test
pub struct TestRoot {
    pub temp_dir: TempDir,
    pub sink: Arc<MemoryLogSink>,
}

impl TestRoot {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
            sink: Arc::new(MemoryLogSink::new()),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn run_dir(&self) -> PathBuf {
        self.path().join("run")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.path().join("data")
    }

    pub fn builder(&self, name: &str) -> SupervisorConfigBuilder {
        SupervisorConfigBuilder::new(name, self.path())
    }

    pub fn supervisor(&self, builder: SupervisorConfigBuilder) -> Supervisor {
        Supervisor::with_sink(builder.build(), self.sink.clone())
    }

    pub fn pid_file(&self, name: &str) -> PidFile {
        std::fs::create_dir_all(self.run_dir()).unwrap();
        PidFile::new(&self.run_dir(), name)
    }
}

/// Whether a process with `pid` exists (zombies included)
pub fn process_exists(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

pub fn force_kill(pid: u32) {
    let _ = nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGKILL,
    );
}

/// Poll `condition` every 20ms until it holds or `timeout` passes
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Spawn `/bin/sleep 30` outside of any supervisor, optionally carrying the
/// managed marker in its environment.
pub fn spawn_leftover(managed: bool) -> std::process::Child {
    let mut command = std::process::Command::new("/bin/sleep");
    command
        .arg("30")
        .env_remove("_K0S_MANAGED")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    if managed {
        command.env("_K0S_MANAGED", "yes");
    }
    command.spawn().unwrap()
}
