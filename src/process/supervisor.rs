use crate::error::{Result, SupervisorError};
use crate::process::environment::child_env;
use crate::process::handle::{detach_command, request_graceful_shutdown};
use crate::process::log_relay::{LogSink, OutputStream, TracingLogSink, relay_output};
use crate::process::pid_file::PidFile;
use crate::process::reconcile::maybe_kill_pid_file;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RESPAWN_DELAY: Duration = Duration::from_secs(5);

/// Cleanup run before every start attempt
pub type CleanBeforeFn = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Produces the bytes fed to the child's stdin on every start
pub type StdinSource = Arc<dyn Fn() -> Vec<u8> + Send + Sync>;

/// Static configuration of one supervised component
#[derive(Clone)]
pub struct SupervisorConfig {
    pub name: String,
    pub bin_path: PathBuf,
    pub args: Vec<String>,
    pub run_dir: PathBuf,
    pub data_dir: PathBuf,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    /// Zero means [`DEFAULT_STOP_TIMEOUT`]
    pub stop_timeout: Duration,
    /// Zero means [`DEFAULT_RESPAWN_DELAY`]
    pub respawn_delay: Duration,
    /// Upper bound for graceful shutdown of the running child before it is
    /// killed. `None` keeps asking forever.
    pub shutdown_kill_after: Option<Duration>,
    /// Keep `<COMPONENT>_` prefixed variables as they are (e.g. `ETCD_*`)
    pub keep_env_prefix: bool,
    pub stdin: Option<StdinSource>,
    pub clean_before: Option<CleanBeforeFn>,
}

impl std::fmt::Debug for SupervisorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorConfig")
            .field("name", &self.name)
            .field("bin_path", &self.bin_path)
            .field("args", &self.args)
            .field("run_dir", &self.run_dir)
            .field("data_dir", &self.data_dir)
            .field("uid", &self.uid)
            .field("gid", &self.gid)
            .field("stop_timeout", &self.stop_timeout)
            .field("respawn_delay", &self.respawn_delay)
            .field("shutdown_kill_after", &self.shutdown_kill_after)
            .field("keep_env_prefix", &self.keep_env_prefix)
            .field("stdin", &self.stdin.is_some())
            .field("clean_before", &self.clean_before.is_some())
            .finish()
    }
}

impl SupervisorConfig {
    pub fn new(name: impl Into<String>, bin_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            bin_path: bin_path.into(),
            args: Vec::new(),
            run_dir: PathBuf::from("/run/k0s"),
            data_dir: PathBuf::from("/var/lib/k0s"),
            uid: None,
            gid: None,
            stop_timeout: Duration::ZERO,
            respawn_delay: Duration::ZERO,
            shutdown_kill_after: None,
            keep_env_prefix: false,
            stdin: None,
            clean_before: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_run_dir(mut self, run_dir: impl Into<PathBuf>) -> Self {
        self.run_dir = run_dir.into();
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_credentials(mut self, uid: Option<u32>, gid: Option<u32>) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_respawn_delay(mut self, delay: Duration) -> Self {
        self.respawn_delay = delay;
        self
    }

    pub fn with_shutdown_kill_after(mut self, limit: Option<Duration>) -> Self {
        self.shutdown_kill_after = limit;
        self
    }

    pub fn with_keep_env_prefix(mut self, keep: bool) -> Self {
        self.keep_env_prefix = keep;
        self
    }

    pub fn with_stdin(mut self, stdin: StdinSource) -> Self {
        self.stdin = Some(stdin);
        self
    }

    pub fn with_clean_before(mut self, clean_before: CleanBeforeFn) -> Self {
        self.clean_before = Some(clean_before);
        self
    }

    pub fn pid_file(&self) -> PidFile {
        PidFile::new(&self.run_dir, &self.name)
    }

    fn with_defaults(mut self) -> Self {
        if self.stop_timeout.is_zero() {
            self.stop_timeout = DEFAULT_STOP_TIMEOUT;
        }
        if self.respawn_delay.is_zero() {
            self.respawn_delay = DEFAULT_RESPAWN_DELAY;
        }
        self
    }
}

/// Lifetime of an active supervising loop
struct Running {
    cancel: CancellationToken,
    done: JoinHandle<()>,
}

/// Keeps a single child process of one component running.
///
/// `start` and `stop` are serialized against each other. The loop mutates the
/// current child slot under its own lock so `current_pid` never observes a
/// half-started generation.
pub struct Supervisor {
    config: SupervisorConfig,
    sink: Arc<dyn LogSink>,
    running: Mutex<Option<Running>>,
    current: Arc<StdMutex<Option<u32>>>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingLogSink))
    }

    pub fn with_sink(config: SupervisorConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            sink,
            running: Mutex::new(None),
            current: Arc::new(StdMutex::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn pid_file_path(&self) -> PathBuf {
        self.config.pid_file().path().to_path_buf()
    }

    /// PID of the currently running child, if any
    pub fn current_pid(&self) -> Option<u32> {
        *lock_current(&self.current)
    }

    /// Whether the supervising loop is active
    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.done.is_finished())
    }

    /// Start supervising.
    ///
    /// Resolves once the first child has started, or with the error of that
    /// first attempt. Later restarts happen in the background. Calling it
    /// while already started is a no-op.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        let span = info_span!("supervisor", component = %self.config.name);

        if let Some(active) = running.as_ref() {
            if !active.done.is_finished() {
                span.in_scope(|| warn!("Already started"));
                return Ok(());
            }
            // A start whose caller went away before the first attempt failed.
            *running = None;
        }

        let config = self.config.clone().with_defaults();
        let pid_file = config.pid_file();

        if let Err(e) = maybe_kill_pid_file(&pid_file, &config.bin_path, config.stop_timeout)
            .instrument(span.clone())
            .await
        {
            if !e.is_unsupported() {
                return Err(e);
            }
            span.in_scope(|| warn!("Old process cannot be terminated: {}", e));
        }

        let cancel = CancellationToken::new();
        let (started_tx, started_rx) = oneshot::channel();
        let supervision = Supervision {
            config,
            pid_file,
            sink: self.sink.clone(),
            current: self.current.clone(),
            cancel: cancel.clone(),
        };
        let done = tokio::spawn(supervision.run(started_tx).instrument(span));

        // Recorded before waiting so that a dropped `start` leaves the loop
        // reachable by `stop`.
        *running = Some(Running { cancel, done });

        let result = match started_rx.await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e,
            Err(_) => SupervisorError::ProcessError(format!(
                "supervisor for {} exited before its first start",
                self.config.name
            )),
        };

        if let Some(Running { done, .. }) = running.take() {
            let _ = done.await;
        }
        Err(result)
    }

    /// Stop supervising and wait until the child has exited.
    ///
    /// Stopping a supervisor that is not started only logs a warning.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        let span = info_span!("supervisor", component = %self.config.name);

        let Some(Running { cancel, done }) = running.take() else {
            span.in_scope(|| warn!("Not started"));
            return;
        };

        span.in_scope(|| debug!("Sending stop message"));
        cancel.cancel();

        span.in_scope(|| debug!("Waiting for stopping is done"));
        if let Err(e) = done.await {
            span.in_scope(|| warn!("Supervising loop ended abnormally: {}", e));
        }
    }
}

/// A started child together with its output relays
struct Generation {
    child: Child,
    pid: u32,
    relays: Vec<JoinHandle<()>>,
}

impl Generation {
    /// Wait until the child's output has been fully relayed. Relays still
    /// blocked after `grace` (pipes inherited by orphaned grandchildren) are
    /// aborted.
    async fn drain_output(&mut self, grace: Duration) {
        let relays: Vec<JoinHandle<()>> = self.relays.drain(..).collect();
        let aborts: Vec<_> = relays.iter().map(JoinHandle::abort_handle).collect();

        let drained = tokio::time::timeout(grace, async {
            for relay in relays {
                if let Err(e) = relay.await {
                    warn!("Output relay failed: {}", e);
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Output still open {:?} after exit, detaching it", grace);
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

/// State owned by the background supervising loop
struct Supervision {
    config: SupervisorConfig,
    pid_file: PidFile,
    sink: Arc<dyn LogSink>,
    current: Arc<StdMutex<Option<u32>>>,
    cancel: CancellationToken,
}

impl Supervision {
    async fn run(self, started_tx: oneshot::Sender<Result<()>>) {
        info!("Starting to supervise");
        let mut started_tx = Some(started_tx);
        let mut restarts: u32 = 0;

        loop {
            match self.spawn_generation() {
                Err(e) => {
                    warn!("Failed to start: {}", e);
                    if restarts == 0 {
                        if let Some(tx) = started_tx.take() {
                            let _ = tx.send(Err(e));
                        }
                        return;
                    }
                }
                Ok(mut generation) => {
                    if let Err(e) = self.pid_file.write(generation.pid).await {
                        warn!(
                            "Failed to write file {}: {}",
                            self.pid_file.path().display(),
                            e
                        );
                    }
                    *lock_current(&self.current) = Some(generation.pid);

                    if restarts == 0 {
                        info!("Started successfully, go nuts pid {}", generation.pid);
                        if let Some(tx) = started_tx.take() {
                            let _ = tx.send(Ok(()));
                        }
                    } else {
                        info!("Restarted ({})", restarts);
                    }
                    restarts += 1;

                    if self.wait_for_exit_or_shutdown(&mut generation).await {
                        return;
                    }
                }
            }

            info!("Respawning in {:?}", self.config.respawn_delay);
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Respawn canceled");
                    return;
                }
                _ = tokio::time::sleep(self.config.respawn_delay) => {
                    debug!("Respawning");
                }
            }
        }
    }

    /// Run the cleanup hook and start one child, all under the process lock.
    /// The PID is published by the caller once the PID file holds it.
    fn spawn_generation(&self) -> Result<Generation> {
        let _current = lock_current(&self.current);

        if let Some(clean_before) = &self.config.clean_before {
            clean_before().map_err(|e| {
                SupervisorError::ProcessError(format!(
                    "failed to clean before running {}: {e}",
                    self.config.bin_path.display()
                ))
            })?;
        }

        let mut command = self.build_command();
        let mut child = command.spawn().map_err(|e| {
            SupervisorError::ProcessError(format!(
                "failed to start {}: {e}",
                self.config.bin_path.display()
            ))
        })?;

        let Some(pid) = child.id() else {
            return Err(SupervisorError::ProcessError(format!(
                "{} exited before its PID could be read",
                self.config.bin_path.display()
            )));
        };

        let mut relays = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            relays.push(tokio::spawn(
                relay_output(
                    stdout,
                    self.config.name.clone(),
                    OutputStream::Stdout,
                    self.sink.clone(),
                )
                .in_current_span(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            relays.push(tokio::spawn(
                relay_output(
                    stderr,
                    self.config.name.clone(),
                    OutputStream::Stderr,
                    self.sink.clone(),
                )
                .in_current_span(),
            ));
        }
        if let (Some(mut stdin), Some(source)) = (child.stdin.take(), &self.config.stdin) {
            let input = source();
            tokio::spawn(
                async move {
                    if let Err(e) = stdin.write_all(&input).await {
                        warn!("Failed to write stdin: {}", e);
                    }
                }
                .in_current_span(),
            );
        }

        Ok(Generation { child, pid, relays })
    }

    fn build_command(&self) -> Command {
        let mut command = Command::new(&self.config.bin_path);
        command
            .args(&self.config.args)
            .current_dir(&self.config.data_dir)
            .env_clear()
            .envs(child_env(
                &self.config.data_dir,
                &self.config.name,
                self.config.keep_env_prefix,
            ))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        if self.config.stdin.is_some() {
            command.stdin(Stdio::piped());
        } else {
            command.stdin(Stdio::null());
        }

        detach_command(&mut command, self.config.uid, self.config.gid);
        command
    }

    /// Wait for the child to exit on its own or for shutdown to be requested.
    /// Returns true when shutdown is complete.
    async fn wait_for_exit_or_shutdown(&self, generation: &mut Generation) -> bool {
        let exited = tokio::select! {
            result = generation.child.wait() => Some(result),
            _ = self.cancel.cancelled() => None,
        };

        let shutdown = match exited {
            Some(result) => {
                log_exit(result);
                false
            }
            None => {
                self.terminate(generation).await;
                true
            }
        };

        generation.drain_output(self.config.stop_timeout).await;
        *lock_current(&self.current) = None;
        self.pid_file.remove().await;
        shutdown
    }

    /// Ask the child to exit until it does. Only kills it when
    /// `shutdown_kill_after` is configured and exceeded.
    async fn terminate(&self, generation: &mut Generation) {
        let began = Instant::now();

        loop {
            info!("Requesting graceful shutdown");
            match request_graceful_shutdown(generation.pid) {
                Ok(()) | Err(SupervisorError::NoSuchProcess(_)) => {}
                Err(e) => warn!("Failed to request graceful shutdown: {}", e),
            }

            match tokio::time::timeout(self.config.stop_timeout, generation.child.wait()).await {
                Ok(Ok(status)) => {
                    debug!("Process exited: {}", status);
                    return;
                }
                Ok(Err(e)) => {
                    warn!("Failed to wait for process: {}", e);
                    return;
                }
                Err(_) => {}
            }

            if let Some(limit) = self.config.shutdown_kill_after {
                if began.elapsed() >= limit {
                    warn!(
                        "Process {} still running after {:?}, killing it",
                        generation.pid, limit
                    );
                    if let Err(e) = generation.child.start_kill() {
                        warn!("Failed to kill process: {}", e);
                    }
                    if let Err(e) = generation.child.wait().await {
                        warn!("Failed to wait for process: {}", e);
                    }
                    return;
                }
            }

            info!(
                "Process {} still running after {:?}",
                generation.pid, self.config.stop_timeout
            );
        }
    }
}

fn log_exit(result: std::io::Result<ExitStatus>) {
    match result {
        Ok(status) => warn!("Process exited: {}", status),
        Err(e) => warn!("Failed to wait for process: {}", e),
    }
}

fn lock_current(current: &StdMutex<Option<u32>>) -> MutexGuard<'_, Option<u32>> {
    current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("config", &self.config)
            .field("current_pid", &self.current_pid())
            .finish()
    }
}

/// Resolve the binary a component runs when none is configured explicitly.
pub fn default_bin_path(data_dir: &Path, component: &str) -> PathBuf {
    data_dir.join("bin").join(component)
}
