use crate::process::SupervisorConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Builder for supervisor configurations rooted in a scratch directory
///
/// Creates `<root>/run` and `<root>/data/bin` and uses short timeouts so
/// tests never sit on the production defaults.
pub struct SupervisorConfigBuilder {
    config: SupervisorConfig,
}

impl SupervisorConfigBuilder {
    pub fn new(name: &str, root: &Path) -> Self {
        let run_dir = root.join("run");
        let data_dir = root.join("data");
        std::fs::create_dir_all(&run_dir).expect("Failed to create run dir");
        std::fs::create_dir_all(data_dir.join("bin")).expect("Failed to create data dir");

        Self {
            config: SupervisorConfig::new(name, "/bin/sh")
                .with_run_dir(run_dir)
                .with_data_dir(data_dir)
                .with_stop_timeout(Duration::from_millis(500))
                .with_respawn_delay(Duration::from_millis(200)),
        }
    }

    pub fn bin_path(mut self, bin_path: impl Into<PathBuf>) -> Self {
        self.config.bin_path = bin_path.into();
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.config.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Run `script` through `/bin/sh -c`
    pub fn shell(self, script: &str) -> Self {
        self.bin_path("/bin/sh").args(&["-c", script])
    }

    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.config.stop_timeout = timeout;
        self
    }

    pub fn respawn_delay(mut self, delay: Duration) -> Self {
        self.config.respawn_delay = delay;
        self
    }

    pub fn shutdown_kill_after(mut self, limit: Duration) -> Self {
        self.config.shutdown_kill_after = Some(limit);
        self
    }

    pub fn keep_env_prefix(mut self, keep: bool) -> Self {
        self.config.keep_env_prefix = keep;
        self
    }

    pub fn build(self) -> SupervisorConfig {
        self.config
    }
}
