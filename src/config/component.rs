use crate::config::global::{NodeConfig, validate_timeouts};
use crate::error::{Result, SupervisorError};
use crate::process::{SupervisorConfig, default_bin_path};
use crate::users;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One `[[components]]` entry of the node configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentDefinition {
    pub name: String,
    pub bin_path: Option<PathBuf>, // defaults to <data_dir>/bin/<name>
    #[serde(default)]
    pub args: Vec<String>,
    pub extra_args: Option<String>, // shell-style, appended after args
    #[serde(default)]
    pub keep_env_prefix: bool,
    pub user: Option<String>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub stop_timeout_secs: Option<u64>,
    pub respawn_delay_secs: Option<u64>,
    pub shutdown_kill_after_secs: Option<u64>,
}

impl ComponentDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bin_path: None,
            args: Vec::new(),
            extra_args: None,
            keep_env_prefix: false,
            user: None,
            uid: None,
            gid: None,
            stop_timeout_secs: None,
            respawn_delay_secs: None,
            shutdown_kill_after_secs: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_name(&self.name) {
            return Err(SupervisorError::ConfigError(format!(
                "Invalid component name {:?}: must be non-empty and usable as a file name",
                self.name
            )));
        }

        if self.user.is_some() && self.uid.is_some() {
            return Err(SupervisorError::ConfigError(format!(
                "{}: user and uid are mutually exclusive",
                self.name
            )));
        }

        self.split_extra_args()?;

        validate_timeouts(
            &self.name,
            self.stop_timeout_secs,
            self.respawn_delay_secs,
            self.shutdown_kill_after_secs,
        )
    }

    /// `args` followed by the shell-split `extra_args`
    pub fn full_args(&self) -> Result<Vec<String>> {
        let mut args = self.args.clone();
        args.extend(self.split_extra_args()?);
        Ok(args)
    }

    fn split_extra_args(&self) -> Result<Vec<String>> {
        match &self.extra_args {
            None => Ok(Vec::new()),
            Some(extra) => shlex::split(extra).ok_or_else(|| {
                SupervisorError::ConfigError(format!(
                    "{}: cannot split extra_args {extra:?}",
                    self.name
                ))
            }),
        }
    }

    pub fn resolved_bin_path(&self, node: &NodeConfig) -> PathBuf {
        self.bin_path
            .clone()
            .unwrap_or_else(|| default_bin_path(&node.paths.data_dir, &self.name))
    }

    /// Build the supervisor configuration, resolving `user` to a UID.
    pub fn to_supervisor_config(&self, node: &NodeConfig) -> Result<SupervisorConfig> {
        let uid = match (&self.user, self.uid) {
            (Some(user), _) => Some(users::lookup_uid(user)?),
            (None, uid) => uid,
        };

        let defaults = &node.supervisor;
        let stop_timeout = self
            .stop_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| defaults.stop_timeout());
        let respawn_delay = self
            .respawn_delay_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| defaults.respawn_delay());
        let shutdown_kill_after = self
            .shutdown_kill_after_secs
            .map(Duration::from_secs)
            .or_else(|| defaults.shutdown_kill_after());

        Ok(SupervisorConfig::new(&self.name, self.resolved_bin_path(node))
            .with_args(self.full_args()?)
            .with_run_dir(&node.paths.run_dir)
            .with_data_dir(&node.paths.data_dir)
            .with_credentials(uid, self.gid)
            .with_stop_timeout(stop_timeout)
            .with_respawn_delay(respawn_delay)
            .with_shutdown_kill_after(shutdown_kill_after)
            .with_keep_env_prefix(self.keep_env_prefix))
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn node() -> NodeConfig {
        let mut node = NodeConfig::default();
        node.paths.run_dir = PathBuf::from("/tmp/run");
        node.paths.data_dir = PathBuf::from("/tmp/data");
        node
    }

    #[test]
    fn test_defaults_come_from_node() {
        let component = ComponentDefinition::new("etcd");
        let config = component.to_supervisor_config(&node()).unwrap();

        assert_eq!(config.name, "etcd");
        assert_eq!(config.bin_path, Path::new("/tmp/data/bin/etcd"));
        assert_eq!(config.run_dir, Path::new("/tmp/run"));
        assert_eq!(config.data_dir, Path::new("/tmp/data"));
        assert_eq!(config.stop_timeout, Duration::from_secs(5));
        assert_eq!(config.respawn_delay, Duration::from_secs(5));
        assert_eq!(config.shutdown_kill_after, None);
        assert!(!config.keep_env_prefix);
        assert_eq!(config.uid, None);
    }

    #[test]
    fn test_overrides() {
        let mut component = ComponentDefinition::new("kubelet");
        component.bin_path = Some(PathBuf::from("/usr/local/bin/kubelet"));
        component.args = vec!["--config=/etc/kubelet.yaml".to_string()];
        component.extra_args = Some(r#"--node-labels="a=b c" --v=2"#.to_string());
        component.uid = Some(1000);
        component.gid = Some(1000);
        component.stop_timeout_secs = Some(30);
        component.shutdown_kill_after_secs = Some(60);
        component.keep_env_prefix = true;

        let config = component.to_supervisor_config(&node()).unwrap();

        assert_eq!(config.bin_path, Path::new("/usr/local/bin/kubelet"));
        assert_eq!(
            config.args,
            vec!["--config=/etc/kubelet.yaml", "--node-labels=a=b c", "--v=2"]
        );
        assert_eq!(config.uid, Some(1000));
        assert_eq!(config.gid, Some(1000));
        assert_eq!(config.stop_timeout, Duration::from_secs(30));
        assert_eq!(config.shutdown_kill_after, Some(Duration::from_secs(60)));
        assert!(config.keep_env_prefix);
    }

    #[test]
    fn test_unbalanced_extra_args_rejected() {
        let mut component = ComponentDefinition::new("etcd");
        component.extra_args = Some("--name=\"unterminated".to_string());

        assert!(component.validate().is_err());
        assert!(component.to_supervisor_config(&node()).is_err());
    }

    #[test]
    fn test_user_and_uid_are_exclusive() {
        let mut component = ComponentDefinition::new("etcd");
        component.user = Some("etcd".to_string());
        component.uid = Some(1000);

        assert!(component.validate().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_user_is_resolved() {
        let mut component = ComponentDefinition::new("etcd");
        component.user = Some("root".to_string());

        let config = component.to_supervisor_config(&node()).unwrap();
        assert_eq!(config.uid, Some(0));
    }

    #[test]
    fn test_zero_timeout_override_rejected() {
        let mut component = ComponentDefinition::new("etcd");
        component.respawn_delay_secs = Some(0);

        assert!(component.validate().is_err());
    }
}
