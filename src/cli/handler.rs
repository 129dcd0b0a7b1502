#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_node_config;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_check_config_lists_components() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_node_config(
            temp_dir.path(),
            r#"
[[components]]
name = "etcd"

[[components]]
name = "kubelet"
bin_path = "/usr/bin/kubelet"
extra_args = "--v=2"
"#,
        );

        let handler = CliHandler::new(Some(config_path));
        let result = handler.handle_command(Commands::CheckConfig).await.unwrap();
        match result {
            CliResult::Success(msg) => {
                assert!(msg.contains("2 components"));
                assert!(msg.contains("etcd"));
                assert!(msg.contains("/usr/bin/kubelet --v=2"));
            }
            CliResult::Error(msg) => panic!("unexpected error: {msg}"),
        }
    }

    #[tokio::test]
    async fn test_check_config_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_node_config(
            temp_dir.path(),
            "[[components]]\nname = \"etcd\"\n\n[[components]]\nname = \"etcd\"\n",
        );

        let handler = CliHandler::new(Some(config_path));
        assert!(handler.handle_command(Commands::CheckConfig).await.is_err());
    }

    #[tokio::test]
    async fn test_env_for_unknown_component() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_node_config(temp_dir.path(), "");

        let handler = CliHandler::new(Some(config_path));
        let result = handler
            .handle_command(Commands::Env {
                component: "etcd".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(result, CliResult::Error(_)));
    }

    #[tokio::test]
    async fn test_env_starts_with_marker() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_node_config(temp_dir.path(), "[[components]]\nname = \"etcd\"\n");

        let handler = CliHandler::new(Some(config_path));
        let result = handler
            .handle_command(Commands::Env {
                component: "etcd".to_string(),
            })
            .await
            .unwrap();
        match result {
            CliResult::Success(msg) => assert!(msg.starts_with("_K0S_MANAGED=yes")),
            CliResult::Error(msg) => panic!("unexpected error: {msg}"),
        }
    }
}

use crate::cli::commands::{CliResult, Commands};
use crate::cli::signals::ShutdownSignals;
use crate::config::{NodeConfig, default_config_path};
use crate::error::Result;
use crate::logging;
use crate::process::{FileLogSink, LogSink, TracingLogSink, child_env, format_env};
use crate::registry::SupervisorRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct CliHandler {
    config_path: PathBuf,
    verbose: bool,
}

impl CliHandler {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path: config_path.unwrap_or_else(default_config_path),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub async fn handle_command(&self, command: Commands) -> Result<CliResult> {
        let config = NodeConfig::load_from_path(&self.config_path).await?;

        match command {
            Commands::Run => self.run(config).await,
            Commands::CheckConfig => Ok(CliResult::Success(self.describe(&config))),
            Commands::Env { component } => Ok(Self::env(&config, &component)),
        }
    }

    async fn run(&self, config: NodeConfig) -> Result<CliResult> {
        let mut logging_config = config.logging.clone();
        if self.verbose {
            logging_config.level = "debug".to_string();
        }
        logging::init_logging(&logging_config, config.log_dir(), true)?;

        let mut signals = ShutdownSignals::install()?;
        let sink: Arc<dyn LogSink> = if config.logging.component_log_files {
            Arc::new(FileLogSink::new(config.log_dir().join("components")))
        } else {
            Arc::new(TracingLogSink)
        };
        let registry = SupervisorRegistry::from_config(&config, sink)?;
        if let Err(e) = registry.start_all().await {
            return Ok(CliResult::Error(format!("Failed to start components: {e}")));
        }

        signals.wait().await;
        info!("Shutting down {} components", registry.len());
        registry.stop_all().await;

        Ok(CliResult::Success("All components stopped".to_string()))
    }

    fn describe(&self, config: &NodeConfig) -> String {
        let mut lines = vec![format!(
            "Configuration {} is valid: {} components",
            self.config_path.display(),
            config.components.len()
        )];

        for component in &config.components {
            let mut command = vec![component.resolved_bin_path(config).display().to_string()];
            if let Ok(args) = component.full_args() {
                command.extend(args);
            }
            lines.push(format!("  {}: {}", component.name, command.join(" ")));
        }

        lines.join("\n")
    }

    fn env(config: &NodeConfig, component: &str) -> CliResult {
        let Some(definition) = config.component(component) else {
            return CliResult::Error(format!("Unknown component: {component}"));
        };

        let env = child_env(&config.paths.data_dir, &definition.name, definition.keep_env_prefix);
        CliResult::Success(format_env(&env).join("\n"))
    }
}
