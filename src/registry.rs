use crate::config::NodeConfig;
use crate::error::Result;
use crate::logging::{log_component_event, log_warning};
use crate::process::{LogSink, Supervisor};
use std::sync::Arc;
use tracing::info;

/// Owns one supervisor per configured component, in configuration order
#[derive(Debug)]
pub struct SupervisorRegistry {
    supervisors: Vec<Supervisor>,
}

impl SupervisorRegistry {
    pub fn new(supervisors: Vec<Supervisor>) -> Self {
        Self { supervisors }
    }

    pub fn from_config(config: &NodeConfig, sink: Arc<dyn LogSink>) -> Result<Self> {
        let supervisors = config
            .components
            .iter()
            .map(|component| {
                let supervisor_config = component.to_supervisor_config(config)?;
                Ok(Supervisor::with_sink(supervisor_config, sink.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(supervisors))
    }

    /// Start every supervisor in order. On failure the ones already started
    /// are stopped again in reverse order.
    pub async fn start_all(&self) -> Result<()> {
        for (index, supervisor) in self.supervisors.iter().enumerate() {
            if let Err(e) = supervisor.start().await {
                log_warning(
                    supervisor.name(),
                    "start failed, stopping started components",
                    Some(&e.to_string()),
                );
                for started in self.supervisors[..index].iter().rev() {
                    started.stop().await;
                }
                return Err(e);
            }
            log_component_event(supervisor.name(), "started", "supervision active");
        }

        info!("Started {} components", self.supervisors.len());
        Ok(())
    }

    /// Stop every supervisor in reverse start order.
    pub async fn stop_all(&self) {
        for supervisor in self.supervisors.iter().rev() {
            supervisor.stop().await;
            log_component_event(supervisor.name(), "stopped", "supervision ended");
        }
    }

    pub fn get(&self, name: &str) -> Option<&Supervisor> {
        self.supervisors.iter().find(|s| s.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.supervisors.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.supervisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supervisors.is_empty()
    }

    /// PID of every component's current generation, if one is running
    pub fn current_pids(&self) -> Vec<(String, Option<u32>)> {
        self.supervisors
            .iter()
            .map(|s| (s.name().to_string(), s.current_pid()))
            .collect()
    }
}
