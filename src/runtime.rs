//! Container runtime access: record types, the runtime port, and the Docker adapter

use async_trait::async_trait;
use bollard::container::{
    ListContainersOptions, LogsOptions, RemoveContainerOptions, RestartContainerOptions,
    StartContainerOptions, Stats, StatsOptions, StopContainerOptions,
};
use bollard::Docker;
use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{DashboardError, Operation, Result};

pub const STATE_RUNNING: &str = "running";
pub const MEM_USAGE_PLACEHOLDER: &str = "N/A";

/// One container as reported by a single list call, decorated with the
/// latest sampled metrics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub status: String,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub mem_usage: String,
    pub net_rx: u64,
    pub net_tx: u64,
    pub created_at: DateTime<Utc>,
    pub labels: HashMap<String, String>,
}

impl ContainerRecord {
    /// A record with placeholder metrics, as produced by a list call.
    pub fn new(id: String, name: String, state: String) -> Self {
        Self {
            id,
            name,
            image: String::new(),
            status: String::new(),
            state,
            cpu_percent: 0.0,
            mem_percent: 0.0,
            mem_usage: MEM_USAGE_PLACEHOLDER.to_string(),
            net_rx: 0,
            net_tx: 0,
            created_at: Utc.timestamp_opt(0, 0).single().unwrap_or_default(),
            labels: HashMap::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == STATE_RUNNING
    }
}

/// Cumulative CPU counters at one point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CpuCounters {
    pub total_usage: u64,
    pub system_usage: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NetworkCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// A point-in-time resource sample for one container. The runtime reports
/// the previous CPU reading alongside the current one so a rate can be
/// derived from a single call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatsSnapshot {
    pub cpu: CpuCounters,
    pub precpu: CpuCounters,
    pub online_cpus: u32,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub networks: HashMap<String, NetworkCounters>,
}

impl From<Stats> for StatsSnapshot {
    fn from(stats: Stats) -> Self {
        let online_cpus = stats
            .cpu_stats
            .online_cpus
            .or_else(|| {
                stats
                    .cpu_stats
                    .cpu_usage
                    .percpu_usage
                    .as_ref()
                    .map(|per_cpu| per_cpu.len() as u64)
            })
            .unwrap_or(1);

        let networks = stats
            .networks
            .unwrap_or_default()
            .into_iter()
            .map(|(iface, net)| {
                (
                    iface,
                    NetworkCounters {
                        rx_bytes: net.rx_bytes,
                        tx_bytes: net.tx_bytes,
                    },
                )
            })
            .collect();

        Self {
            cpu: CpuCounters {
                total_usage: stats.cpu_stats.cpu_usage.total_usage,
                system_usage: stats.cpu_stats.system_cpu_usage.unwrap_or(0),
            },
            precpu: CpuCounters {
                total_usage: stats.precpu_stats.cpu_usage.total_usage,
                system_usage: stats.precpu_stats.system_cpu_usage.unwrap_or(0),
            },
            online_cpus: u32::try_from(online_cpus).unwrap_or(u32::MAX),
            memory_usage: stats.memory_stats.usage.unwrap_or(0),
            memory_limit: stats.memory_stats.limit.unwrap_or(0),
            networks,
        }
    }
}

/// The control surface the dashboard consumes. Everything that touches the
/// runtime goes through this trait so the engine can be driven by a fake in
/// tests.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// List containers; `all` includes stopped ones.
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerRecord>>;

    async fn stats(&self, id: &str) -> Result<StatsSnapshot>;

    async fn start(&self, id: &str) -> Result<()>;

    async fn stop(&self, id: &str) -> Result<()>;

    async fn restart(&self, id: &str) -> Result<()>;

    /// Force-remove a container. Volumes are kept.
    async fn remove(&self, id: &str) -> Result<()>;

    /// Last `tail` lines of combined stdout and stderr.
    async fn logs(&self, id: &str, tail: usize) -> Result<String>;
}

pub struct DockerRuntime {
    docker: Docker,
    stop_timeout_secs: u32,
}

impl DockerRuntime {
    /// Connect using the local defaults (socket or DOCKER_HOST) and verify
    /// the daemon answers.
    pub async fn connect(stop_timeout_secs: u32) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DashboardError::Connect(e.to_string()))?;
        docker
            .ping()
            .await
            .map_err(|e| DashboardError::Connect(e.to_string()))?;
        info!("connected to docker daemon");
        Ok(Self {
            docker,
            stop_timeout_secs,
        })
    }

    fn action_error(op: Operation, id: &str, err: bollard::errors::Error) -> DashboardError {
        DashboardError::Action {
            op,
            container: id.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerRecord>> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| DashboardError::List(e.to_string()))?;

        let records = summaries
            .into_iter()
            .map(|c| {
                let id: String = c.id.unwrap_or_default().chars().take(12).collect();
                let name = c
                    .names
                    .as_ref()
                    .and_then(|names| names.first())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_else(|| id.clone());
                let mut record =
                    ContainerRecord::new(id, name, c.state.unwrap_or_else(|| "unknown".to_string()));
                record.image = c.image.unwrap_or_default();
                record.status = c.status.unwrap_or_default();
                record.labels = c.labels.unwrap_or_default();
                if let Some(created) = c.created.and_then(|secs| Utc.timestamp_opt(secs, 0).single()) {
                    record.created_at = created;
                }
                record
            })
            .collect::<Vec<_>>();

        debug!(count = records.len(), all, "listed containers");
        Ok(records)
    }

    async fn stats(&self, id: &str) -> Result<StatsSnapshot> {
        // stream=false still waits for a second sample, so precpu is populated
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let mut stream = self.docker.stats(id, Some(options));
        match stream.next().await {
            Some(Ok(stats)) => Ok(StatsSnapshot::from(stats)),
            Some(Err(e)) => Err(DashboardError::Stats {
                container: id.to_string(),
                reason: e.to_string(),
            }),
            None => Err(DashboardError::Stats {
                container: id.to_string(),
                reason: "empty stats response".to_string(),
            }),
        }
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Self::action_error(Operation::Start, id, e))
    }

    async fn stop(&self, id: &str) -> Result<()> {
        let options = StopContainerOptions {
            t: i64::from(self.stop_timeout_secs),
        };
        self.docker
            .stop_container(id, Some(options))
            .await
            .map_err(|e| Self::action_error(Operation::Stop, id, e))
    }

    async fn restart(&self, id: &str) -> Result<()> {
        let options = RestartContainerOptions {
            t: self.stop_timeout_secs as isize,
        };
        self.docker
            .restart_container(id, Some(options))
            .await
            .map_err(|e| Self::action_error(Operation::Restart, id, e))
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            v: false,
            ..Default::default()
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| Self::action_error(Operation::Remove, id, e))
    }

    async fn logs(&self, id: &str, tail: usize) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.logs(id, Some(options));
        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(log) => output.push_str(&log.to_string()),
                Err(e) => {
                    return Err(DashboardError::Logs {
                        container: id.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(output)
    }
}
