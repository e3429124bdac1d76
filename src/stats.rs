//! Per-container resource metrics, sampled concurrently

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::Result;
use crate::format::format_bytes;
use crate::runtime::{ContainerRecord, ContainerRuntime, CpuCounters, NetworkCounters, StatsSnapshot, MEM_USAGE_PLACEHOLDER};

/// Metrics merged back into a record after sampling.
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerMetrics {
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub mem_usage: String,
    pub net_rx: u64,
    pub net_tx: u64,
}

impl ContainerMetrics {
    /// What a container shows when sampling failed or timed out.
    pub fn placeholder() -> Self {
        Self {
            cpu_percent: 0.0,
            mem_percent: 0.0,
            mem_usage: MEM_USAGE_PLACEHOLDER.to_string(),
            net_rx: 0,
            net_tx: 0,
        }
    }

    pub fn from_snapshot(snapshot: &StatsSnapshot) -> Self {
        let (net_rx, net_tx) = network_totals(&snapshot.networks);
        Self {
            cpu_percent: cpu_percent(snapshot.cpu, snapshot.precpu, snapshot.online_cpus),
            mem_percent: memory_percent(snapshot.memory_usage, snapshot.memory_limit),
            mem_usage: format!(
                "{} / {}",
                format_bytes(snapshot.memory_usage),
                format_bytes(snapshot.memory_limit)
            ),
            net_rx,
            net_tx,
        }
    }

    fn apply_to(self, record: &mut ContainerRecord) {
        record.cpu_percent = self.cpu_percent;
        record.mem_percent = self.mem_percent;
        record.mem_usage = self.mem_usage;
        record.net_rx = self.net_rx;
        record.net_tx = self.net_tx;
    }
}

/// CPU share between two cumulative readings, scaled by online CPUs.
pub fn cpu_percent(current: CpuCounters, previous: CpuCounters, online_cpus: u32) -> f64 {
    let cpu_delta = current.total_usage as f64 - previous.total_usage as f64;
    let system_delta = current.system_usage as f64 - previous.system_usage as f64;
    cpu_percent_from_deltas(cpu_delta, system_delta, online_cpus)
}

/// Zero unless both deltas are positive; never negative or non-finite.
pub fn cpu_percent_from_deltas(cpu_delta: f64, system_delta: f64, online_cpus: u32) -> f64 {
    if system_delta > 0.0 && cpu_delta > 0.0 {
        let percent = (cpu_delta / system_delta) * f64::from(online_cpus) * 100.0;
        if percent.is_finite() {
            return percent;
        }
    }
    0.0
}

pub fn memory_percent(usage: u64, limit: u64) -> f64 {
    if limit > 0 {
        usage as f64 / limit as f64 * 100.0
    } else {
        0.0
    }
}

/// Received and transmitted bytes summed over every interface.
pub fn network_totals(networks: &HashMap<String, NetworkCounters>) -> (u64, u64) {
    networks.values().fold((0u64, 0u64), |(rx, tx), net| {
        (rx.saturating_add(net.rx_bytes), tx.saturating_add(net.tx_bytes))
    })
}

pub struct StatsAggregator {
    runtime: Arc<dyn ContainerRuntime>,
    sample_timeout: Duration,
}

impl StatsAggregator {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, sample_timeout: Duration) -> Self {
        Self {
            runtime,
            sample_timeout,
        }
    }

    /// List containers and decorate the running ones with fresh metrics.
    pub async fn refresh(&self, all: bool) -> Result<Vec<ContainerRecord>> {
        let records = self.runtime.list_containers(all).await?;
        Ok(self.collect(records).await)
    }

    /// Sample every running container concurrently and merge each result
    /// back at its original index. A failed or timed out sample leaves
    /// placeholder metrics on that record only.
    pub async fn collect(&self, mut records: Vec<ContainerRecord>) -> Vec<ContainerRecord> {
        let running: Vec<(usize, String)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_running())
            .map(|(index, r)| (index, r.id.clone()))
            .collect();
        if running.is_empty() {
            return records;
        }

        let dispatched = running.len();
        let (tx, mut rx) = mpsc::channel::<(usize, ContainerMetrics)>(dispatched);
        for (index, id) in running {
            let runtime = Arc::clone(&self.runtime);
            let tx = tx.clone();
            let deadline = self.sample_timeout;
            tokio::spawn(async move {
                let metrics = sample(runtime.as_ref(), &id, deadline).await;
                let _ = tx.send((index, metrics)).await;
            });
        }
        // Only the task clones remain; recv yields None if they all vanish.
        drop(tx);

        let mut received = 0;
        while received < dispatched {
            match rx.recv().await {
                Some((index, metrics)) => {
                    metrics.apply_to(&mut records[index]);
                    received += 1;
                }
                None => {
                    warn!(received, dispatched, "stats tasks ended without reporting");
                    break;
                }
            }
        }
        records
    }
}

async fn sample(runtime: &dyn ContainerRuntime, id: &str, deadline: Duration) -> ContainerMetrics {
    match timeout(deadline, runtime.stats(id)).await {
        Ok(Ok(snapshot)) => {
            debug!(container = id, "sampled stats");
            ContainerMetrics::from_snapshot(&snapshot)
        }
        Ok(Err(e)) => {
            warn!(container = id, error = %e, "stats sampling failed");
            ContainerMetrics::placeholder()
        }
        Err(_) => {
            warn!(container = id, timeout_ms = deadline.as_millis() as u64, "stats sampling timed out");
            ContainerMetrics::placeholder()
        }
    }
}
