//! Error types for talking to the container runtime and loading settings

use thiserror::Error;

/// Lifecycle operation names, used when reporting action failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Stop,
    Restart,
    Remove,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Restart => "restart",
            Operation::Remove => "remove",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum DashboardError {
    /// The runtime could not be reached at startup.
    #[error("failed to connect to the container runtime: {0}")]
    Connect(String),

    /// Enumerating containers failed during a refresh.
    #[error("failed to list containers: {0}")]
    List(String),

    /// Sampling resource counters for one container failed.
    #[error("failed to sample stats for {container}: {reason}")]
    Stats { container: String, reason: String },

    #[error("failed to {op} {container}: {reason}")]
    Action {
        op: Operation,
        container: String,
        reason: String,
    },

    #[error("failed to fetch logs for {container}: {reason}")]
    Logs { container: String, reason: String },

    #[error("invalid config file: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
