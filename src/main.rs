// Project: Docker Project Manager
mod actions;
mod app;
mod config;
mod error;
mod format;
mod grouping;
mod runtime;
mod snapshot;
mod stats;
mod tree;
mod ui;
mod viewport;

use clap::Parser;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use runtime::{ContainerRuntime, DockerRuntime};
use stats::StatsAggregator;
use tree::Tree;

const DESCRIPTION: &str = "Docker containers grouped by project, with live stats and lifecycle actions";

#[derive(Parser, Debug)]
#[command(name = "dpm")]
#[command(about = DESCRIPTION, long_about = None, disable_version_flag = true)]
struct Args {
    /// Print the container tree once and exit
    #[arg(short, long)]
    list: bool,

    /// With --list, print the containers as JSON instead of a table
    #[arg(long, requires = "list")]
    json: bool,

    /// Config file to use instead of ~/.dpm/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print version and exit
    #[arg(short = 'V', long)]
    version: bool,
}

/// Logs go nowhere unless DPM_LOG_FILE names a file; the terminal belongs
/// to the dashboard.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_file = std::env::var("DPM_LOG_FILE")
        .ok()
        .filter(|path| !path.trim().is_empty())
        .and_then(|path| OpenOptions::new().create(true).append(true).open(path).ok());

    match log_file {
        Some(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
}

async fn list(runtime: Arc<dyn ContainerRuntime>, config: &Config, json: bool) -> anyhow::Result<()> {
    let aggregator = StatsAggregator::new(runtime, config.sample_timeout());
    let records = match aggregator.refresh(config.show_all).await {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "snapshot listing failed");
            eprintln!("Failed to list containers: {e}");
            process::exit(1);
        }
    };

    let tree = Tree::build(&records);
    if json {
        snapshot::print_json(&tree)
    } else {
        snapshot::print_snapshot(&tree)?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.version {
        println!("dpm v{}", env!("CARGO_PKG_VERSION"));
        println!("{DESCRIPTION}");
        return Ok(());
    }

    init_logging();
    let config = Config::load_or_default(args.config.as_deref());

    let runtime: Arc<dyn ContainerRuntime> = match DockerRuntime::connect(config.stop_timeout_secs).await {
        Ok(runtime) => Arc::new(runtime),
        Err(e) => {
            eprintln!("Failed to create Docker client: {e}");
            process::exit(1);
        }
    };

    if args.list {
        return list(runtime, &config, args.json).await;
    }

    info!("starting interactive dashboard");
    if let Err(e) = ui::run(runtime, &config).await {
        eprintln!("Error running program: {e}");
        process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let args = Args::try_parse_from(["dpm", "-l", "--json", "--config", "/tmp/dpm.toml"]).unwrap();
        assert!(args.list && args.json && !args.version);
        assert_eq!(args.config.as_deref(), Some(std::path::Path::new("/tmp/dpm.toml")));

        assert!(Args::try_parse_from(["dpm", "-V"]).unwrap().version);
        assert!(Args::try_parse_from(["dpm", "--json"]).is_err());
    }
}
