//! Context menus for tree nodes and the background tasks that carry them out

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::AppEvent;
use crate::error::{Operation, Result};
use crate::runtime::{ContainerRecord, ContainerRuntime};
use crate::tree::{NodeId, NodeKind, Tree};

pub const LABEL_RESTART_ALL: &str = "Restart All";
pub const LABEL_STOP_ALL: &str = "Stop All";
pub const LABEL_REMOVE_ALL: &str = "Stop & Remove All (keeps volumes)";
pub const LABEL_START_ALL: &str = "Start All";
pub const LABEL_RESTART: &str = "Restart";
pub const LABEL_STOP: &str = "Stop";
pub const LABEL_REMOVE: &str = "Stop & Remove (keeps volumes)";
pub const LABEL_START: &str = "Start";
pub const LABEL_VIEW_LOGS: &str = "View Logs";

/// A container an action will touch, captured when the menu opens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub id: String,
    pub name: String,
}

impl From<&ContainerRecord> for Target {
    fn from(record: &ContainerRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
        }
    }
}

/// One lifecycle operation applied to each target in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub label: String,
    pub op: Operation,
    pub targets: Vec<Target>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MenuCommand {
    Lifecycle(Action),
    ViewLogs(Target),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub command: MenuCommand,
}

impl MenuItem {
    fn lifecycle(label: &str, op: Operation, targets: Vec<Target>) -> Self {
        Self {
            label: label.to_string(),
            command: MenuCommand::Lifecycle(Action {
                label: label.to_string(),
                op,
                targets,
            }),
        }
    }
}

/// Heading shown above a node's menu.
pub fn menu_title(tree: &Tree, id: NodeId) -> String {
    let node = tree.node(id);
    if node.is_project() {
        format!("Actions for project: {}", node.name)
    } else {
        format!("Actions for container: {}", node.name)
    }
}

/// Context menu for a tree node.
pub fn menu_for(tree: &Tree, id: NodeId) -> Vec<MenuItem> {
    match &tree.node(id).kind {
        NodeKind::Project { .. } => {
            let children = tree.project_children(id);
            let select = |keep: fn(&ContainerRecord) -> bool| -> Vec<Target> {
                children.iter().copied().filter(|c| keep(c)).map(Target::from).collect()
            };
            vec![
                MenuItem::lifecycle(LABEL_RESTART_ALL, Operation::Restart, select(|c| c.is_running())),
                MenuItem::lifecycle(LABEL_STOP_ALL, Operation::Stop, select(|c| c.is_running())),
                MenuItem::lifecycle(LABEL_REMOVE_ALL, Operation::Remove, select(|_| true)),
                MenuItem::lifecycle(LABEL_START_ALL, Operation::Start, select(|c| !c.is_running())),
            ]
        }
        NodeKind::Container(record) => {
            let target = vec![Target::from(record)];
            let mut items = if record.is_running() {
                vec![
                    MenuItem::lifecycle(LABEL_RESTART, Operation::Restart, target.clone()),
                    MenuItem::lifecycle(LABEL_STOP, Operation::Stop, target.clone()),
                    MenuItem::lifecycle(LABEL_REMOVE, Operation::Remove, target),
                ]
            } else {
                vec![MenuItem::lifecycle(LABEL_START, Operation::Start, target)]
            };
            items.push(MenuItem {
                label: LABEL_VIEW_LOGS.to_string(),
                command: MenuCommand::ViewLogs(Target::from(record)),
            });
            items
        }
    }
}

async fn apply(runtime: &dyn ContainerRuntime, op: Operation, id: &str) -> Result<()> {
    match op {
        Operation::Start => runtime.start(id).await,
        Operation::Stop => runtime.stop(id).await,
        Operation::Restart => runtime.restart(id).await,
        Operation::Remove => runtime.remove(id).await,
    }
}

/// Run `action` against every target in order, continuing past failures.
/// Returns one message per failed target.
pub async fn run_action(runtime: &dyn ContainerRuntime, action: &Action) -> Vec<String> {
    let mut failures = Vec::new();
    for target in &action.targets {
        match apply(runtime, action.op, &target.id).await {
            Ok(()) => info!(op = %action.op, container = %target.name, "lifecycle operation succeeded"),
            Err(e) => {
                warn!(op = %action.op, container = %target.name, error = %e, "lifecycle operation failed");
                failures.push(format!("{}: {}", target.name, e));
            }
        }
    }
    failures
}

/// Launches lifecycle and log tasks in the background. Each task reports
/// back once through the event channel; callers never wait on it.
#[derive(Clone)]
pub struct ActionDispatcher {
    runtime: Arc<dyn ContainerRuntime>,
    events: UnboundedSender<AppEvent>,
    log_tail_lines: usize,
}

impl ActionDispatcher {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, events: UnboundedSender<AppEvent>, log_tail_lines: usize) -> Self {
        Self {
            runtime,
            events,
            log_tail_lines,
        }
    }

    pub fn dispatch(&self, action: Action) -> JoinHandle<()> {
        let runtime = Arc::clone(&self.runtime);
        let events = self.events.clone();
        info!(action = %action.label, targets = action.targets.len(), "dispatching action");
        tokio::spawn(async move {
            let failures = run_action(runtime.as_ref(), &action).await;
            let _ = events.send(AppEvent::ActionCompleted {
                label: action.label,
                failures,
            });
        })
    }

    pub fn fetch_logs(&self, target: Target) -> JoinHandle<()> {
        let runtime = Arc::clone(&self.runtime);
        let events = self.events.clone();
        let tail = self.log_tail_lines;
        tokio::spawn(async move {
            let result = runtime.logs(&target.id, tail).await;
            if let Err(e) = &result {
                warn!(container = %target.name, error = %e, "log retrieval failed");
            }
            let _ = events.send(AppEvent::LogsLoaded {
                name: target.name,
                result,
            });
        })
    }
}
