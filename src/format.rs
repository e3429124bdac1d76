//! Display formatting shared by the interactive view and the snapshot printer

use chrono::{DateTime, Utc};
use std::ops::Range;

use crate::tree::{NodeKind, Tree};

pub const ICON_EXPANDED: &str = "▼";
pub const ICON_COLLAPSED: &str = "▶";

const BAR_FILLED: char = '█';
const BAR_EMPTY: char = '░';

/// Binary size with one decimal, e.g. `"512.0 MiB"`. Anything under 1 KiB
/// reads as `"0 B"`.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return "0 B".to_string();
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}iB", bytes as f64 / div as f64, prefix)
}

/// Short network counter for narrow columns: `"0"`, `"3.4K"`, `"120M"`.
pub fn format_net_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const UNITS: [char; 5] = ['K', 'M', 'G', 'T', 'P'];
    if bytes < UNIT {
        return "0".to_string();
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp < UNITS.len() - 1 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let value = bytes as f64 / div as f64;
    if value >= 100.0 {
        format!("{:.0}{}", value, UNITS[exp])
    } else {
        format!("{:.1}{}", value, UNITS[exp])
    }
}

pub fn format_net_io(rx: u64, tx: u64) -> String {
    format!("{}/{}", format_net_bytes(rx), format_net_bytes(tx))
}

/// Time since `created`, largest units first with zero parts left out.
pub fn format_uptime(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(created);
    let total_minutes = elapsed.num_minutes().max(0);
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;

    let parts: Vec<String> = [(days, 'd'), (hours, 'h'), (minutes, 'm')]
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect();
    if parts.is_empty() {
        "0m".to_string()
    } else {
        parts.join(" ")
    }
}

/// Fixed-width cell: pads with spaces, or cuts and ends with `...`.
pub fn truncate_or_pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len > width {
        if width < 3 {
            return text.chars().take(width).collect();
        }
        let mut cut: String = text.chars().take(width - 3).collect();
        cut.push_str("...");
        cut
    } else {
        format!("{text}{}", " ".repeat(width - len))
    }
}

pub fn progress_bar(percent: f64, width: usize) -> String {
    let percent = if percent.is_finite() { percent.clamp(0.0, 100.0) } else { 0.0 };
    let filled = ((percent / 100.0) * width as f64) as usize;
    let filled = filled.min(width);
    let mut bar = String::with_capacity(width * 3);
    bar.extend(std::iter::repeat(BAR_FILLED).take(filled));
    bar.extend(std::iter::repeat(BAR_EMPTY).take(width - filled));
    bar
}

#[derive(Clone, Debug, PartialEq)]
pub enum RowKind {
    Project {
        expanded: bool,
        child_count: usize,
    },
    Container {
        status: String,
        running: bool,
        cpu_percent: f64,
        mem_percent: f64,
        net_io: String,
        uptime: String,
    },
}

/// One flattened tree entry, ready to render.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayRow {
    pub depth: usize,
    pub name: String,
    pub kind: RowKind,
    pub selected: bool,
}

impl DisplayRow {
    pub fn icon(&self) -> Option<&'static str> {
        match self.kind {
            RowKind::Project { expanded: true, .. } => Some(ICON_EXPANDED),
            RowKind::Project { expanded: false, .. } => Some(ICON_COLLAPSED),
            RowKind::Container { .. } => None,
        }
    }

    pub fn indent(&self) -> String {
        "  ".repeat(self.depth)
    }

    /// Name column text: `▼ shopapp (2)` for projects, the indented name
    /// for containers.
    pub fn label(&self) -> String {
        match &self.kind {
            RowKind::Project { child_count, .. } => format!(
                "{}{} {} ({})",
                self.indent(),
                self.icon().unwrap_or_default(),
                self.name,
                child_count
            ),
            RowKind::Container { .. } => format!("{}  {}", self.indent(), self.name),
        }
    }
}

/// Rows for the flattened indices in `range`.
pub fn display_rows(tree: &Tree, range: Range<usize>, now: DateTime<Utc>) -> Vec<DisplayRow> {
    let flat = tree.flat();
    let range = range.start.min(flat.len())..range.end.min(flat.len());
    let selected = tree.selected_id().map(|_| tree.selected_index());

    range
        .map(|index| {
            let id = flat[index];
            let node = tree.node(id);
            let kind = match &node.kind {
                NodeKind::Project { expanded } => RowKind::Project {
                    expanded: *expanded,
                    child_count: node.children.len(),
                },
                NodeKind::Container(record) => RowKind::Container {
                    status: record.status.clone(),
                    running: record.is_running(),
                    cpu_percent: record.cpu_percent,
                    mem_percent: record.mem_percent,
                    net_io: format_net_io(record.net_rx, record.net_tx),
                    uptime: format_uptime(record.created_at, now),
                },
            };
            DisplayRow {
                depth: tree.depth(id),
                name: node.name.clone(),
                kind,
                selected: selected == Some(index),
            }
        })
        .collect()
}
