//! One-shot, non-interactive table for `--list`

use chrono::{DateTime, Utc};
use std::io::{self, Write};

use crate::format::{display_rows, progress_bar, truncate_or_pad, RowKind};
use crate::runtime::ContainerRecord;
use crate::tree::Tree;
use crate::ui::TITLE;

const RULE_WIDTH: usize = 130;

/// Every flattened row of `tree`, as plain text.
pub fn write_snapshot<W: Write>(out: &mut W, tree: &Tree, now: DateTime<Utc>) -> io::Result<()> {
    writeln!(out, "{TITLE}")?;
    writeln!(out)?;
    writeln!(
        out,
        "{:<40} {:<25} {:<12} {:<12} {:<14} UPTIME",
        "NAME", "STATUS", "CPU", "MEMORY", "NET RX/TX"
    )?;
    writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;

    if tree.is_empty() {
        writeln!(out, "No containers found")?;
        return Ok(());
    }

    for row in display_rows(tree, 0..tree.len(), now) {
        match &row.kind {
            RowKind::Project { .. } => writeln!(out, "{}", row.label())?,
            RowKind::Container {
                status,
                cpu_percent,
                mem_percent,
                net_io,
                uptime,
                ..
            } => writeln!(
                out,
                "{} {} {} {} {} {}",
                truncate_or_pad(&row.label(), 40),
                truncate_or_pad(status, 25),
                truncate_or_pad(&usage_with_bar(*cpu_percent), 12),
                truncate_or_pad(&usage_with_bar(*mem_percent), 12),
                truncate_or_pad(net_io, 14),
                uptime
            )?,
        }
    }
    Ok(())
}

fn usage_with_bar(percent: f64) -> String {
    format!("{:3.0}% {}", percent, progress_bar(percent, 5))
}

pub fn print_snapshot(tree: &Tree) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_snapshot(&mut out, tree, Utc::now())?;
    out.flush()
}

/// The decorated records, in tree order, as a JSON array.
pub fn print_json(tree: &Tree) -> anyhow::Result<()> {
    let records: Vec<&ContainerRecord> = tree
        .projects()
        .iter()
        .flat_map(|&id| tree.project_children(id))
        .collect();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &records)?;
    writeln!(out)?;
    Ok(())
}
