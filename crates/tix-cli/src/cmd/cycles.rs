//! `tix cycles` — handling rounds of a ticket, one per open or reopen.

use std::io::Write;
use std::path::Path;

use clap::Args;
use tix_core::replay::{Cycle, CycleReport};

use crate::engine::{open_engine, ticket_id};
use crate::output::{OutputMode, engine_failure, local_time, pretty_kv, pretty_section, render};

#[derive(Args, Debug)]
pub struct CyclesArgs {
    /// Ticket id.
    pub id: String,
}

/// Execute `tix cycles`.
///
/// # Errors
///
/// Returns an error (already rendered) if the id is unknown.
pub fn run_cycles(
    args: &CyclesArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let id = ticket_id(output, &args.id)?;
    let engine = open_engine(output, project_root)?;
    let report = engine
        .service
        .cycles(&id)
        .map_err(|err| engine_failure(output, err))?;

    render(output, &report, |r, w| render_cycles_human(r, w))
}

fn format_secs(secs: i64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m:02}m")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}

fn render_cycle(cycle: &Cycle, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_kv(w, "opened", local_time(cycle.opened_at))?;
    let milestones = [
        ("assigned", cycle.first_assigned_at),
        ("started", cycle.started_at),
        ("escalated", cycle.escalated_at),
        ("resolved", cycle.resolved_at),
        ("closed", cycle.closed_at),
        ("canceled", cycle.canceled_at),
    ];
    for (label, at) in milestones {
        if let Some(at) = at {
            pretty_kv(w, label, local_time(at))?;
        }
    }
    if let Some(secs) = cycle.resolution_secs {
        pretty_kv(w, "took", format_secs(secs))?;
    }
    pretty_kv(w, "status", cycle.status.as_str())
}

fn render_cycles_human(report: &CycleReport, w: &mut dyn Write) -> std::io::Result<()> {
    for (n, cycle) in report.cycles.iter().enumerate() {
        if n > 0 {
            writeln!(w)?;
        }
        let marker = if n == report.current { " (current)" } else { "" };
        pretty_section(w, &format!("Cycle {}{marker}", n + 1))?;
        render_cycle(cycle, w)?;
    }
    Ok(())
}
