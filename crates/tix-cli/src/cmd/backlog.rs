//! `tix unassigned`, `tix overdue`, `tix dashboard` — backlog views.
//!
//! `--limit` defaults to `projections.default_limit` from the project config.

use std::io::Write;
use std::path::Path;

use clap::Args;
use tix_core::Dashboard;

use crate::cmd::list::{render_ticket_rows, render_ticket_table};
use crate::cmd::stats::render_stats_human;
use crate::engine::{Engine, open_engine};
use crate::output::{OutputMode, engine_failure, local_time, pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct BacklogArgs {
    /// Maximum tickets to show.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

impl BacklogArgs {
    fn limit(&self, engine: &Engine) -> usize {
        self.limit.unwrap_or(engine.config.projections.default_limit)
    }
}

/// Execute `tix unassigned`: unowned `created`/`waiting` tickets, newest
/// first.
///
/// # Errors
///
/// Returns an error (already rendered) if the project or store cannot be read.
pub fn run_unassigned(
    args: &BacklogArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let engine = open_engine(output, project_root)?;
    let tickets = engine
        .projector
        .unassigned(args.limit(&engine))
        .map_err(|err| engine_failure(output, err))?;

    render_mode(
        output,
        &tickets,
        |t, w| render_ticket_rows(t, w),
        |t, w| render_ticket_table(t, w),
    )
}

/// Execute `tix overdue`: open tickets past their due time, most overdue
/// first.
///
/// # Errors
///
/// Returns an error (already rendered) if the project or store cannot be read.
pub fn run_overdue(
    args: &BacklogArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let engine = open_engine(output, project_root)?;
    let tickets = engine
        .projector
        .overdue(args.limit(&engine))
        .map_err(|err| engine_failure(output, err))?;

    render_mode(
        output,
        &tickets,
        |t, w| render_ticket_rows(t, w),
        |t, w| render_ticket_table(t, w),
    )
}

/// Execute `tix dashboard`: histogram and both backlogs from one snapshot.
///
/// # Errors
///
/// Returns an error (already rendered) if the project or store cannot be read.
pub fn run_dashboard(
    args: &BacklogArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let engine = open_engine(output, project_root)?;
    let dashboard = engine
        .projector
        .dashboard(args.limit(&engine))
        .map_err(|err| engine_failure(output, err))?;

    render_mode(
        output,
        &dashboard,
        |d, w| render_dashboard_text(d, w),
        |d, w| render_dashboard_human(d, w),
    )
}

fn render_dashboard_text(dashboard: &Dashboard, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "generated_at\t{}", dashboard.generated_at.to_rfc3339())?;
    for (status, count) in dashboard.stats.iter() {
        writeln!(w, "stat\t{status}\t{count}")?;
    }
    for t in &dashboard.unassigned {
        writeln!(w, "unassigned\t{}\t{}\t{}", t.id, t.status, t.title)?;
    }
    for t in &dashboard.overdue {
        writeln!(w, "overdue\t{}\t{}\t{}", t.id, t.status, t.title)?;
    }
    Ok(())
}

fn render_dashboard_human(dashboard: &Dashboard, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "Dashboard at {}", local_time(dashboard.generated_at))?;
    writeln!(w)?;
    render_stats_human(&dashboard.stats, w)?;
    writeln!(w)?;
    pretty_section(w, &format!("Unassigned ({})", dashboard.unassigned.len()))?;
    render_ticket_table(&dashboard.unassigned, w)?;
    writeln!(w)?;
    pretty_section(w, &format!("Overdue ({})", dashboard.overdue.len()))?;
    render_ticket_table(&dashboard.overdue, w)
}
