//! `tix stats` — ticket counts per status.

use std::io::Write;
use std::path::Path;

use clap::Args;
use tix_core::StatusHistogram;

use crate::engine::open_engine;
use crate::output::{OutputMode, engine_failure, pretty_rule, render_mode};

/// Arguments for `tix stats`.
#[derive(Args, Debug, Default)]
pub struct StatsArgs {}

/// Execute `tix stats`.
///
/// # Errors
///
/// Returns an error (already rendered) if the project or store cannot be read.
pub fn run_stats(
    _args: &StatsArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let engine = open_engine(output, project_root)?;
    let histogram = engine
        .projector
        .status_histogram()
        .map_err(|err| engine_failure(output, err))?;

    render_mode(
        output,
        &histogram,
        |h, w| render_stats_text(h, w),
        |h, w| render_stats_human(h, w),
    )
}

fn render_stats_text(histogram: &StatusHistogram, w: &mut dyn Write) -> std::io::Result<()> {
    for (status, count) in histogram.iter() {
        writeln!(w, "{status}\t{count}")?;
    }
    writeln!(w, "total\t{}", histogram.total())
}

/// Status histogram with a proportional bar per row.
pub fn render_stats_human(histogram: &StatusHistogram, w: &mut dyn Write) -> std::io::Result<()> {
    const BAR_WIDTH: usize = 40;
    let widest = histogram.iter().map(|(_, n)| n).max().unwrap_or(0).max(1);

    writeln!(w, "Tickets by status")?;
    pretty_rule(w)?;
    for (status, count) in histogram.iter() {
        let bar = "█".repeat(count * BAR_WIDTH / widest);
        writeln!(w, "{:<12} {count:>5}  {bar}", status.as_str())?;
    }
    pretty_rule(w)?;
    writeln!(w, "{:<12} {:>5}", "total", histogram.total())
}
