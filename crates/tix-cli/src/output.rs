//! Rendering for `tix` command results and failures.
//!
//! A command produces one serializable value. In JSON mode that value is the
//! whole of stdout; otherwise the command supplies a human renderer (and
//! optionally a separate tab-separated one for pipes).
//!
//! The mode is picked in this order: `--format`, then `--json`, then the
//! `FORMAT` environment variable, then pretty on a terminal and text
//! elsewhere. Failures go to stderr in the same mode.

use chrono::{DateTime, Local, Utc};
use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};
use tix_core::EngineError;
use tracing::warn;

const RULE: &str = "------------------------------------------------------------------------";

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{RULE}")
}

/// Heading line underlined with a rule.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}\n{RULE}")
}

/// `key:` padded to a fixed column, then the value.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    let label = format!("{key}:");
    writeln!(w, "{label:<12} {}", value.as_ref())
}

/// Timestamp in the user's zone, second precision.
pub fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Tables and sections for a person at a terminal.
    Pretty,
    /// Tab-separated rows for scripts.
    Text,
    /// JSON documents.
    Json,
}

impl OutputMode {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }

    /// Case-insensitive mode name as found in `FORMAT`.
    fn from_env_value(raw: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(raw.trim(), true).ok()
    }
}

fn choose_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    format_env: Option<&str>,
    stdout_is_tty: bool,
) -> OutputMode {
    format_flag
        .or_else(|| json_flag.then_some(OutputMode::Json))
        .or_else(|| format_env.and_then(OutputMode::from_env_value))
        .unwrap_or(if stdout_is_tty {
            OutputMode::Pretty
        } else {
            OutputMode::Text
        })
}

/// Pick the output mode for this invocation.
pub fn resolve_output_mode(format_flag: Option<OutputMode>, json_flag: bool) -> OutputMode {
    let format_env = std::env::var("FORMAT").ok();
    choose_mode(
        format_flag,
        json_flag,
        format_env.as_deref(),
        io::stdout().is_terminal(),
    )
}

/// Write `value` to stdout: as JSON, or through `text_fn` / `pretty_fn`.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    match mode {
        OutputMode::Json => write_json(&mut out, value)?,
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    out.flush()?;
    Ok(())
}

/// Like [`render_mode`] with one renderer for both non-JSON modes.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human_fn: impl Fn(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    render_mode(mode, value, &human_fn, &human_fn)
}

fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// A failure as shown to the user; in JSON mode it is wrapped as
/// `{"error": {...}}`.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    /// What to try next.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// `E####` from the engine's code table, or a short tag such as
    /// `already_initialized`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn with_details(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()).filter(|s: &String| !s.is_empty()),
            error_code: Some(error_code.into()),
        }
    }
}

impl From<&EngineError> for CliError {
    fn from(err: &EngineError) -> Self {
        let code = err.code();
        Self {
            message: err.to_string(),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }
}

fn write_error(mode: OutputMode, error: &CliError, out: &mut dyn Write) -> anyhow::Result<()> {
    if mode.is_json() {
        return write_json(out, &serde_json::json!({ "error": error }));
    }
    match error.error_code.as_deref() {
        Some(code) if code.starts_with('E') => {
            writeln!(out, "error[{code}]: {}", error.message)?;
        }
        _ => writeln!(out, "error: {}", error.message)?,
    }
    if let Some(ref hint) = error.suggestion {
        writeln!(out, "  hint: {hint}")?;
    }
    Ok(())
}

/// Write `error` to stderr.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    write_error(mode, error, &mut io::stderr().lock())
}

/// Write `error` to stderr ahead of a failure the caller returns itself. A
/// failed write is logged and otherwise ignored.
pub fn report_error(mode: OutputMode, error: &CliError) {
    report_to(mode, error, &mut io::stderr().lock());
}

fn report_to(mode: OutputMode, error: &CliError, out: &mut dyn Write) -> bool {
    match write_error(mode, error, out) {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, message = %error.message, "could not write error report");
            false
        }
    }
}

/// Report an engine failure on stderr and return it for `?`.
pub fn engine_failure(mode: OutputMode, err: EngineError) -> anyhow::Error {
    match render_error(mode, &CliError::from(&err)) {
        Ok(()) => anyhow::Error::new(err),
        Err(render_err) => render_err,
    }
}
