use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Where log lines go when no log file is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Stderr,
    /// The terminal is owned by the TUI.
    Discard,
}

fn writer(log_file: Option<&Path>, fallback: Fallback) -> Result<BoxMakeWriter> {
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        return Ok(BoxMakeWriter::new(Mutex::new(file)));
    }
    Ok(match fallback {
        Fallback::Stderr => BoxMakeWriter::new(std::io::stderr),
        Fallback::Discard => BoxMakeWriter::new(std::io::sink),
    })
}

/// Installs the global subscriber. `log` records are bridged into it.
pub fn init(level: LevelFilter, log_file: Option<&Path>, fallback: Fallback) -> Result<()> {
    let to_terminal = log_file.is_none() && fallback == Fallback::Stderr;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer(log_file, fallback)?)
        .with_ansi(to_terminal)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))?;
    log::debug!("logging initialized at {}", level);
    Ok(())
}
