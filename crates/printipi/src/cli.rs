//! Command-line surface: mirrors `klipper-host`'s clap-derive `Cli`,
//! trimmed to the single-process, no-subcommand shape this firmware
//! actually needs.

use std::path::PathBuf;

use clap::Parser;

/// Real-time 3D-printer firmware: reads G-code from `input_path` (or
/// stdin), executes it against the configured machine, and writes any
/// non-reply output to `output_path` (or discards it).
#[derive(Parser, Debug)]
#[command(name = "printipi", version, about)]
pub struct Cli {
    /// G-code source. Defaults to stdin when omitted.
    pub input_path: Option<PathBuf>,

    /// Where to mirror the raw G-code stream read from `input_path`.
    /// Defaults to discarding it.
    pub output_path: Option<PathBuf>,

    /// Suppress all logging below `error`.
    #[arg(long, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,

    /// Raise the log level to `debug`.
    #[arg(long, conflicts_with = "debug")]
    pub verbose: bool,

    /// Raise the log level to `trace`.
    #[arg(long)]
    pub debug: bool,

    /// Base directory M32 filenames are resolved against. Defaults to
    /// the current working directory.
    #[arg(long)]
    pub fsroot: Option<PathBuf>,
}

impl Cli {
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.debug {
            tracing::Level::TRACE
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
