//! CLI argument definitions for the harmonization engine.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "harmon",
    version,
    about = "Schema harmonization - map tabular data onto a target schema",
    long_about = "Map the columns of a tabular data file onto a target schema.\n\n\
                  Generates ranked mapping candidates from several matchers,\n\
                  supports interactive review with undo/redo, and exports the\n\
                  harmonized table plus a column/value mapping document."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate (or reload) ranked mapping candidates for a source file.
    Suggest(SuggestArgs),

    /// Apply a review decision to the candidate set.
    Review(ReviewArgs),

    /// List the matcher registry, optionally registering a new matcher.
    Matchers(MatchersArgs),

    /// Export the harmonized table and mapping document.
    Export(ExportArgs),
}

/// Arguments shared by every session-bound subcommand.
#[derive(Args)]
pub struct SessionArgs {
    /// Path to the source CSV file.
    #[arg(value_name = "SOURCE_CSV")]
    pub source: PathBuf,

    /// Target schema CSV (default: the built-in reference dictionary).
    #[arg(long = "target", value_name = "PATH")]
    pub target: Option<PathBuf>,

    /// Restrict target columns to these schema nodes (repeatable).
    #[arg(long = "node", value_name = "NODE")]
    pub nodes: Vec<String>,

    /// Candidates kept per source column per matcher.
    #[arg(long = "top-k", default_value_t = 10)]
    pub top_k: usize,

    /// Directory for candidate cache files.
    #[arg(long = "cache-dir", value_name = "DIR", default_value = ".harmon-cache")]
    pub cache_dir: PathBuf,

    /// Session id (default: the source file stem).
    #[arg(long = "session", value_name = "ID")]
    pub session: Option<String>,
}

#[derive(Parser)]
pub struct SuggestArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Print candidates as JSON instead of a table.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Parser)]
pub struct ReviewArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// The review decision to apply.
    #[arg(long = "op", value_enum)]
    pub op: ReviewOpArg,

    /// Source column the decision applies to (unused for undo/redo).
    #[arg(long = "source-column", value_name = "NAME")]
    pub source_column: Option<String>,

    /// Target column (required for accept/reject).
    #[arg(long = "target-column", value_name = "NAME")]
    pub target_column: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ReviewOpArg {
    Accept,
    Reject,
    Discard,
    Undo,
    Redo,
}

#[derive(Parser)]
pub struct MatchersArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Name of a new matcher to register.
    #[arg(long = "register", value_name = "NAME")]
    pub register: Option<String>,

    /// Matcher definition, e.g. 'define strict = fuzzy(threshold=0.9)'.
    #[arg(long = "definition", value_name = "CODE", requires = "register")]
    pub definition: Option<String>,

    /// Extra construction parameters as key=value (repeatable).
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,
}

#[derive(Parser)]
pub struct ExportArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Output directory (default: alongside the source file).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Which artifacts to write.
    #[arg(long = "format", value_enum, default_value = "both")]
    pub format: ExportFormatArg,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportFormatArg {
    /// Harmonized CSV only.
    Table,
    /// Mapping JSON only.
    Mapping,
    /// Both artifacts.
    Both,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
