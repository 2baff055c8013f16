use clap::builder::styling::{AnsiColor, Color, Styles};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tracestats::stats::{PercentageScope, StatType};
use tracestats::store::SortKey;
use tracestats::trace::ApiVariant;

/// Help styles shared by every subcommand
fn help_styles() -> Styles {
    Styles::styled()
        .header(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .usage(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .placeholder(anstyle::Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .invalid(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON output
    Json,
}

#[derive(Parser)]
#[command(name = "tracestats")]
#[command(about = "Graphics API call statistics from apitrace captures", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
#[command(styles = help_styles())]
#[command(arg_required_else_help = true)]
#[command(
    after_long_help = "See `tracestats config show` for the configuration file location and effective values."
)]
pub struct Cli {
    /// Show dump commands and debug info
    #[arg(
        long,
        short = 'v',
        global = true,
        display_order = 100,
        help_heading = "Global Options"
    )]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Store location shared by the store subcommands
#[derive(Debug, clap::Args)]
pub struct StoreArgs {
    /// Consolidated store file (default: from config, else the data directory)
    #[arg(long, value_name = "path")]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Write an example configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show the configuration file location and effective values
    Show,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract call statistics from one or more traces
    #[command(after_long_help = "\
Each trace is dumped in windows of --chunk-calls calls, one dump process per
window, with -j workers in parallel. Results for all traces are written to a
single JSON document (default: tracestats.json).

The exit status is non-zero if any trace failed; skipped traces count as
successes.")]
    Parse {
        /// Trace files to parse
        #[arg(required = true, value_name = "TRACES")]
        traces: Vec<PathBuf>,

        /// Worker threads per trace
        #[arg(short = 'j', long, value_name = "N")]
        threads: Option<usize>,

        /// Output document
        #[arg(short, long, value_name = "path")]
        output: Option<PathBuf>,

        /// Display name recorded with the trace
        #[arg(long)]
        name: Option<String>,

        /// Link recorded with the trace (e.g. a store page)
        #[arg(long, value_name = "URL")]
        link: Option<String>,

        /// Skip traces captured with this API (repeatable)
        #[arg(long = "skip-api", value_name = "API")]
        skip_apis: Vec<ApiVariant>,

        /// Dump tool executable
        #[arg(short = 'a', long, value_name = "path")]
        apitrace: Option<PathBuf>,

        /// Graphics API of the traces, skipping detection
        #[arg(long, value_name = "API")]
        api: Option<ApiVariant>,

        /// Also extract shader blobs into this directory
        #[arg(long, value_name = "DIR")]
        shader_dump: Option<PathBuf>,

        /// Kill a dump process after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Calls per dump invocation
        #[arg(long, value_name = "N", hide_short_help = true)]
        chunk_calls: Option<u64>,
    },

    /// Import tracestats documents into the store
    Import {
        /// Documents to import
        #[arg(required = true, value_name = "FILES")]
        files: Vec<PathBuf>,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Search the store by stat name or application
    #[command(after_long_help = "\
QUERY is matched case-insensitively against stat names. When no stat name
matches, it is matched against application names instead. End the query
with \" !\" to require an exact match, e.g. 'glClear !'.")]
    Search {
        /// Text to search for
        query: String,

        #[command(flatten)]
        store: StoreArgs,

        /// Only traces captured with this API
        #[arg(long, value_name = "API")]
        api: Option<ApiVariant>,

        /// Only rows of this stat type (e.g. api_calls, render_states)
        #[arg(long = "type", value_name = "TYPE")]
        stat_type: Option<StatType>,

        /// Traces the corpus percentage is relative to
        #[arg(long, value_enum)]
        scope: Option<PercentageScope>,

        /// Maximum number of results
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// List every trace in the store
    List {
        #[command(flatten)]
        store: StoreArgs,

        #[arg(long, value_enum, default_value_t)]
        sort: SortKey,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Trace counts per API
    Summary {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Remove a trace from the store
    Remove {
        /// Application name
        application: String,

        /// API the trace was captured with
        api: ApiVariant,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}
