use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "layout-includes",
    version,
    about = "Incremental include graph for layout resources",
    long_about = "Track which layout documents include which, persist the include map per project, and report cyclical <include> chains. Layouts are discovered under <root>/res/layout*/ respecting .gitignore and .ignore; use --no-ignore to bypass ignore rules."
)]
pub struct Cli {
    /// Suppress non-essential output
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load the include map (or scan every layout) and print it
    Scan {
        /// Project root (directory containing res/layout); detected when omitted
        #[arg(short, long)]
        path: Option<PathBuf>,
        /// Path to a TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Bypass ignore rules (.gitignore/.ignore) when discovering layouts
        #[arg(long, env = "LAYOUT_INCLUDES_NO_IGNORE", default_value_t = false)]
        no_ignore: bool,
        /// Discard the persisted include map and scan from scratch
        #[arg(long, default_value_t = false)]
        rebuild: bool,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Run queries over the include graph
    Query {
        #[command(subcommand)]
        query: QueryCommands,
    },
    /// Re-read one layout, update the graph and check it for include cycles
    Update {
        /// Layout name (file name without .xml)
        document: String,
        #[arg(short, long)]
        path: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, env = "LAYOUT_INCLUDES_NO_IGNORE", default_value_t = false)]
        no_ignore: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum QueryCommands {
    /// Layouts directly included by a layout
    Includes {
        /// Layout name (file name without .xml)
        document: String,
        #[arg(short, long)]
        path: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, env = "LAYOUT_INCLUDES_NO_IGNORE", default_value_t = false)]
        no_ignore: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Layouts that directly include a layout
    IncludedBy {
        document: String,
        #[arg(short, long)]
        path: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, env = "LAYOUT_INCLUDES_NO_IGNORE", default_value_t = false)]
        no_ignore: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Every layout that includes a layout directly or indirectly
    Roots {
        document: String,
        #[arg(short, long)]
        path: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, env = "LAYOUT_INCLUDES_NO_IGNORE", default_value_t = false)]
        no_ignore: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Include chains that revisit a layout
    Cycles {
        #[arg(short, long)]
        path: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, env = "LAYOUT_INCLUDES_NO_IGNORE", default_value_t = false)]
        no_ignore: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// The include map in its persisted encoding
    Encoded {
        #[arg(short, long)]
        path: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, env = "LAYOUT_INCLUDES_NO_IGNORE", default_value_t = false)]
        no_ignore: bool,
    },
}

#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
