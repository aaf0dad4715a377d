//! Command-line argument surface.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "trellis - index document trees into a queryable property graph")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Store connection string: mem://, rocksdb://<dir>, or ws://host:port
    #[arg(long, global = true, env = "TRELLIS_DB_URI")]
    pub db_uri: Option<String>,

    /// Store username (remote engines)
    #[arg(long, global = true, env = "TRELLIS_DB_USER")]
    pub db_user: Option<String>,

    /// Store password (remote engines)
    #[arg(long, global = true, env = "TRELLIS_DB_PASS", hide_env_values = true)]
    pub db_pass: Option<String>,

    /// Store namespace
    #[arg(long, global = true, env = "TRELLIS_DB_NS")]
    pub namespace: Option<String>,

    /// Store database name
    #[arg(long, global = true, env = "TRELLIS_DB_NAME")]
    pub database: Option<String>,

    /// Config file path (defaults to ~/.config/trellis/config.toml)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Set log level
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index a document tree into the graph
    Index {
        /// Corpus root directory
        path: PathBuf,

        /// Remove this corpus's existing subgraph before indexing
        #[arg(long)]
        clear: bool,

        /// Index only the top level, not subdirectories
        #[arg(long)]
        no_recursive: bool,

        /// Skip the language-model extraction phase
        #[arg(long)]
        no_semantic: bool,
    },

    /// Hybrid search over indexed content
    Search {
        /// Query text for vector and full-text retrieval
        #[arg(short, long)]
        query: Option<String>,

        /// Filter by tag
        #[arg(short, long)]
        tag: Option<String>,

        /// Filter by folder path prefix
        #[arg(short, long)]
        folder: Option<String>,

        /// Filter by file extension
        #[arg(short, long)]
        extension: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Generate a cited answer from the retrieved context
        #[arg(long)]
        answer: bool,

        /// Corpus root (defaults to the sole indexed corpus)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Corpus statistics
    Stats {
        /// Rows per histogram
        #[arg(short, long, default_value = "10")]
        limit: usize,

        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Largest units by byte size
    Largest {
        #[arg(short, long, default_value = "10")]
        limit: usize,

        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Most-linked targets by inbound link count
    MostLinked {
        #[arg(short, long, default_value = "10")]
        limit: usize,

        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Units with no inbound or outbound reference links
    Orphans {
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Stored detail for one unit
    Info {
        /// Unit path as indexed
        path: PathBuf,
    },

    /// Run a raw graph query (pass-through, unescaped)
    Query {
        #[arg(short, long)]
        query: String,
    },

    /// Export a graph snapshot for visualization
    Visualize {
        /// Export format
        #[arg(short = 'F', long, default_value = "cypher")]
        format: String,

        /// Output file (defaults to trellis_export.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rows per table in the snapshot
        #[arg(short, long, default_value = "500")]
        limit: usize,

        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Watch a corpus and synchronize changes incrementally
    Watch {
        /// Corpus root directory
        path: PathBuf,

        /// Skip the language-model extraction phase
        #[arg(long)]
        no_semantic: bool,
    },
}
