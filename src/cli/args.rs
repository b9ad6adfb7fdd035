//! Command line argument parsing for the falx CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Falx - a term-indexed full-text search engine
#[derive(Parser, Debug, Clone)]
#[command(name = "falx")]
#[command(about = "A term-indexed full-text search engine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct FalxArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Directory holding the engine's index files
    #[arg(
        short = 'd',
        long,
        env = "FALX_DATA_DIR",
        default_value = "./falx-data",
        value_name = "DIR"
    )]
    pub data_dir: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl FalxArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a new search index
    #[command(name = "create-index")]
    CreateIndex(CreateIndexArgs),

    /// Delete an index and its storage files
    #[command(name = "delete-index")]
    DeleteIndex(DeleteIndexArgs),

    /// Bulk-add documents to an index from a file
    #[command(name = "add-documents")]
    AddDocuments(AddDocumentsArgs),

    /// Search an index
    Search(SearchArgs),

    /// Suggest indexed terms completing a prefix
    Suggest(SuggestArgs),

    /// Show index statistics
    Stats(StatsArgs),

    /// Rebuild an index's postings from its stored documents
    Rebuild(RebuildArgs),

    /// List indices
    List(ListArgs),
}

/// Arguments for creating an index
#[derive(Parser, Debug, Clone)]
pub struct CreateIndexArgs {
    /// Index name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Field mappings file (JSON)
    #[arg(short, long, value_name = "MAPPINGS_FILE")]
    pub mappings_file: Option<PathBuf>,

    /// Number of shards recorded in the index settings
    #[arg(long, default_value = "1")]
    pub shards: u32,
}

/// Arguments for deleting an index
#[derive(Parser, Debug, Clone)]
pub struct DeleteIndexArgs {
    /// Index name
    #[arg(value_name = "NAME")]
    pub name: String,
}

/// Arguments for bulk-adding documents
#[derive(Parser, Debug, Clone)]
pub struct AddDocumentsArgs {
    /// Index name
    #[arg(value_name = "INDEX")]
    pub index: String,

    /// Document file path (JSON array or JSONL)
    #[arg(value_name = "DOCUMENT_FILE")]
    pub document_file: PathBuf,

    /// Batch size for the bulk job
    #[arg(short, long, default_value = "1000")]
    pub batch_size: usize,

    /// Worker threads for the bulk job (default: one per CPU)
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Skip posting persistence after each batch
    #[arg(long)]
    pub no_persist: bool,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Index name
    #[arg(value_name = "INDEX")]
    pub index: String,

    /// Query: plain text (wildcards allowed) or a JSON query object
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of results to return
    #[arg(short, long, default_value = "10")]
    pub size: usize,

    /// Offset for pagination
    #[arg(long, default_value = "0")]
    pub from: usize,

    /// Fields to search in, `name^boost` weighting allowed (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub field: Vec<String>,

    /// Filter query (JSON)
    #[arg(long, value_name = "FILTER_JSON")]
    pub filter: Option<String>,

    /// Sort directive, e.g. `price:desc` or `_score`
    #[arg(long)]
    pub sort: Option<String>,

    /// Include highlights in results
    #[arg(long)]
    pub highlight: bool,

    /// Fields to collect terms facets for (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub facet: Vec<String>,
}

/// Arguments for term suggestions
#[derive(Parser, Debug, Clone)]
pub struct SuggestArgs {
    /// Index name
    #[arg(value_name = "INDEX")]
    pub index: String,

    /// Prefix to complete
    #[arg(value_name = "TEXT")]
    pub text: String,

    /// Field to scan (default: all fields)
    #[arg(long)]
    pub field: Option<String>,

    /// Maximum number of suggestions
    #[arg(short, long, default_value = "5")]
    pub size: usize,
}

/// Arguments for index statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Index name
    #[arg(value_name = "INDEX")]
    pub index: String,
}

/// Arguments for rebuilding postings
#[derive(Parser, Debug, Clone)]
pub struct RebuildArgs {
    /// Index name
    #[arg(value_name = "INDEX")]
    pub index: String,

    /// Only recount live documents, leaving postings untouched
    #[arg(long)]
    pub count_only: bool,
}

/// Arguments for listing indices
#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    /// Only list indices with this status (creating, open, closed, deleting)
    #[arg(long)]
    pub status: Option<String>,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
