use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "rustdoc-search")]
#[command(about = "Search rustdoc index files by name or type signature", long_about = None)]
pub struct Cli {
    /// Configuration file (default: <config dir>/rustdoc-search/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Search index file; overrides the configuration and RUSTDOC_SEARCH_INDEX
    #[arg(long, global = true)]
    pub index: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve MCP over stdio (the default)
    Serve,
    /// Run one query and print the results
    Query {
        query: String,
        #[arg(short = 'c', long = "crate")]
        crate_name: Option<String>,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}
