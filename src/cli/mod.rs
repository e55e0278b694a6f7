pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "freshet",
    version,
    about = "Adaptive RSS/Atom feed polling and indexing service"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler and HTTP API
    Serve,
    /// Subscribe to a feed and fetch it immediately
    Add { url: String },
    /// Unsubscribe from a feed
    Remove { url: String },
    /// List feeds, or recent items with --items
    List {
        #[arg(long)]
        items: bool,
    },
    /// Poll every due feed once
    Update,
    /// Full-text search over stored items
    Search { query: String },
    /// Subscribe to every URL in a newline-delimited file
    Import { path: PathBuf },
}
