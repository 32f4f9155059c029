use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "visited-domains",
    about = "Record visited links by timestamp and list the domains seen in a time window",
    version,
    long_about = None
)]
pub struct Args {
    /// SQLite database holding the visit buckets
    #[arg(long, env = "VISITED_DOMAINS_DB", default_value = "visited_domains.db")]
    pub database: PathBuf,

    /// Keep visits in process memory instead of the database
    #[arg(long)]
    pub in_memory: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Number of worker threads for domain extraction
    #[arg(short, long)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API
    Serve {
        /// Address to bind (host:port)
        #[arg(long, env = "VISITED_DOMAINS_BIND", default_value = "127.0.0.1:8000")]
        bind: String,
    },

    /// Record links as visited now
    Record {
        #[arg(required = true)]
        links: Vec<String>,
    },

    /// List unique domains visited between two Unix timestamps (inclusive)
    Domains {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Redact domain names for privacy
        #[arg(long)]
        redact: bool,
    },
}
