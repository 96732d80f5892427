//! CLI argument definitions.

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

/// Portfolio sentiment runner: aggregates classified news per holding and
/// classifies each user's portfolio risk
#[derive(Parser, Debug)]
#[command(name = "sentiment-runner")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "portfolios"])))]
pub struct Cli {
    /// JSON run file with users, holdings and classified articles
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// CSV of email,ticker,weight rows
    #[arg(short, long, requires = "articles")]
    pub portfolios: Option<PathBuf>,

    /// JSON array of classified articles shared by every CSV portfolio
    #[arg(short, long)]
    pub articles: Option<PathBuf>,

    /// Write the JSON summary here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Reference time (RFC 3339) for recency weighting; defaults to the run
    /// file's `as_of`, then to now
    #[arg(long)]
    pub as_of: Option<String>,

    /// Compute and store only, skip report delivery
    #[arg(long)]
    pub no_deliver: bool,

    /// SQLite history database, overrides DATABASE_URL
    #[arg(long)]
    pub database_url: Option<String>,
}
