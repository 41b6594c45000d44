use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use spool_types::Category;

#[derive(Parser)]
#[command(
    name = "spool",
    about = "Inspect and load a transactional RDF string pool",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Pool configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty pool and commit its first generation
    Init(InitArgs),
    /// Show generations, log size and blank counter
    Info(InfoArgs),
    /// Store values, printing their ids, and commit
    Put(PutArgs),
    /// Look up values by id
    Get(GetArgs),
    /// Look up the id of a value
    Find(FindArgs),
    /// List ids and values in index order
    Range(RangeArgs),
    /// Allocate blank node ids and commit
    Blank(BlankArgs),
}

#[derive(Args)]
pub struct InitArgs {
    pub path: PathBuf,
    /// Phase number to start from
    #[arg(long, default_value = "0")]
    pub phase: u32,
}

#[derive(Args)]
pub struct InfoArgs {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct PutArgs {
    pub path: PathBuf,
    /// Values in encoded form: <uri>, "text", "text"@lang, "text"^^<datatype>
    #[arg(required = true)]
    pub values: Vec<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub path: PathBuf,
    #[arg(required = true)]
    pub ids: Vec<u64>,
    /// Also print the stored payload bytes as hex
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args)]
pub struct FindArgs {
    pub path: PathBuf,
    pub value: String,
}

#[derive(Args)]
pub struct RangeArgs {
    pub path: PathBuf,
    /// uri, literal or typed
    #[arg(long)]
    pub category: Option<Category>,
    /// Datatype URI (typed literals only)
    #[arg(long)]
    pub datatype: Option<String>,
    #[arg(long)]
    pub low: Option<String>,
    #[arg(long)]
    pub high: Option<String>,
    #[arg(long)]
    pub exclusive_low: bool,
    #[arg(long)]
    pub exclusive_high: bool,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct BlankArgs {
    pub path: PathBuf,
    #[arg(short = 'n', long, default_value = "1")]
    pub count: usize,
}
