//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand, ValueEnum};

/// Run saved HTTP requests and collections
#[derive(Parser, Debug, Clone)]
#[command(name = "bolt", version, about, long_about = None)]
pub struct Args {
    /// Verbose logging. Use -vv for debug output
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long = "log-format", value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    /// Directory holding environments, cookies and collections
    #[arg(long = "data-dir", env = "BOLT_DATA_DIR", value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Config file (default: <config dir>/bolt/config.toml)
    #[arg(long = "config", env = "BOLT_CONFIG", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a collection
    Run(RunArgs),

    /// Send a single request from a collection
    Send(SendArgs),

    /// Manage environments
    #[command(subcommand)]
    Env(EnvCommand),

    /// Inspect and delete stored cookies
    #[command(subcommand)]
    Cookies(CookiesCommand),

    /// Import collections from a JSON file
    Import {
        /// File with one collection or a list of collections
        file: PathBuf,
    },

    /// List stored collections
    Collections,

    /// Show recently sent requests
    History {
        /// Delete every entry
        #[arg(long = "clear", action = ArgAction::SetTrue)]
        clear: bool,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Collection name or 1-based position
    pub collection: String,

    /// Environment to run against (name or 1-based position)
    #[arg(short = 'e', long = "env", value_name = "ENV")]
    pub env: Option<String>,

    /// Number of iterations
    #[arg(short = 'n', long = "iterations", value_name = "N")]
    pub iterations: Option<u32>,

    /// Delay between requests in milliseconds
    #[arg(long = "delay", value_name = "MS")]
    pub delay: Option<u64>,

    /// Only run these requests (names or 1-based positions)
    #[arg(long = "only", value_name = "REQUEST", value_delimiter = ',')]
    pub only: Vec<String>,

    /// Request timeout in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Write the JSON export of the run to a file
    #[arg(long = "export", value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Write a JUnit XML report to a file
    #[arg(long = "junit", value_name = "FILE")]
    pub junit: Option<PathBuf>,

    /// Print script console output after the run
    #[arg(long = "console", action = ArgAction::SetTrue)]
    pub console: bool,

    /// Disable the progress bar
    #[arg(long = "no-progress", action = ArgAction::SetTrue)]
    pub no_progress: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SendArgs {
    /// Collection name or 1-based position
    pub collection: String,

    /// Request name or 1-based position
    pub request: String,

    /// Environment to use instead of the active one
    #[arg(short = 'e', long = "env", value_name = "ENV")]
    pub env: Option<String>,

    /// Request timeout in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print response headers
    #[arg(short = 'H', long = "headers", action = ArgAction::SetTrue)]
    pub headers: bool,

    /// Write the response body to a file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum EnvCommand {
    /// List environments
    List {
        /// Also print variables
        #[arg(long = "values", action = ArgAction::SetTrue)]
        values: bool,
    },

    /// Make an environment active
    Use {
        /// Name or 1-based position
        env: String,
    },

    /// Set a variable
    Set {
        key: String,
        value: String,
        /// Target environment (default: active)
        #[arg(short = 'e', long = "env", value_name = "ENV")]
        env: Option<String>,
    },

    /// Remove a variable
    Unset {
        key: String,
        #[arg(short = 'e', long = "env", value_name = "ENV")]
        env: Option<String>,
    },

    /// Create an empty environment
    Add { name: String },

    /// Delete an environment
    Remove { env: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CookiesCommand {
    /// List stored cookies
    List {
        /// Only cookies for this domain
        #[arg(long = "domain")]
        domain: Option<String>,
    },

    /// Delete one cookie, or every cookie of a domain
    Delete { domain: String, name: Option<String> },

    /// Delete every cookie
    Clear,
}

/// Log output format
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Plain text output (default)
    #[default]
    Text,
    /// JSON Lines format for parsing
    Json,
}
