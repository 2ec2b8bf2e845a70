//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// JupyterHub stress test.
///
/// Creates fake users and notebook servers in batches against a hub API
/// endpoint, waits for each server to be ready, and tears everything down
/// again unless told to keep it. An admin API token is required and may be
/// given via the JUPYTERHUB_API_TOKEN environment variable; likewise the
/// endpoint via JUPYTERHUB_ENDPOINT.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Enable verbose (debug) logging, which includes API response times
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Redirect logging to a file (--log-to-file=FILEPATH). Without a value
    /// a timestamp-based log file under /tmp is created; an existing file is
    /// overwritten.
    #[arg(
        long,
        value_name = "FILEPATH",
        num_args = 0..=1,
        require_equals = true,
        global = true
    )]
    pub log_to_file: Option<Option<PathBuf>>,

    /// The target hub API endpoint, e.g. http://localhost:8000/hub/api.
    /// Can also be read from the JUPYTERHUB_ENDPOINT environment variable.
    #[arg(short, long, value_name = "URL", global = true)]
    pub endpoint: Option<String>,

    /// Hub admin API token (must belong to an admin user). Can also be
    /// read from the JUPYTERHUB_API_TOKEN environment variable.
    #[arg(short, long, value_name = "TOKEN", global = true)]
    pub token: Option<String>,

    /// Do not actually make API requests
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create users and servers in batches, wait for readiness, then tear
    /// down (unless --keep)
    Run {
        /// Number of users/servers to create
        #[arg(short, long, value_name = "N")]
        count: Option<usize>,

        /// Batch size for user creation and the stop worker pool
        #[arg(short, long, value_name = "N")]
        batch_size: Option<usize>,

        /// Retain the created users/servers for steady-state profiling.
        /// Run with --keep repeatedly to build on an existing set.
        #[arg(short, long)]
        keep: bool,
    },

    /// Send sustained activity heartbeats from a pool of workers while
    /// probing request latency
    Activity {
        /// Number of users to spread across the workers
        #[arg(short, long, value_name = "N")]
        count: Option<usize>,

        /// Number of concurrent activity workers
        #[arg(short, long, value_name = "N")]
        workers: Option<usize>,

        /// Retain the users once the simulation finishes
        #[arg(short, long)]
        keep: bool,
    },

    /// Delete all stress-test users from the hub
    Purge,
}
