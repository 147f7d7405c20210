//! shipbin - install a prebuilt release binary from a postinstall hook
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Run from a package's `postinstall` script. Works out the host platform,
//! downloads the matching `.tar.gz` from the project's GitHub release,
//! verifies it against the release's checksum manifest and places the
//! executable at the package's `bin` path.
//!
//! Flags fall back to environment variables, then to `package.json`.

pub mod config;
pub mod ops;

use std::path::PathBuf;

use clap::{Args, Parser};
use shipbin_core::ChecksumPolicy;
use shipbin_core::release::{DEFAULT_API_BASE, DEFAULT_DOWNLOAD_BASE};

#[derive(Debug, Parser)]
#[command(name = "shipbin")]
#[command(author, version, about = "shipbin - install a prebuilt release binary")]
pub struct Cli {
    /// Resolve the release and print what would be installed
    #[arg(long)]
    pub dry_run: bool,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print debug output (candidate misses, skipped manifest rows)
    #[arg(short, long)]
    pub verbose: bool,

    #[command(flatten)]
    pub install: InstallArgs,
}

#[derive(Debug, Clone, Args)]
pub struct InstallArgs {
    /// Directory containing package.json
    #[arg(long, env = "SHIPBIN_PACKAGE_DIR", default_value = ".")]
    pub package_dir: PathBuf,

    /// GitHub repository (owner/name)
    #[arg(long, env = "SHIPBIN_REPO")]
    pub repo: Option<String>,

    /// Release version, or `latest`
    #[arg(long, env = "SHIPBIN_VERSION")]
    pub release: Option<String>,

    /// Base name of the release assets
    #[arg(long, env = "SHIPBIN_BINARY_NAME")]
    pub binary_name: Option<String>,

    /// Where to put the executable
    #[arg(long, env = "SHIPBIN_BIN_PATH")]
    pub bin_path: Option<PathBuf>,

    /// What to do when the archive cannot be verified: strict or permissive
    #[arg(long, env = "SHIPBIN_CHECKSUM_POLICY", default_value_t = ChecksumPolicy::Strict)]
    pub checksum_policy: ChecksumPolicy,

    /// Give up after this many seconds
    #[arg(long, env = "SHIPBIN_TIMEOUT_SECS", default_value_t = 300)]
    pub timeout_secs: u64,

    /// Release API endpoint
    #[arg(long, env = "SHIPBIN_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Release download host
    #[arg(long, env = "SHIPBIN_DOWNLOAD_BASE", default_value = DEFAULT_DOWNLOAD_BASE)]
    pub download_base: String,
}

/// Log filter for the verbosity flags; `RUST_LOG` wins when set.
pub fn default_log_level(quiet: bool, verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}
