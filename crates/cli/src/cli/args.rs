pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vault")]
#[command(about = "Read and write versioned append-only vaults")]
pub struct Args {
    /// Directory holding the vault
    #[arg(long, short, global = true, default_value = ".")]
    pub path: PathBuf,

    /// Per-operation timeout in milliseconds (defaults to the vault config)
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: crate::Command,
}
