use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the storage layout checker
#[derive(Parser, Debug)]
#[command(name = "slotguard", about = "Storage-layout upgrade safety checker")]
pub struct Cli {
    /// Fully qualified contract to check, e.g. `src/Vault.sol:Vault`
    #[arg(long)]
    pub contract: String,

    /// Path to the head source file of the contract
    #[arg(long)]
    pub source: PathBuf,

    /// Foundry project root the build tool runs in
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Baseline snapshot location: a snapshot directory or an HTTP base URL
    #[arg(long)]
    pub baseline: String,

    /// Key the base snapshot was published under.
    /// Defaults to the lowercased contract name.
    #[arg(long)]
    pub baseline_key: Option<String>,

    /// Treat removed variables as fatal findings
    #[arg(long)]
    pub check_removals: bool,

    /// Deployed contract address. Together with --rpc-url enables on-chain
    /// removal evidence.
    #[arg(long)]
    pub address: Option<String>,

    /// Execution-layer RPC endpoint for evidence reads.
    /// Can also be set via the RPC_URL environment variable.
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Maximum baseline polling attempts
    #[arg(long, default_value = "10")]
    pub retry_attempts: u32,

    /// Delay between baseline polling attempts, in seconds
    #[arg(long, default_value = "5")]
    pub retry_delay: u64,

    /// Wall-clock cap for baseline polling, in seconds
    #[arg(long, default_value = "120")]
    pub retry_max_wait: u64,

    /// Timeout for on-chain evidence reads, in seconds
    #[arg(long, default_value = "10")]
    pub evidence_timeout: u64,

    /// Emit the report as JSON instead of human-readable output.
    /// Useful for feeding an annotation layer in CI.
    #[arg(long)]
    pub json: bool,
}
