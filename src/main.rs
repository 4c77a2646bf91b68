use slotguard::artifact::{BaselineStore, FileStore, HttpStore, RetryPolicy};
use slotguard::check::{run_check, CheckConfig};
use slotguard::cli::Cli;
use slotguard::compiler::ForgeInspect;
use slotguard::onchain::{RpcStorageReader, StorageReader};
use slotguard::output;

use alloy_primitives::Address;
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Main entry point for the storage layout checker
#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize tracing (user-facing report goes through `output`)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    let address: Option<Address> = cli
        .address
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(|e| eyre::eyre!("invalid --address: {e}"))?;

    // On-chain evidence needs both an address and an endpoint; either alone
    // disables it.
    let reader: Option<Box<dyn StorageReader>> = match (&cli.rpc_url, address) {
        (Some(url), Some(_)) => Some(Box::new(RpcStorageReader::new(url)?)),
        _ => None,
    };

    // Baseline snapshots come from a directory or an HTTP object store
    let store: Box<dyn BaselineStore> =
        if cli.baseline.starts_with("http://") || cli.baseline.starts_with("https://") {
            Box::new(HttpStore::new(&cli.baseline))
        } else {
            Box::new(FileStore {
                dir: cli.baseline.clone().into(),
            })
        };

    let compiler = ForgeInspect::new(&cli.root);

    let config = CheckConfig {
        contract: cli.contract.clone(),
        source_path: cli.source.clone(),
        baseline_key: cli
            .baseline_key
            .clone()
            .unwrap_or_else(|| default_baseline_key(&cli.contract)),
        check_removals: cli.check_removals,
        address,
        retry: RetryPolicy {
            max_attempts: cli.retry_attempts,
            delay: Duration::from_secs(cli.retry_delay),
            max_wait: Duration::from_secs(cli.retry_max_wait),
        },
        evidence_timeout: Duration::from_secs(cli.evidence_timeout),
    };

    if !cli.json {
        output::print_banner(&cli.contract);
    }

    let report = run_check(&config, &compiler, store.as_ref(), reader.as_deref()).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if report.diffs.is_empty() {
            output::print_clean();
        }
        for diff in &report.diffs {
            output::print_diff(diff);
        }
        output::print_summary(&report);
    }

    // Unsafe layout is a finding, not an internal error: exit 1 without a
    // backtrace so CI surfaces the report itself.
    if !report.passed {
        std::process::exit(1);
    }
    Ok(())
}

/// Derive the snapshot key from the contract identifier:
/// `src/Vault.sol:Vault` → `vault`.
fn default_baseline_key(contract: &str) -> String {
    contract
        .rsplit(':')
        .next()
        .unwrap_or(contract)
        .to_ascii_lowercase()
}
