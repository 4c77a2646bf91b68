//! On-chain evidence for removal diagnostics.
//!
//! When a deployed address and a readable RPC endpoint are both configured,
//! the checker reads the 32-byte word currently stored at each removed
//! variable's slot and attaches it to the diagnostic. The evidence never
//! changes a finding's severity; a non-zero word simply confirms to the
//! reviewer that live state sits at the abandoned slot.
//!
//! Reads are issued concurrently, each bounded by the configured timeout.
//! Any transport failure or timeout degrades to "evidence omitted" — the
//! overall check never aborts on a network problem.

use crate::diff::{DiffKind, DiffRecord};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use futures_util::future::join_all;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default bound on a single batch of evidence reads.
pub const DEFAULT_EVIDENCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Reading a deployed storage word failed. Always recovered locally.
#[derive(Debug, Error)]
pub enum StorageReadError {
    /// Transport-level RPC failure.
    #[error("rpc transport error: {0}")]
    Transport(String),

    /// Endpoint returned something that is not a storage word.
    #[error("malformed storage word `{0}`")]
    MalformedWord(String),
}

/// Trait for reading a deployed contract's storage slots.
///
/// In production: [`RpcStorageReader`] against an execution-layer endpoint.
/// In tests: an in-memory map.
#[async_trait]
pub trait StorageReader: Send + Sync {
    /// Read the 32-byte word at `slot` of the contract at `address`.
    async fn read_storage(&self, address: Address, slot: U256) -> Result<B256, StorageReadError>;
}

// ── RPC implementation ─────────────────────────────────────────────

/// `eth_getStorageAt` over jsonrpsee's HTTP client.
pub struct RpcStorageReader {
    client: HttpClient,
}

impl RpcStorageReader {
    /// Connect to an execution-layer RPC endpoint.
    pub fn new(url: &str) -> Result<Self, StorageReadError> {
        let client = HttpClientBuilder::default()
            .build(url)
            .map_err(|e| StorageReadError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StorageReader for RpcStorageReader {
    async fn read_storage(&self, address: Address, slot: U256) -> Result<B256, StorageReadError> {
        let raw: String = self
            .client
            .request(
                "eth_getStorageAt",
                rpc_params![format!("{address}"), format!("{slot:#x}"), "latest"],
            )
            .await
            .map_err(|e| StorageReadError::Transport(e.to_string()))?;
        decode_word(&raw)
    }
}

/// Decode a hex storage word, tolerating missing left-padding.
fn decode_word(raw: &str) -> Result<B256, StorageReadError> {
    let stripped = raw.trim().trim_start_matches("0x");
    let padded = if stripped.len() % 2 == 1 {
        format!("0{stripped}")
    } else {
        stripped.to_string()
    };
    let bytes = hex::decode(&padded).map_err(|_| StorageReadError::MalformedWord(raw.to_string()))?;
    if bytes.len() > 32 {
        return Err(StorageReadError::MalformedWord(raw.to_string()));
    }
    Ok(B256::left_padding_from(&bytes))
}

// ── Annotation ─────────────────────────────────────────────────────

/// Attach the deployed storage word to every removal record in `records`.
///
/// One concurrent read per removal, each abandoned after `timeout`. A record
/// whose read fails or times out is left without evidence; completed reads
/// keep theirs. Severity is never touched here.
pub async fn annotate_removals(
    records: &mut [DiffRecord],
    reader: &dyn StorageReader,
    address: Address,
    timeout: Duration,
) {
    let targets: Vec<(usize, U256)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.kind == DiffKind::VariableRemoved)
        .filter_map(|(i, r)| r.base.as_ref().map(|v| (i, U256::from(v.slot))))
        .collect();
    if targets.is_empty() {
        return;
    }

    let reads = targets
        .iter()
        .map(|&(_, slot)| tokio::time::timeout(timeout, reader.read_storage(address, slot)));
    let results = join_all(reads).await;

    for ((index, slot), result) in targets.into_iter().zip(results) {
        match result {
            Ok(Ok(word)) => {
                debug!(%address, %slot, %word, "fetched deployed storage word");
                records[index].on_chain_evidence = Some(word);
            }
            Ok(Err(err)) => {
                warn!(%address, %slot, %err, "storage read failed; evidence omitted");
            }
            Err(_) => {
                warn!(%address, %slot, ?timeout, "storage read timed out; evidence omitted");
            }
        }
    }
}
