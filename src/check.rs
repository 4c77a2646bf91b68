//! End-to-end check orchestration.
//!
//! Sequences baseline retrieval, head-layout extraction, the diff engine,
//! location resolution and optional on-chain annotation, then renders the
//! pass/fail verdict. All collaborators come in through their seams so the
//! whole flow is testable with stubs, and the engine itself only ever sees
//! its documented [`DiffOptions`] — no ambient configuration.

use crate::artifact::{fetch_with_retry, BaselineError, BaselineStore, RetryPolicy};
use crate::compiler::{CompilerError, LayoutCompiler};
use crate::diff::{diff_layouts, DiffKind, DiffOptions, Severity};
use crate::layout::{parse_layout, MalformedLayoutError};
use crate::onchain::{annotate_removals, StorageReader, DEFAULT_EVIDENCE_TIMEOUT};
use crate::source::{resolve_diff, FormattedDiff, SourceIndex, SourceLocationNotFoundError};

use alloy_primitives::Address;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Everything one check invocation needs, passed explicitly.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Fully qualified contract identifier handed to the build tool,
    /// e.g. `src/Vault.sol:Vault`.
    pub contract: String,
    /// Head source file of the contract, for location resolution.
    pub source_path: PathBuf,
    /// Key the base snapshot was published under.
    pub baseline_key: String,
    /// Report removed variables as fatal findings.
    pub check_removals: bool,
    /// Deployed contract address; together with a configured reader this
    /// enables on-chain removal evidence.
    pub address: Option<Address>,
    /// Bounds for baseline polling.
    pub retry: RetryPolicy,
    /// Bound on on-chain evidence reads.
    pub evidence_timeout: Duration,
}

impl CheckConfig {
    /// Minimal config for a contract with default bounds.
    pub fn new(
        contract: impl Into<String>,
        source_path: impl Into<PathBuf>,
        baseline_key: impl Into<String>,
    ) -> Self {
        Self {
            contract: contract.into(),
            source_path: source_path.into(),
            baseline_key: baseline_key.into(),
            check_removals: false,
            address: None,
            retry: RetryPolicy::default(),
            evidence_timeout: DEFAULT_EVIDENCE_TIMEOUT,
        }
    }
}

/// A check invocation aborted before producing a verdict.
///
/// Findings never travel this path; they are data in [`CheckReport`].
#[derive(Debug, Error)]
pub enum CheckError {
    /// Baseline snapshot could not be retrieved.
    #[error(transparent)]
    Baseline(#[from] BaselineError),

    /// Head layout extraction failed.
    #[error(transparent)]
    Compiler(#[from] CompilerError),

    /// Base snapshot violates the layout contract.
    #[error("base layout: {0}")]
    MalformedBase(#[source] MalformedLayoutError),

    /// Head snapshot violates the layout contract.
    #[error("head layout: {0}")]
    MalformedHead(#[source] MalformedLayoutError),

    /// Head source file could not be read.
    #[error("failed to read head source {path}: {source}")]
    SourceIo {
        /// Path that failed
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Layout and head source disagree — a bug-level inconsistency, not a
    /// storage-safety finding.
    #[error(transparent)]
    Location(#[from] SourceLocationNotFoundError),
}

/// Outcome of a full check: every surfaced finding, resolved and annotated,
/// plus the verdict.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// Contract the check ran against.
    pub contract: String,
    /// Resolved findings in diff order.
    pub diffs: Vec<FormattedDiff>,
    /// Whether the layout is safe for an in-place upgrade.
    pub passed: bool,
}

impl CheckReport {
    /// Number of findings at the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.diffs.iter().filter(|d| d.severity == severity).count()
    }
}

/// Run one full storage-layout check.
///
/// The run fails (`passed == false`) iff an error-severity finding is
/// surfaced, or removals are checked and one is found. Aborts with
/// [`CheckError`] only on unusable inputs or internal inconsistency.
pub async fn run_check(
    config: &CheckConfig,
    compiler: &dyn LayoutCompiler,
    store: &dyn BaselineStore,
    reader: Option<&dyn StorageReader>,
) -> Result<CheckReport, CheckError> {
    info!(
        contract = %config.contract,
        key = %config.baseline_key,
        check_removals = config.check_removals,
        "checking storage layout"
    );

    let base_raw = fetch_with_retry(store, &config.baseline_key, &config.retry).await?;
    let head_raw = compiler.storage_layout(&config.contract).await?;

    let base =
        parse_layout(&String::from_utf8_lossy(&base_raw)).map_err(CheckError::MalformedBase)?;
    let head = parse_layout(&head_raw).map_err(CheckError::MalformedHead)?;
    debug!(base_vars = base.len(), head_vars = head.len(), "layouts parsed");

    let options = DiffOptions {
        check_removals: config.check_removals,
    };
    let mut diff = diff_layouts(&base, &head, options);
    debug!(
        surfaced = diff.records.len(),
        suppressed = diff.suppressed_removals.len(),
        "layout diff computed"
    );

    if let (Some(address), Some(reader)) = (config.address, reader) {
        annotate_removals(&mut diff.records, reader, address, config.evidence_timeout).await;
        // Unsurfaced removals still get their evidence logged; removal
        // safety is informative even when not fatal.
        annotate_removals(
            &mut diff.suppressed_removals,
            reader,
            address,
            config.evidence_timeout,
        )
        .await;
        for record in &diff.suppressed_removals {
            if let Some(word) = record.on_chain_evidence {
                debug!(
                    variable = %record.name,
                    %word,
                    "removed variable not reported (removal checking off)"
                );
            }
        }
    }

    let source = tokio::fs::read_to_string(&config.source_path)
        .await
        .map_err(|source| CheckError::SourceIo {
            path: config.source_path.clone(),
            source,
        })?;
    let index = SourceIndex::parse(&source);

    let mut diffs = Vec::with_capacity(diff.records.len());
    for record in &diff.records {
        diffs.push(resolve_diff(&index, record)?);
    }

    let unsafe_change = diffs.iter().any(|d| d.severity == Severity::Error)
        || (config.check_removals
            && diffs.iter().any(|d| d.kind == DiffKind::VariableRemoved));

    Ok(CheckReport {
        contract: config.contract.clone(),
        diffs,
        passed: !unsafe_change,
    })
}
