//! External layout extraction.
//!
//! The head layout snapshot comes from the project's build tool. The checker
//! only depends on the [`LayoutCompiler`] seam; the bundled implementation
//! shells out to `forge inspect <contract> storage-layout --json` in the
//! project directory.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;
use tracing::debug;

/// Invoking the external build tool failed. Fatal: without a head snapshot
/// there is nothing to diff.
#[derive(Debug, Error)]
pub enum CompilerError {
    /// The tool binary could not be launched at all.
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        /// Binary that was invoked
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but reported failure.
    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        /// Binary that was invoked
        program: String,
        /// Process exit status
        status: ExitStatus,
        /// Captured standard error
        stderr: String,
    },

    /// The tool produced undecodable output.
    #[error("`{program}` produced non-UTF-8 output")]
    InvalidOutput {
        /// Binary that was invoked
        program: String,
    },
}

/// Produces the raw storage-layout description for a contract.
#[async_trait]
pub trait LayoutCompiler: Send + Sync {
    /// Emit the raw layout text for `contract` (e.g. `src/Vault.sol:Vault`).
    async fn storage_layout(&self, contract: &str) -> Result<String, CompilerError>;
}

/// `forge inspect` in a Foundry project directory.
#[derive(Debug, Clone)]
pub struct ForgeInspect {
    /// Project root the command runs in.
    pub root: PathBuf,
    /// Binary to invoke; `forge` unless overridden.
    pub program: String,
}

impl ForgeInspect {
    /// Inspect contracts of the Foundry project at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            program: "forge".to_string(),
        }
    }
}

#[async_trait]
impl LayoutCompiler for ForgeInspect {
    async fn storage_layout(&self, contract: &str) -> Result<String, CompilerError> {
        debug!(contract, root = %self.root.display(), "extracting head storage layout");

        let output = tokio::process::Command::new(&self.program)
            .arg("inspect")
            .arg(contract)
            .arg("storage-layout")
            .arg("--json")
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|source| CompilerError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CompilerError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| CompilerError::InvalidOutput {
            program: self.program.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_a_launch_error() {
        let compiler = ForgeInspect {
            root: PathBuf::from("."),
            program: "definitely-not-a-real-binary".to_string(),
        };
        let err = compiler.storage_layout("src/V.sol:V").await.unwrap_err();
        assert!(matches!(err, CompilerError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_captures_stdout_of_successful_run() {
        // `echo` stands in for the build tool and prints its arguments back.
        let compiler = ForgeInspect {
            root: PathBuf::from("."),
            program: "echo".to_string(),
        };
        let out = compiler.storage_layout("src/V.sol:V").await.unwrap();
        assert!(out.contains("inspect src/V.sol:V storage-layout"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        // `false` ignores its arguments and exits 1.
        let compiler = ForgeInspect {
            root: PathBuf::from("."),
            program: "false".to_string(),
        };
        let err = compiler.storage_layout("src/V.sol:V").await.unwrap_err();
        match err {
            CompilerError::Failed { status, .. } => assert!(!status.success()),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
