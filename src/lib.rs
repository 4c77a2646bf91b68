//! # Slotguard — storage-layout upgrade safety checking
//!
//! Compares the storage layout of a contract's head revision against a base
//! snapshot from a prior run and reports every unsafe difference with
//! severity, human-readable explanation and a source anchor.
//!
//! ```text
//!   baseline artifact ──┐
//!                       ├─→ layout::parse_layout (×2) ─→ diff::diff_layouts
//!   forge inspect ──────┘                                      │
//!   head .sol ─→ source::SourceIndex ─────→ source::resolve_diff
//!                                                              │
//!   eth_getStorageAt (optional) ─→ onchain evidence ─→ check verdict
//! ```

pub mod artifact;
pub mod check;
pub mod cli;
pub mod compiler;
pub mod diff;
pub mod layout;
pub mod onchain;
pub mod output;
pub mod source;
