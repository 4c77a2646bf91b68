//! Storage-layout diff engine.
//!
//! Aligns a base and a head [`StorageLayout`] and emits typed diff records,
//! each anchored to the variables involved on both sides. The engine is a
//! pure synchronous function of its two inputs: no I/O, no globals, no
//! suspension points, so every record can be resolved and annotated
//! independently afterwards.
//!
//! Alignment is two-pass:
//! 1. match by name — same name, different type signature is a type change;
//!    same name and type at a different `(slot, offset)` is a slot change.
//! 2. match the remainder by `(slot, offset, type)` — a same-position,
//!    same-type variable under a new name is a rename, never breaking on its
//!    own since the encoding is unchanged.
//!
//! Whatever survives both passes is a genuine addition (head side) or
//! removal (base side). Comparing `(slot, offset)` pairs rather than array
//! position is what makes "appended at the end" safe and "inserted in the
//! middle" unsafe: an insertion shifts every later variable's slot and
//! surfaces as slot changes on the shifted names.

pub mod policy;

pub use policy::Severity;

use crate::layout::{StorageLayout, StorageVariable};
use alloy_primitives::B256;
use serde::Serialize;
use std::collections::HashMap;

// ── Diff records ───────────────────────────────────────────────────

/// Classification of one detected layout discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// New variable absent from the base layout.
    VariableAdded,
    /// Base variable with no counterpart in the head layout.
    VariableRemoved,
    /// Same slot, offset and type under a different name.
    VariableRenamed,
    /// Same name, different type signature.
    TypeChanged,
    /// Same name and type at a different slot or offset.
    SlotChanged,
}

/// One discrepancy between a base and a head layout.
///
/// Immutable once produced, except for the on-chain evidence attached by the
/// removal verifier. Rename and type-change counterparts are carried by the
/// `base` / `head` sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRecord {
    /// What kind of change this is.
    pub kind: DiffKind,
    /// Name the record is reported under: the head-side name when the
    /// variable still exists, the base-side name for pure removals.
    pub name: String,
    /// The variable as declared in the base layout. Absent for additions.
    pub base: Option<StorageVariable>,
    /// The variable as declared in the head layout. Absent for removals.
    pub head: Option<StorageVariable>,
    /// Raw word deployed at the affected slot, present only when the
    /// on-chain verifier ran.
    pub on_chain_evidence: Option<B256>,
}

impl DiffRecord {
    fn changed(kind: DiffKind, base: &StorageVariable, head: &StorageVariable) -> Self {
        Self {
            kind,
            name: head.name.clone(),
            base: Some(base.clone()),
            head: Some(head.clone()),
            on_chain_evidence: None,
        }
    }

    fn added(head: &StorageVariable) -> Self {
        Self {
            kind: DiffKind::VariableAdded,
            name: head.name.clone(),
            base: None,
            head: Some(head.clone()),
            on_chain_evidence: None,
        }
    }

    fn removed(base: &StorageVariable) -> Self {
        Self {
            kind: DiffKind::VariableRemoved,
            name: base.name.clone(),
            base: Some(base.clone()),
            head: None,
            on_chain_evidence: None,
        }
    }

    /// Default severity under the reporting policy.
    pub fn severity(&self) -> Severity {
        policy::severity(self.kind)
    }
}

// ── Engine ─────────────────────────────────────────────────────────

/// Diff engine options.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Surface `VariableRemoved` records in the diff output. When off,
    /// removals are still computed but held back in
    /// [`LayoutDiff::suppressed_removals`].
    pub check_removals: bool,
}

/// Result of diffing two layouts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutDiff {
    /// Surfaced records: head declaration order, with removals appended in
    /// base declaration order.
    pub records: Vec<DiffRecord>,
    /// Removals computed but withheld because `check_removals` was off.
    /// Kept so the on-chain verifier can still annotate them.
    pub suppressed_removals: Vec<DiffRecord>,
}

impl LayoutDiff {
    /// Whether the surfaced diff is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Align `base` and `head` and classify every discrepancy.
///
/// O(n) in the number of variables: one hash map keyed by name, one keyed by
/// `(slot, offset, type)` over the remainder. When several unmatched base
/// variables could back the same rename (identical position and type, only
/// possible for zero-sized or identically-positioned structural types), the
/// lowest base declaration index wins, deterministically.
pub fn diff_layouts(base: &StorageLayout, head: &StorageLayout, options: DiffOptions) -> LayoutDiff {
    let base_vars = base.variables();
    let head_vars = head.variables();

    let by_name: HashMap<&str, usize> = base_vars
        .iter()
        .enumerate()
        .map(|(i, v)| (v.name.as_str(), i))
        .collect();

    let mut base_matched = vec![false; base_vars.len()];
    // One output cell per head variable keeps surfaced records in head
    // declaration order across both passes.
    let mut head_records: Vec<Option<DiffRecord>> = vec![None; head_vars.len()];
    let mut unmatched_head = Vec::new();

    // Pass 1: identity by name.
    for (h, var) in head_vars.iter().enumerate() {
        let Some(&b) = by_name.get(var.name.as_str()) else {
            unmatched_head.push(h);
            continue;
        };
        base_matched[b] = true;
        let prior = &base_vars[b];
        if prior.type_signature != var.type_signature {
            head_records[h] = Some(DiffRecord::changed(DiffKind::TypeChanged, prior, var));
        } else if prior.location() != var.location() {
            head_records[h] = Some(DiffRecord::changed(DiffKind::SlotChanged, prior, var));
        }
    }

    // Pass 2: rename recovery by (slot, offset, type) over the remainder.
    // Candidate indices are pushed in base order, so the front of each list
    // is the lowest-index tie-break winner.
    let mut by_position: HashMap<(u64, u8, &str), Vec<usize>> = HashMap::new();
    for (b, var) in base_vars.iter().enumerate() {
        if !base_matched[b] {
            by_position
                .entry((var.slot, var.offset, var.type_signature.as_str()))
                .or_default()
                .push(b);
        }
    }

    for h in unmatched_head {
        let var = &head_vars[h];
        let candidate = by_position
            .get_mut(&(var.slot, var.offset, var.type_signature.as_str()))
            .filter(|c| !c.is_empty())
            .map(|c| c.remove(0));
        head_records[h] = Some(match candidate {
            Some(b) => {
                base_matched[b] = true;
                DiffRecord::changed(DiffKind::VariableRenamed, &base_vars[b], var)
            }
            None => DiffRecord::added(var),
        });
    }

    let mut diff = LayoutDiff::default();
    diff.records.extend(head_records.into_iter().flatten());

    // Pure removals, in base declaration order.
    for (b, var) in base_vars.iter().enumerate() {
        if !base_matched[b] {
            let record = DiffRecord::removed(var);
            if options.check_removals {
                diff.records.push(record);
            } else {
                diff.suppressed_removals.push(record);
            }
        }
    }

    diff
}
