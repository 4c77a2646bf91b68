//! Severity and display-title policy.
//!
//! A pure lookup from diff kind to reporting severity and title, kept apart
//! from the alignment logic so reporting policy can change without touching
//! the engine. The pass/fail decision and the console/JSON reports both read
//! from here.

use super::DiffKind;
use serde::Serialize;

/// Reporting severity of a diff record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Worth a reviewer's attention, does not fail the check on its own.
    Warning,
    /// Breaking for an in-place upgrade; fails the check.
    Error,
}

/// Default severity for a diff kind.
///
/// Removals only reach reporting when removal checking is on, at which point
/// they are fatal.
pub fn severity(kind: DiffKind) -> Severity {
    match kind {
        DiffKind::VariableAdded | DiffKind::VariableRenamed => Severity::Warning,
        DiffKind::VariableRemoved | DiffKind::TypeChanged | DiffKind::SlotChanged => {
            Severity::Error
        }
    }
}

/// Stable display title for a diff kind.
pub fn title(kind: DiffKind) -> &'static str {
    match kind {
        DiffKind::VariableAdded => "Storage variable added",
        DiffKind::VariableRemoved => "Storage variable removed",
        DiffKind::VariableRenamed => "Storage variable renamed",
        DiffKind::TypeChanged => "Storage variable type changed",
        DiffKind::SlotChanged => "Storage variable slot changed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaking_kinds_are_errors() {
        assert_eq!(severity(DiffKind::TypeChanged), Severity::Error);
        assert_eq!(severity(DiffKind::SlotChanged), Severity::Error);
        assert_eq!(severity(DiffKind::VariableRemoved), Severity::Error);
    }

    #[test]
    fn test_benign_kinds_are_warnings() {
        assert_eq!(severity(DiffKind::VariableAdded), Severity::Warning);
        assert_eq!(severity(DiffKind::VariableRenamed), Severity::Warning);
    }

    #[test]
    fn test_warning_orders_below_error() {
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_titles_are_distinct() {
        let all = [
            DiffKind::VariableAdded,
            DiffKind::VariableRemoved,
            DiffKind::VariableRenamed,
            DiffKind::TypeChanged,
            DiffKind::SlotChanged,
        ];
        for i in 0..all.len() {
            for j in (i + 1)..all.len() {
                assert_ne!(title(all[i]), title(all[j]));
            }
        }
    }
}
