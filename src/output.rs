//! Colored console output for check results.
//!
//! Replaces raw `println!` calls with structured, colored output.
//! Color scheme: blue+bold headers, cyan values, red errors,
//! yellow warnings, dimmed secondary text.

use crate::check::CheckReport;
use crate::diff::Severity;
use crate::source::FormattedDiff;
use colored::Colorize;

// ── Banner ─────────────────────────────────────────────────────────

/// Print the check banner with the contract under inspection.
pub fn print_banner(contract: &str) {
    println!();
    println!("{}", "=== Storage layout check ===".blue().bold());
    println!("  Contract: {}", contract.cyan());
}

/// Print confirmation that the layout is unchanged.
pub fn print_clean() {
    println!(
        "  {} storage layout unchanged",
        "OK".green().bold()
    );
}

// ── Findings ───────────────────────────────────────────────────────

/// Print one resolved finding with its source anchor.
pub fn print_diff(diff: &FormattedDiff) {
    let tag = match diff.severity {
        Severity::Error => "ERROR".red().bold(),
        Severity::Warning => "WARNING".yellow().bold(),
    };
    println!("  {} {}: {}", tag, diff.title.bold(), diff.message);
    println!(
        "      {} line {}, column {} .. line {}, column {}",
        "at".dimmed(),
        diff.span.start.line.to_string().cyan(),
        diff.span.start.column.to_string().cyan(),
        diff.span.end.line.to_string().cyan(),
        diff.span.end.column.to_string().cyan(),
    );
}

// ── Verdict ────────────────────────────────────────────────────────

/// Print the closing summary and verdict.
pub fn print_summary(report: &CheckReport) {
    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warning);

    println!();
    println!(
        "  {} {} error(s), {} warning(s)",
        "Findings:".dimmed(),
        errors.to_string().cyan(),
        warnings.to_string().cyan(),
    );
    if report.passed {
        println!(
            "  {} storage layout is upgrade-safe",
            "PASS".green().bold()
        );
    } else {
        println!(
            "  {} unsafe storage layout changes detected",
            "FAIL".red().bold()
        );
    }
}
