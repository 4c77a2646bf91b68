//! Source location resolution for diff records.
//!
//! Maps each [`DiffRecord`] onto a span in the head contract source and
//! renders the human-readable message, so the annotation layer can anchor a
//! finding to the exact declaration it concerns. Pure removals have nothing
//! to point at in head source and fall back to the contract declaration span.
//!
//! [`SourceIndex`] is built by a comment-aware line scanner: it tracks brace
//! depth, records the contract declaration header at depth 0 and every
//! `;`-terminated statement at depth 1 (state variable declarations), and
//! skips nested constructs such as function bodies and struct definitions.

use crate::diff::{policy, DiffKind, DiffRecord, Severity};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Layout and head source disagree about a variable the engine asserts is
/// present. Internal-consistency violation, fatal; distinct from a
/// storage-safety finding.
#[derive(Debug, Error)]
#[error("layout reports variable `{name}` but the head source has no declaration for it")]
pub struct SourceLocationNotFoundError {
    /// Variable missing from the source index
    pub name: String,
}

// ── Spans ──────────────────────────────────────────────────────────

/// 1-based line/column position in the head source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    /// Line number, starting at 1.
    pub line: u32,
    /// Column number in characters, starting at 1.
    pub column: u32,
}

/// Span in the head source, `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceSpan {
    /// First position of the span.
    pub start: Position,
    /// Position one past the span.
    pub end: Position,
}

// ── Source index ───────────────────────────────────────────────────

/// Parsed view of the head contract source: the contract declaration span
/// plus one span per state variable declaration.
#[derive(Debug, Clone)]
pub struct SourceIndex {
    contract_span: SourceSpan,
    variables: HashMap<String, SourceSpan>,
}

impl SourceIndex {
    /// Scan Solidity source text and index declaration spans.
    ///
    /// The scanner is total: sources without a recognizable contract header
    /// index to the start of the file.
    pub fn parse(source: &str) -> Self {
        let stripped = strip_comments(source);

        let mut depth: i32 = 0;
        let mut contract_span = None;
        let mut variables: HashMap<String, SourceSpan> = HashMap::new();
        let mut statement = String::new();
        let mut statement_start: Option<Position> = None;

        for (row, line) in stripped.lines().enumerate() {
            let line_no = row as u32 + 1;
            let trimmed = line.trim();
            let opens = line.matches('{').count() as i32;
            let closes = line.matches('}').count() as i32;

            if depth == 0 && contract_span.is_none() {
                contract_span = contract_header_span(line, line_no);
            }

            if depth == 1 && !trimmed.is_empty() {
                if statement_start.is_none() {
                    let col = line.chars().take_while(|c| c.is_whitespace()).count() as u32 + 1;
                    statement_start = Some(Position {
                        line: line_no,
                        column: col,
                    });
                }
                statement.push_str(trimmed);
                statement.push(' ');

                if opens > 0 {
                    // A `{` at contract depth opens a function, struct, enum
                    // or modifier, never a variable declaration.
                    statement.clear();
                    statement_start = None;
                } else if let Some(semi) = line.chars().position(|c| c == ';') {
                    if let (Some(start), Some(name)) =
                        (statement_start, declaration_name(&statement))
                    {
                        let end = Position {
                            line: line_no,
                            column: semi as u32 + 2,
                        };
                        variables.entry(name).or_insert(SourceSpan { start, end });
                    }
                    statement.clear();
                    statement_start = None;
                }
            } else if depth != 1 {
                statement.clear();
                statement_start = None;
            }

            depth = (depth + opens - closes).max(0);
        }

        let fallback = SourceSpan {
            start: Position { line: 1, column: 1 },
            end: Position { line: 1, column: 1 },
        };
        Self {
            contract_span: contract_span.unwrap_or(fallback),
            variables,
        }
    }

    /// Span of the contract declaration header.
    pub fn contract_span(&self) -> SourceSpan {
        self.contract_span
    }

    /// Span of the named state variable's declaration, if indexed.
    pub fn variable_span(&self, name: &str) -> Option<SourceSpan> {
        self.variables.get(name).copied()
    }
}

/// Recognize a contract/library/interface declaration header line.
fn contract_header_span(line: &str, line_no: u32) -> Option<SourceSpan> {
    let trimmed = line.trim_start();
    let mut words = trimmed.split_whitespace();
    let first = words.next()?;
    let is_header = matches!(first, "contract" | "library" | "interface")
        || (first == "abstract" && words.next() == Some("contract"));
    if !is_header {
        return None;
    }
    let leading = (line.chars().count() - trimmed.chars().count()) as u32;
    Some(SourceSpan {
        start: Position {
            line: line_no,
            column: leading + 1,
        },
        end: Position {
            line: line_no,
            column: line.trim_end().chars().count() as u32 + 1,
        },
    })
}

/// Extract the declared identifier from a `;`-terminated statement, or
/// `None` when the statement is not a variable declaration.
fn declaration_name(statement: &str) -> Option<String> {
    const NOT_VARIABLES: &[&str] = &[
        "function",
        "event",
        "error",
        "modifier",
        "using",
        "constructor",
        "fallback",
        "receive",
        "emit",
        "return",
        "revert",
        "require",
        "assembly",
        "if",
        "else",
        "for",
        "while",
        "do",
        "unchecked",
        "delete",
    ];

    let head = statement.split(';').next()?;
    let head = before_assignment(head);
    let keyword = head.split_whitespace().next()?;
    if NOT_VARIABLES.contains(&keyword) {
        return None;
    }
    last_identifier(head)
}

/// Slice off an initializer, leaving the declaration part. `=>` (mapping
/// types) and comparison operators are not assignments.
fn before_assignment(s: &str) -> &str {
    let bytes = s.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'=' {
            continue;
        }
        let next = bytes.get(i + 1).copied();
        let prev = i.checked_sub(1).map(|p| bytes[p]);
        if next == Some(b'>') || next == Some(b'=') {
            continue;
        }
        if matches!(prev, Some(b'=') | Some(b'!') | Some(b'<') | Some(b'>')) {
            continue;
        }
        return &s[..i];
    }
    s
}

/// Last identifier token in a declaration head — the declared name.
fn last_identifier(s: &str) -> Option<String> {
    let mut last = None;
    let mut current = String::new();
    for c in s.chars() {
        if c.is_alphanumeric() || c == '_' || c == '$' {
            current.push(c);
        } else if !current.is_empty() {
            if !current.chars().next().is_some_and(|f| f.is_ascii_digit()) {
                last = Some(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if !current.is_empty() && !current.chars().next().is_some_and(|f| f.is_ascii_digit()) {
        last = Some(current);
    }
    last
}

/// Blank out comments and string contents, preserving line and column
/// positions so spans index into the original text.
fn strip_comments(source: &str) -> String {
    enum State {
        Code,
        Line,
        Block,
        Str(char),
    }

    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut state = State::Code;

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    state = State::Line;
                    out.push(' ');
                }
                '/' if chars.peek() == Some(&'*') => {
                    state = State::Block;
                    out.push(' ');
                }
                '"' | '\'' => {
                    state = State::Str(c);
                    out.push(c);
                }
                _ => out.push(c),
            },
            State::Line => {
                if c == '\n' {
                    state = State::Code;
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = State::Code;
                } else if c == '\n' {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::Str(quote) => {
                if c == quote {
                    state = State::Code;
                    out.push(c);
                } else if c == '\\' {
                    chars.next();
                    out.push_str("  ");
                } else if c == '\n' {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
        }
    }
    out
}

// ── Resolution ─────────────────────────────────────────────────────

/// Fully resolved, display-ready diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedDiff {
    /// Machine-readable change classification.
    pub kind: DiffKind,
    /// Reporting severity under the policy.
    pub severity: Severity,
    /// Display title.
    pub title: &'static str,
    /// Human-readable explanation.
    pub message: String,
    /// Source span the finding is anchored to.
    pub span: SourceSpan,
}

/// Resolve a diff record against the head source index.
///
/// Head-present records anchor to the variable's declaration; pure removals
/// anchor to the contract declaration header. A head-present record whose
/// variable is missing from the index is a parser/layout mismatch and fails.
pub fn resolve_diff(
    index: &SourceIndex,
    record: &DiffRecord,
) -> Result<FormattedDiff, SourceLocationNotFoundError> {
    let span = if record.kind == DiffKind::VariableRemoved {
        index.contract_span()
    } else {
        index
            .variable_span(&record.name)
            .ok_or_else(|| SourceLocationNotFoundError {
                name: record.name.clone(),
            })?
    };

    Ok(FormattedDiff {
        kind: record.kind,
        severity: policy::severity(record.kind),
        title: policy::title(record.kind),
        message: describe(record),
        span,
    })
}

/// Render the human-readable message for a record.
fn describe(record: &DiffRecord) -> String {
    match (record.kind, record.base.as_ref(), record.head.as_ref()) {
        (DiffKind::VariableAdded, _, Some(head)) => format!(
            "`{}` ({}) was added at slot {}, offset {}",
            head.name, head.type_signature, head.slot, head.offset
        ),
        (DiffKind::VariableRemoved, Some(base), _) => {
            let mut message = format!(
                "`{}` ({}) was removed from slot {}, offset {}; \
                 state stored there would be orphaned by an upgrade",
                base.name, base.type_signature, base.slot, base.offset
            );
            if let Some(word) = record.on_chain_evidence {
                message.push_str(&format!(". Deployed word at slot {}: {word}", base.slot));
            }
            message
        }
        (DiffKind::VariableRenamed, Some(base), Some(head)) => format!(
            "`{}` was renamed to `{}`; slot {}, offset {} and type {} are unchanged",
            base.name, head.name, head.slot, head.offset, head.type_signature
        ),
        (DiffKind::TypeChanged, Some(base), Some(head)) => format!(
            "`{}` changed type from {} to {} at slot {}, offset {}; \
             existing state would be reinterpreted",
            head.name, base.type_signature, head.type_signature, head.slot, head.offset
        ),
        (DiffKind::SlotChanged, Some(base), Some(head)) => format!(
            "`{}` moved from slot {}, offset {} to slot {}, offset {}; \
             deployed state remains at the old location",
            head.name, base.slot, base.offset, head.slot, head.offset
        ),
        // A record always carries the sides its kind implies; this arm only
        // keeps the formatter total.
        _ => format!("`{}` changed", record.name),
    }
}
