//! Statement splitter - migration text to executable statements
//!
//! This is a textual heuristic, not a SQL parser. Full-line `--` comments are
//! dropped and the rest is cut at every `;`. A `;` or `--` inside a string
//! literal, or a procedure body containing `;`, is split incorrectly;
//! migrations must be authored without them.

/// Split migration text into statements, in file order
pub fn split_statements(raw_text: &str) -> Vec<String> {
    let cleaned = raw_text
        .split('\n')
        .filter(|line| !line.trim().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    cleaned
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `statement` opens, commits or aborts a transaction
///
/// Looks at the leading keyword only: `BEGIN`, `START TRANSACTION`, `COMMIT`,
/// `END`, `ROLLBACK`, `ABORT`.
pub fn is_transaction_control(statement: &str) -> bool {
    let mut words = statement
        .split(|c: char| c.is_whitespace() || c == ';')
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_uppercase);

    match words.next().as_deref() {
        Some("BEGIN" | "COMMIT" | "END" | "ROLLBACK" | "ABORT") => true,
        Some("START") => words.next().as_deref() == Some("TRANSACTION"),
        _ => false,
    }
}
