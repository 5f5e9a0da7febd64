// src/normalize.rs
//! Source normalization: comment and blank-line stripping, brace-depth
//! tracking, and the raw statement fragments the classifier consumes.

use serde::Serialize;

use crate::graph::{Diagnostic, DiagnosticKind};

/// One non-empty, non-comment, non-pure-brace source line.
///
/// `depth` is the brace depth at the start of the line, relative to the start
/// of the method body (0 = directly in the body). Braces inside the line are
/// accounted for by the classifier when it splits compound fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub line: u32,
    pub text: String,
    pub depth: u32,
}

/// Result of normalizing one method body.
#[derive(Debug, Default)]
pub struct Normalized {
    pub fragments: Vec<Fragment>,
    pub diagnostics: Vec<Diagnostic>,
    /// True when the body's braces never balanced and the fragment list was
    /// truncated at the last balanced point.
    pub partial: bool,
}

/// Per-line scan result: cleaned text plus brace counts outside strings.
struct ScannedLine {
    text: String,
    opens: u32,
    closes: u32,
}

/// Strips comments and dead lines from a method body and emits ordered
/// fragments with their original line numbers.
///
/// `first_line` is the 1-based line number of the first body line in the
/// enclosing file, so fragments carry file-absolute line numbers.
#[must_use]
pub fn normalize_body(body: &str, first_line: u32) -> Normalized {
    let mut out = Normalized::default();
    let mut depth: i64 = 0;
    let mut in_block_comment = false;

    for (offset, raw) in body.lines().enumerate() {
        let line_no = first_line + offset as u32;
        let scanned = scan_line(raw, &mut in_block_comment);
        let text = scanned.text.trim().to_string();

        let opens = i64::from(scanned.opens);
        let closes = i64::from(scanned.closes);

        if depth + opens - closes < 0 {
            // More closers than the body ever opened: the remainder belongs
            // to some outer construct we cannot see. Truncate here.
            out.partial = true;
            out.diagnostics.push(Diagnostic {
                line: line_no,
                kind: DiagnosticKind::UnbalancedBraces,
                message: "unmatched closing brace; analysis truncated at the last balanced point"
                    .to_string(),
            });
            break;
        }

        if !text.is_empty() && !is_pure_brace(&text) {
            out.fragments.push(Fragment {
                line: line_no,
                text,
                depth: u32::try_from(depth).unwrap_or(0),
            });
        }

        depth += opens - closes;
    }

    if depth != 0 && !out.partial {
        out.partial = true;
        out.diagnostics.push(Diagnostic {
            line: first_line + body.lines().count().saturating_sub(1) as u32,
            kind: DiagnosticKind::UnbalancedBraces,
            message: format!("{depth} unclosed brace(s) at end of method body"),
        });
    }

    out
}

/// True for lines that carry nothing but braces and statement glue
/// (`{`, `}`, `};`). These contribute depth but never a block.
fn is_pure_brace(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| matches!(c, '{' | '}' | ';') || c.is_whitespace())
}

/// Removes `//` and `/* */` comments from one line, respecting quoted
/// strings (so `"//not-a-comment"` survives), and counts the braces that
/// remain outside string literals.
fn scan_line(raw: &str, in_block_comment: &mut bool) -> ScannedLine {
    let mut text = String::with_capacity(raw.len());
    let mut opens = 0u32;
    let mut closes = 0u32;

    let bytes: Vec<char> = raw.chars().collect();
    let mut i = 0;
    let mut quote: Option<char> = None;

    while i < bytes.len() {
        let c = bytes[i];

        if *in_block_comment {
            if c == '*' && bytes.get(i + 1) == Some(&'/') {
                *in_block_comment = false;
                i += 2;
                continue;
            }
            i += 1;
            continue;
        }

        match quote {
            Some(q) => {
                text.push(c);
                if c == '\\' {
                    // Escape: keep the next char verbatim.
                    if let Some(&next) = bytes.get(i + 1) {
                        text.push(next);
                        i += 2;
                        continue;
                    }
                } else if c == q {
                    quote = None;
                }
                i += 1;
            }
            None => {
                if c == '/' && bytes.get(i + 1) == Some(&'/') {
                    break; // Rest of the line is a comment.
                }
                if c == '/' && bytes.get(i + 1) == Some(&'*') {
                    *in_block_comment = true;
                    i += 2;
                    continue;
                }
                if c == '"' || c == '\'' {
                    quote = Some(c);
                } else if c == '{' {
                    opens += 1;
                } else if c == '}' {
                    closes += 1;
                }
                text.push(c);
                i += 1;
            }
        }
    }

    ScannedLine { text, opens, closes }
}
