// src/classify.rs
//! Statement classification: turns normalized fragments into typed
//! statements, splitting compound lines at brace boundaries and merging
//! continuation lines so a header is always its own statement.

use serde::Serialize;

use crate::normalize::Fragment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LoopKind {
    For,
    While,
    DoWhile,
}

/// The closed set of statement kinds a block can carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum StatementKind {
    Assignment,
    Expression,
    BranchHeader { condition: String },
    LoopHeader { kind: LoopKind, condition: String },
    SwitchHeader { condition: String },
    /// `value` is `None` for `default:`.
    CaseLabel { value: Option<String> },
    TryHeader,
    CatchHeader { exception_type: Option<String> },
    FinallyHeader,
    Return,
    Break,
    Continue,
    Throw,
}

impl StatementKind {
    /// Header kinds open (or extend) a compound construct and never take
    /// part in plain sequential fall-through.
    #[must_use]
    pub fn is_header(&self) -> bool {
        matches!(
            self,
            StatementKind::BranchHeader { .. }
                | StatementKind::LoopHeader { .. }
                | StatementKind::SwitchHeader { .. }
                | StatementKind::CaseLabel { .. }
                | StatementKind::TryHeader
                | StatementKind::CatchHeader { .. }
                | StatementKind::FinallyHeader
        )
    }

    /// Terminal statements transfer control; nothing falls through them.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatementKind::Return
                | StatementKind::Break
                | StatementKind::Continue
                | StatementKind::Throw
        )
    }
}

/// How the scope tracker should treat a classified statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Classified {
    /// A block-producing statement (plain or header).
    Statement(StatementKind),
    /// `} else if (...) {` — a branch header chained from the else branch of
    /// the preceding `if`, opening a new nested scope.
    ChainedBranch(StatementKind),
    /// Bare `} else {` — switches the open `if` scope to its else section.
    /// Produces no block.
    ElseMarker,
    /// `} while (cond);` — closes an open do-while scope and supplies its
    /// condition. Produces no block.
    DoWhileClose { condition: String },
}

/// One classified statement, positioned by source line and brace depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stmt {
    pub line: u32,
    pub depth: u32,
    pub text: String,
    pub kind: Classified,
    /// Set when classification had to fall back to an opaque expression.
    pub fallback: Option<FallbackReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FallbackReason {
    UnknownFragment,
    UnsupportedConstruct,
}

/// Classifies a method body's fragments into statements.
#[must_use]
pub fn classify_fragments(fragments: &[Fragment]) -> Vec<Stmt> {
    let pieces = split_pieces(fragments);
    let merged = merge_continuations(pieces);
    merged.into_iter().map(classify_piece).collect()
}

/// A fragment slice between brace boundaries.
#[derive(Debug, Clone)]
struct Piece {
    line: u32,
    depth: u32,
    text: String,
}

/// Splits each fragment at brace boundaries (outside string literals) so
/// that a control header ending in `{` and whatever follows it on the same
/// line become separate pieces at their own depths.
fn split_pieces(fragments: &[Fragment]) -> Vec<Piece> {
    let mut pieces = Vec::new();

    for frag in fragments {
        let mut depth = i64::from(frag.depth);
        let mut current = String::new();
        let mut current_depth = depth;
        let mut quote: Option<char> = None;
        let mut chars = frag.text.chars().peekable();

        let mut flush = |text: &mut String, at: i64, pieces: &mut Vec<Piece>| {
            let trimmed = text.trim();
            if !trimmed.is_empty() && !trimmed.chars().all(|c| matches!(c, '{' | '}' | ';')) {
                pieces.push(Piece {
                    line: frag.line,
                    depth: u32::try_from(at.max(0)).unwrap_or(0),
                    text: trimmed.to_string(),
                });
            }
            text.clear();
        };

        while let Some(c) = chars.next() {
            match quote {
                Some(q) => {
                    current.push(c);
                    if c == '\\' {
                        if let Some(&next) = chars.peek() {
                            current.push(next);
                            chars.next();
                        }
                    } else if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '"' | '\'' => {
                        quote = Some(c);
                        current.push(c);
                    }
                    '{' => {
                        // The opening brace stays with its header piece.
                        current.push('{');
                        flush(&mut current, current_depth, &mut pieces);
                        depth += 1;
                        current_depth = depth;
                    }
                    '}' => {
                        flush(&mut current, current_depth, &mut pieces);
                        depth -= 1;
                        // A closer starts a new piece one level out, so
                        // `} else {` / `} while (...)` keep their brace.
                        current.push('}');
                        current_depth = depth;
                    }
                    _ => current.push(c),
                },
            }
        }
        flush(&mut current, current_depth, &mut pieces);
    }

    pieces
}

/// Merges unterminated pieces with their successors so a statement split
/// across physical lines classifies as one statement, never two halves.
fn merge_continuations(pieces: Vec<Piece>) -> Vec<Piece> {
    let mut merged: Vec<Piece> = Vec::with_capacity(pieces.len());

    for piece in pieces {
        if let Some(prev) = merged.last_mut() {
            if needs_continuation(&prev.text) && !piece.text.starts_with('}') {
                prev.text.push(' ');
                prev.text.push_str(&piece.text);
                continue;
            }
        }
        merged.push(piece);
    }

    merged
}

fn needs_continuation(text: &str) -> bool {
    let t = text.trim_end();
    !(t.ends_with(';') || t.ends_with('{') || t.ends_with('}') || t.ends_with(':'))
}

fn classify_piece(piece: Piece) -> Stmt {
    let text = piece.text.clone();
    let t = text.trim_start_matches('}').trim().to_string();

    let (kind, fallback) = if text.starts_with("} else if") || t.starts_with("else if") {
        let cond = extract_condition(&t);
        (
            Classified::ChainedBranch(StatementKind::BranchHeader { condition: cond }),
            None,
        )
    } else if text.starts_with("} else") || starts_with_keyword(&t, "else") {
        (Classified::ElseMarker, None)
    } else if text.starts_with("} while") && t.ends_with(';') {
        (
            Classified::DoWhileClose {
                condition: extract_condition(&t),
            },
            None,
        )
    } else {
        classify_plain(&text, &t)
    };

    Stmt {
        line: piece.line,
        depth: piece.depth,
        text: t,
        kind,
        fallback,
    }
}

fn classify_plain(raw: &str, t: &str) -> (Classified, Option<FallbackReason>) {
    let stmt = |k| (Classified::Statement(k), None);

    if starts_with_keyword(t, "if") {
        return stmt(StatementKind::BranchHeader {
            condition: extract_condition(t),
        });
    }
    if starts_with_keyword(t, "for") {
        return stmt(StatementKind::LoopHeader {
            kind: LoopKind::For,
            condition: extract_condition(t),
        });
    }
    if starts_with_keyword(t, "while") {
        return stmt(StatementKind::LoopHeader {
            kind: LoopKind::While,
            condition: extract_condition(t),
        });
    }
    if starts_with_keyword(t, "do") {
        return stmt(StatementKind::LoopHeader {
            kind: LoopKind::DoWhile,
            condition: String::new(),
        });
    }
    if starts_with_keyword(t, "switch") {
        return stmt(StatementKind::SwitchHeader {
            condition: extract_condition(t),
        });
    }
    if starts_with_keyword(t, "case") {
        let value = t
            .strip_prefix("case")
            .map(|rest| rest.trim().trim_end_matches(':').trim().to_string())
            .filter(|v| !v.is_empty());
        if value.is_none() {
            return (
                Classified::Statement(StatementKind::Expression),
                Some(FallbackReason::UnknownFragment),
            );
        }
        return stmt(StatementKind::CaseLabel { value });
    }
    if t == "default:" || t.starts_with("default") && t.ends_with(':') {
        return stmt(StatementKind::CaseLabel { value: None });
    }
    if starts_with_keyword(t, "try") {
        return stmt(StatementKind::TryHeader);
    }
    if starts_with_keyword(t, "catch") {
        let exception_type = extract_exception_type(t);
        if exception_type.is_none() && t.contains('(') {
            return (
                Classified::Statement(StatementKind::CatchHeader { exception_type: None }),
                Some(FallbackReason::UnsupportedConstruct),
            );
        }
        return stmt(StatementKind::CatchHeader { exception_type });
    }
    if starts_with_keyword(t, "finally") {
        return stmt(StatementKind::FinallyHeader);
    }
    if starts_with_keyword(t, "return") {
        return stmt(StatementKind::Return);
    }
    if starts_with_keyword(t, "break") {
        return stmt(StatementKind::Break);
    }
    if starts_with_keyword(t, "continue") {
        return stmt(StatementKind::Continue);
    }
    if starts_with_keyword(t, "throw") {
        return stmt(StatementKind::Throw);
    }

    if raw.starts_with('}') {
        // A closer glued to something we do not recognize; classify what
        // remains as an opaque expression so no statement is lost.
        return (
            Classified::Statement(StatementKind::Expression),
            Some(FallbackReason::UnknownFragment),
        );
    }

    if is_assignment(t) {
        return stmt(StatementKind::Assignment);
    }
    stmt(StatementKind::Expression)
}

fn starts_with_keyword(t: &str, kw: &str) -> bool {
    t.strip_prefix(kw).is_some_and(|rest| {
        rest.is_empty() || rest.starts_with(|c: char| !c.is_alphanumeric() && c != '_')
    })
}

/// Assignment means a bare `=` that is not part of a comparison or
/// increment/decrement operator.
fn is_assignment(t: &str) -> bool {
    let bytes = t.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'=' {
            continue;
        }
        let prev = i.checked_sub(1).map(|p| bytes[p]);
        let next = bytes.get(i + 1).copied();
        let comparison = matches!(prev, Some(b'=' | b'!' | b'<' | b'>' | b'+' | b'-' | b'*' | b'/' | b'%' | b'&' | b'|' | b'^'))
            || next == Some(b'=');
        if !comparison {
            return true;
        }
    }
    false
}

/// The text inside the outermost parenthesis pair, handling nesting.
#[must_use]
pub fn extract_condition(t: &str) -> String {
    let Some(start) = t.find('(') else {
        return String::new();
    };
    let mut depth = 0u32;
    for (i, c) in t[start..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return t[start + 1..start + i].to_string();
                }
            }
            _ => {}
        }
    }
    String::new()
}

/// `catch (IOException e)` → `IOException`; multi-catch keeps the union:
/// `catch (A | B e)` → `A | B`.
fn extract_exception_type(t: &str) -> Option<String> {
    let inner = extract_condition(t);
    if inner.is_empty() {
        return None;
    }
    let mut tokens: Vec<&str> = inner.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }
    tokens.pop(); // variable name
    Some(tokens.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, depth: u32) -> Fragment {
        Fragment {
            line: 1,
            text: text.to_string(),
            depth,
        }
    }

    fn kinds(stmts: &[Stmt]) -> Vec<&Classified> {
        stmts.iter().map(|s| &s.kind).collect()
    }

    #[test]
    fn header_is_split_from_remainder() {
        let stmts = classify_fragments(&[frag("if (x > 0) { return 1;", 0)]);
        assert_eq!(stmts.len(), 2);
        assert_eq!(
            stmts[0].kind,
            Classified::Statement(StatementKind::BranchHeader {
                condition: "x > 0".to_string()
            })
        );
        assert_eq!(stmts[0].depth, 0);
        assert_eq!(stmts[1].kind, Classified::Statement(StatementKind::Return));
        assert_eq!(stmts[1].depth, 1);
    }

    #[test]
    fn single_line_if_else_splits_into_four() {
        let stmts = classify_fragments(&[frag("if (x) { a(); } else { b(); }", 0)]);
        assert_eq!(stmts.len(), 4);
        assert!(matches!(
            stmts[0].kind,
            Classified::Statement(StatementKind::BranchHeader { .. })
        ));
        assert_eq!(stmts[1].text, "a();");
        assert_eq!(stmts[2].kind, Classified::ElseMarker);
        assert_eq!(stmts[3].text, "b();");
        assert_eq!(stmts[3].depth, 1);
    }

    #[test]
    fn else_if_is_chained() {
        let stmts = classify_fragments(&[frag("} else if (y < 0) {", 0)]);
        assert_eq!(
            stmts[0].kind,
            Classified::ChainedBranch(StatementKind::BranchHeader {
                condition: "y < 0".to_string()
            })
        );
    }

    #[test]
    fn do_while_tail_closes() {
        let stmts = classify_fragments(&[frag("} while (i < n);", 0)]);
        assert_eq!(
            stmts[0].kind,
            Classified::DoWhileClose {
                condition: "i < n".to_string()
            }
        );
    }

    #[test]
    fn continuation_lines_merge() {
        let stmts = classify_fragments(&[frag("int total = a +", 0), frag("b;", 0)]);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].text, "int total = a + b;");
        assert_eq!(
            stmts[0].kind,
            Classified::Statement(StatementKind::Assignment)
        );
    }

    #[test]
    fn multi_line_condition_merges_into_header() {
        let stmts = classify_fragments(&[frag("if (a &&", 0), frag("b) {", 0)]);
        assert_eq!(stmts.len(), 1);
        assert_eq!(
            stmts[0].kind,
            Classified::Statement(StatementKind::BranchHeader {
                condition: "a && b".to_string()
            })
        );
    }

    #[test]
    fn comparison_is_expression_not_assignment() {
        let stmts = classify_fragments(&[frag("check(a == b);", 0)]);
        assert_eq!(
            stmts[0].kind,
            Classified::Statement(StatementKind::Expression)
        );
        let stmts = classify_fragments(&[frag("x += 2;", 0)]);
        assert_eq!(
            stmts[0].kind,
            Classified::Statement(StatementKind::Expression)
        );
    }

    #[test]
    fn case_and_default_labels() {
        let stmts = classify_fragments(&[frag("case 1:", 1), frag("default:", 1)]);
        assert_eq!(
            stmts[0].kind,
            Classified::Statement(StatementKind::CaseLabel {
                value: Some("1".to_string())
            })
        );
        assert_eq!(
            stmts[1].kind,
            Classified::Statement(StatementKind::CaseLabel { value: None })
        );
    }

    #[test]
    fn multi_catch_type_is_kept() {
        let stmts = classify_fragments(&[frag("} catch (IOException | SQLException e) {", 0)]);
        assert_eq!(
            stmts[0].kind,
            Classified::Statement(StatementKind::CatchHeader {
                exception_type: Some("IOException | SQLException".to_string())
            })
        );
    }

    #[test]
    fn unknown_construct_degrades_to_expression() {
        let stmts = classify_fragments(&[frag("} ->> garbage", 0)]);
        assert_eq!(
            stmts[0].kind,
            Classified::Statement(StatementKind::Expression)
        );
        assert_eq!(stmts[0].fallback, Some(FallbackReason::UnknownFragment));
    }
}
