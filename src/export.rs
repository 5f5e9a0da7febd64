// src/export.rs
//! Canonical text rendering of a graph, and the re-parser used to check the
//! rendering round-trips.
//!
//! The exact strings are load-bearing: downstream prompt builders consume
//! this format verbatim.

use std::sync::OnceLock;

use regex::Regex;

use crate::graph::{BlockId, CfgGraph, EdgeKind};

#[must_use]
pub fn render(graph: &CfgGraph) -> String {
    let end = graph.end_id();
    let mut out = String::new();

    out.push_str(&format!(
        "G describes a control flow graph of Method `{}`\n",
        graph.signature
    ));
    out.push_str("In this graph:\n");
    if let Some(entry) = graph.entry() {
        out.push_str(&format!(
            "Entry Point: Block {} represents code snippet: {}.\n",
            entry.id,
            clean(&entry.code)
        ));
    }
    out.push_str(&format!(
        "END Block: Block {end} represents code snippet: END.\n"
    ));

    for b in &graph.blocks {
        out.push_str(&format!(
            "Block {} represents code snippet: {}.\n",
            b.id,
            clean(&b.code)
        ));
    }
    out.push_str(&format!("Block {end} represents code snippet: END.\n"));

    let mut edges: Vec<_> = graph.edges.iter().collect();
    edges.sort_by_key(|e| (e.from, e.to));
    for e in edges {
        out.push_str(&format!(
            "Block {} {} Block {}.\n",
            e.from,
            edge_phrase(&e.kind),
            e.to
        ));
    }
    out
}

/// Block code is always rendered on one line.
fn clean(code: &str) -> String {
    code.replace('\n', "\\n")
}

fn edge_phrase(kind: &EdgeKind) -> String {
    match kind {
        EdgeKind::Sequential => "unconditional points to".to_string(),
        EdgeKind::LoopBack => "loop back to".to_string(),
        EdgeKind::Continue => "continue points to".to_string(),
        EdgeKind::BreakExit => "break exit points to".to_string(),
        EdgeKind::Call => "method call points to".to_string(),
        EdgeKind::Return => "method return points to".to_string(),
        EdgeKind::BranchTrue(c) => format!("match case \"{c}\" points to"),
        EdgeKind::BranchFalse(c) => format!("not match case \"{c}\" points to"),
        EdgeKind::CaseMatch(v) => format!("case match \"{v}\" points to"),
        EdgeKind::DefaultCase => "default case points to".to_string(),
        EdgeKind::Exception => "exception points to".to_string(),
        EdgeKind::Finally => "finally points to".to_string(),
    }
}

/// A rendering parsed back into blocks and edges. Used to check that export
/// is lossless with respect to graph structure.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TextCfg {
    pub signature: String,
    /// `(id, code)` in listing order, including the END block.
    pub blocks: Vec<(BlockId, String)>,
    /// `(from, verb phrase, to)` in listing order.
    pub edges: Vec<(BlockId, String, BlockId)>,
}

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^G describes a control flow graph of Method `(.+)`$")
            .expect("header pattern is valid")
    })
}

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Block (\d+) represents code snippet: (.*)\.$")
            .expect("block pattern is valid")
    })
}

fn edge_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Block (\d+) (.+? )(?:points )?to Block (\d+)\.$")
            .expect("edge pattern is valid")
    })
}

impl TextCfg {
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut out = TextCfg::default();
        for line in text.lines() {
            if let Some(caps) = header_re().captures(line) {
                out.signature = caps[1].to_string();
                continue;
            }
            if line.starts_with("Entry Point:") || line.starts_with("END Block:") {
                continue;
            }
            // Block lines first: snippet text may itself end in
            // "... to Block N" and must not read as an edge.
            if let Some(caps) = block_re().captures(line) {
                let id = caps[1].parse().unwrap_or(0);
                out.blocks.push((id, caps[2].to_string()));
                continue;
            }
            if let Some(caps) = edge_re().captures(line) {
                let from = caps[1].parse().unwrap_or(0);
                let to = caps[3].parse().unwrap_or(0);
                out.edges.push((from, caps[2].trim_end().to_string(), to));
            }
        }
        out
    }
}
