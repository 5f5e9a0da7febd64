// src/analyze.rs
//! Pipeline orchestration: normalize, classify, build, resolve. One call
//! analyzes one target method; the result is immutable.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::builder::CfgBuilder;
use crate::classify::classify_fragments;
use crate::edges::resolve_edges;
use crate::error::{CfgError, Result};
use crate::graph::CfgGraph;
use crate::methods::{line_of, MethodId, MethodTable};
use crate::normalize::normalize_body;

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub method: Option<String>,
    pub class: Option<String>,
    /// Expand in-file callees into the same graph with call/return edges.
    pub inline_calls: bool,
}

/// Analyzes one method of `source` into a control-flow graph.
///
/// With no target named, the first method of the first class is analyzed.
pub fn analyze(
    source: &str,
    target_method: Option<&str>,
    target_class: Option<&str>,
) -> Result<CfgGraph> {
    analyze_with_options(
        source,
        &AnalyzeOptions {
            method: target_method.map(str::to_string),
            class: target_class.map(str::to_string),
            inline_calls: false,
        },
    )
}

pub fn analyze_with_options(source: &str, options: &AnalyzeOptions) -> Result<CfgGraph> {
    let table = MethodTable::scan(source);
    let target = table.resolve_target(options.method.as_deref(), options.class.as_deref())?;

    let mut builder = CfgBuilder::new(&table);
    build_into(&mut builder, &table, source, target);

    if options.inline_calls {
        // Worklist in first-reference order; the visited set terminates
        // mutual and self recursion.
        let mut visited: HashSet<MethodId> = HashSet::new();
        visited.insert(target);
        let mut cursor = 0;
        while cursor < builder.blocks().len() {
            let calls = builder.blocks()[cursor].calls.clone();
            for callee in calls {
                if visited.insert(callee) {
                    build_into(&mut builder, &table, source, callee);
                }
            }
            cursor += 1;
        }
    }

    let (blocks, scopes, mut diagnostics, partial) = builder.finish();
    let (edges, mut resolver_diags) = resolve_edges(&blocks, &scopes, target, options.inline_calls);
    diagnostics.append(&mut resolver_diags);

    Ok(CfgGraph {
        signature: table.get(target).signature(),
        target_method: target,
        blocks,
        scopes,
        edges,
        partial,
        diagnostics,
    })
}

/// Reads `path` and analyzes it.
pub fn analyze_file(path: &Path, options: &AnalyzeOptions) -> Result<CfgGraph> {
    let source = fs::read_to_string(path).map_err(|e| CfgError::Io {
        source: e,
        path: path.to_path_buf(),
    })?;
    analyze_with_options(&source, options)
}

fn build_into(builder: &mut CfgBuilder, table: &MethodTable, source: &str, method: MethodId) {
    let decl = table.get(method);
    let body = &source[decl.body_start..decl.body_end];
    let normalized = normalize_body(body, line_of(source, decl.body_start));
    if normalized.partial {
        builder.mark_partial();
    }
    builder.push_diagnostics(normalized.diagnostics);
    builder.add_method(method, classify_fragments(&normalized.fragments));
}
