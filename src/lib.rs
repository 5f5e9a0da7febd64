// src/lib.rs
//! Control-flow-graph construction for block-structured Java-style source.
//!
//! One method body in, an immutable graph of numbered statement blocks and
//! typed edges out, plus a canonical textual rendering of that graph.

pub mod analyze;
pub mod builder;
pub mod classify;
pub mod edges;
pub mod error;
pub mod export;
pub mod graph;
pub mod methods;
pub mod normalize;
pub mod scope;

pub use analyze::{analyze, analyze_file, analyze_with_options, AnalyzeOptions};
pub use classify::{LoopKind, StatementKind};
pub use error::{CfgError, Result};
pub use export::TextCfg;
pub use graph::{Block, BlockId, CfgGraph, Diagnostic, DiagnosticKind, Edge, EdgeKind};
pub use scope::{Scope, ScopeId, ScopeKind, Section};
