// src/graph.rs
//! The immutable analysis result: blocks, scopes, typed edges, and the
//! diagnostics collected while recovering from malformed input.

use serde::Serialize;

use crate::classify::StatementKind;
use crate::methods::MethodId;
use crate::scope::{Scope, ScopeId, Section};

pub type BlockId = u32;

/// One atomic statement. Immutable once the graph is sealed; `id` is the
/// sole identity used by edges and the exporter.
#[derive(Debug, Clone, Serialize)]
pub struct Block {
    pub id: BlockId,
    pub kind: StatementKind,
    pub code: String,
    pub line: u32,
    pub owner_method: MethodId,
    /// Root-to-leaf chain of enclosing scopes; a construct header's path
    /// includes its own scope as the last element.
    pub scope_path: Vec<ScopeId>,
    /// Immediate enclosing scope and section, `None` at method top level.
    pub home: Option<(ScopeId, Section)>,
    /// In-file methods referenced by call sites in `code`.
    pub calls: Vec<MethodId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeKind {
    Sequential,
    BranchTrue(String),
    BranchFalse(String),
    LoopBack,
    Continue,
    BreakExit,
    CaseMatch(String),
    DefaultCase,
    Exception,
    Finally,
    Call,
    Return,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub from: BlockId,
    pub to: BlockId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    UnbalancedBraces,
    UnknownFragment,
    UnsupportedConstruct,
}

/// A recovered (non-fatal) analysis condition, attributed to a source line.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub line: u32,
    pub kind: DiagnosticKind,
    pub message: String,
}

/// The control-flow graph of one target method (plus inlined callees when
/// call expansion is enabled).
#[derive(Debug, Serialize)]
pub struct CfgGraph {
    /// `<Class>.<method>()` of the analysis target.
    pub signature: String,
    pub target_method: MethodId,
    pub blocks: Vec<Block>,
    pub scopes: Vec<Scope>,
    pub edges: Vec<Edge>,
    /// True when the input was malformed and the graph was truncated at the
    /// last balanced point.
    pub partial: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl CfgGraph {
    /// Id of the synthetic END block (one past the last real block).
    #[must_use]
    pub fn end_id(&self) -> BlockId {
        self.blocks.len() as BlockId
    }

    /// The entry block of the target method, if it has any blocks at all.
    #[must_use]
    pub fn entry(&self) -> Option<&Block> {
        self.blocks
            .iter()
            .find(|b| b.owner_method == self.target_method)
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id as usize]
    }

    #[must_use]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id as usize]
    }

    /// Which section of `ancestor` the block sits in, walking the home chain.
    /// `None` when `ancestor` does not enclose the block.
    #[must_use]
    pub fn section_within(&self, block: BlockId, ancestor: ScopeId) -> Option<Section> {
        let mut cursor = self.block(block).home;
        while let Some((scope, section)) = cursor {
            if scope == ancestor {
                return Some(section);
            }
            let s = self.scope(scope);
            cursor = s.parent.map(|p| (p, s.parent_section));
        }
        None
    }

    /// Renders the canonical text format.
    #[must_use]
    pub fn render(&self) -> String {
        crate::export::render(self)
    }
}
