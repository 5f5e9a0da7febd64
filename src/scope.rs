// src/scope.rs
//! The scope tree: one node per compound construct, with parent links and
//! per-section block lists. Edge resolution walks this tree instead of
//! pattern-matching statement text.

use serde::Serialize;

use crate::classify::LoopKind;
use crate::graph::BlockId;

pub type ScopeId = u32;

/// Which branch of a compound construct a block sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Section {
    Body,
    Else,
    Catch(usize),
    Finally,
    Case(usize),
}

#[derive(Debug, Clone, Serialize)]
pub struct CatchClause {
    pub header: BlockId,
    pub exception_type: Option<String>,
    pub body: Vec<BlockId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinallyClause {
    pub header: BlockId,
    pub body: Vec<BlockId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseClause {
    pub label: BlockId,
    /// `None` for the `default:` label.
    pub value: Option<String>,
    pub body: Vec<BlockId>,
}

#[derive(Debug, Clone, Serialize)]
pub enum ScopeKind {
    If {
        /// First entry is a chained `else if` header when the else branch is
        /// itself a branch.
        else_blocks: Vec<BlockId>,
    },
    Loop {
        kind: LoopKind,
    },
    Try {
        catches: Vec<CatchClause>,
        finally: Option<FinallyClause>,
    },
    Switch {
        cases: Vec<CaseClause>,
    },
}

/// One compound construct instance. Section headers (`catch`, `finally`,
/// `case`) live in their clause records, not in any body list.
#[derive(Debug, Clone, Serialize)]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    /// Which section of the parent this construct lexically sits in.
    pub parent_section: Section,
    pub header_block: BlockId,
    pub kind: ScopeKind,
    pub body_blocks: Vec<BlockId>,
}

impl Scope {
    /// `break` targets the nearest loop or switch.
    #[must_use]
    pub fn is_breakable(&self) -> bool {
        matches!(self.kind, ScopeKind::Loop { .. } | ScopeKind::Switch { .. })
    }

    #[must_use]
    pub fn is_loop(&self) -> bool {
        matches!(self.kind, ScopeKind::Loop { .. })
    }

    /// The blocks of one section, in source order.
    #[must_use]
    pub fn section_blocks(&self, section: Section) -> &[BlockId] {
        match (section, &self.kind) {
            (Section::Body, _) => &self.body_blocks,
            (Section::Else, ScopeKind::If { else_blocks }) => else_blocks,
            (Section::Catch(i), ScopeKind::Try { catches, .. }) => {
                catches.get(i).map_or(&[], |c| c.body.as_slice())
            }
            (Section::Finally, ScopeKind::Try { finally, .. }) => {
                finally.as_ref().map_or(&[], |f| f.body.as_slice())
            }
            (Section::Case(i), ScopeKind::Switch { cases }) => {
                cases.get(i).map_or(&[], |c| c.body.as_slice())
            }
            _ => &[],
        }
    }

    pub(crate) fn section_blocks_mut(&mut self, section: Section) -> Option<&mut Vec<BlockId>> {
        match (section, &mut self.kind) {
            (Section::Body, _) => Some(&mut self.body_blocks),
            (Section::Else, ScopeKind::If { else_blocks }) => Some(else_blocks),
            (Section::Catch(i), ScopeKind::Try { catches, .. }) => {
                catches.get_mut(i).map(|c| &mut c.body)
            }
            (Section::Finally, ScopeKind::Try { finally, .. }) => {
                finally.as_mut().map(|f| &mut f.body)
            }
            (Section::Case(i), ScopeKind::Switch { cases }) => {
                cases.get_mut(i).map(|c| &mut c.body)
            }
            _ => None,
        }
    }
}
