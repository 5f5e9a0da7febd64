// src/edges.rs
//! Edge resolution. Runs once, after every block and scope is final, and
//! computes all edges purely from the scope tree.
//!
//! The single scope-exit walk (`after_section` / `after_construct`) answers
//! "what executes when this construct finishes" for every construct kind,
//! which is what branch-false targets, break targets, and cross-scope
//! fall-through all reduce to.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::classify::{LoopKind, StatementKind};
use crate::graph::{Block, BlockId, Diagnostic, DiagnosticKind, Edge, EdgeKind};
use crate::methods::MethodId;
use crate::scope::{Scope, ScopeId, ScopeKind, Section};

/// How control reached a fall-through target, deciding the edge kind for
/// plain sequential flow. Branch-false and break edges keep their own kind
/// regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Via {
    Plain,
    Loop,
    Finally,
}

pub fn resolve_edges(
    blocks: &[Block],
    scopes: &[Scope],
    target: MethodId,
    inline_calls: bool,
) -> (Vec<Edge>, Vec<Diagnostic>) {
    let mut r = Resolver {
        blocks,
        scopes,
        target,
        end: blocks.len() as BlockId,
        roots: method_roots(blocks),
        edges: Vec::new(),
        seen: HashSet::new(),
        has_exception_out: HashSet::new(),
        diagnostics: Vec::new(),
    };
    r.exception_edges();
    r.flow_edges();
    if inline_calls {
        r.call_edges();
    }
    (r.edges, r.diagnostics)
}

/// Top-level blocks of each method, in id order.
fn method_roots(blocks: &[Block]) -> BTreeMap<MethodId, Vec<BlockId>> {
    let mut roots: BTreeMap<MethodId, Vec<BlockId>> = BTreeMap::new();
    for b in blocks {
        if b.home.is_none() {
            roots.entry(b.owner_method).or_default().push(b.id);
        }
    }
    roots
}

struct Resolver<'a> {
    blocks: &'a [Block],
    scopes: &'a [Scope],
    target: MethodId,
    end: BlockId,
    roots: BTreeMap<MethodId, Vec<BlockId>>,
    edges: Vec<Edge>,
    seen: HashSet<(BlockId, BlockId, EdgeKind)>,
    has_exception_out: HashSet<BlockId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Resolver<'a> {
    fn add(&mut self, from: BlockId, to: BlockId, kind: EdgeKind) {
        if self.seen.insert((from, to, kind.clone())) {
            self.edges.push(Edge { from, to, kind });
        }
    }

    fn scope(&self, id: ScopeId) -> &'a Scope {
        &self.scopes[id as usize]
    }

    /// The scope a header block opened, if this block is a construct header.
    fn own_scope(&self, b: &Block) -> Option<&'a Scope> {
        let id = *b.scope_path.last()?;
        let s = self.scope(id);
        (s.header_block == b.id).then_some(s)
    }

    /// Which section of `ancestor` encloses `block`, via the home chain.
    fn section_within(&self, block: BlockId, ancestor: ScopeId) -> Option<Section> {
        let mut cursor = self.blocks[block as usize].home;
        while let Some((scope, section)) = cursor {
            if scope == ancestor {
                return Some(section);
            }
            let s = self.scope(scope);
            cursor = s.parent.map(|p| (p, s.parent_section));
        }
        None
    }

    /// The block after `id` in its own section list (or method root list).
    fn next_in_home(&self, b: &Block) -> Option<BlockId> {
        let list: &[BlockId] = match b.home {
            Some((scope, section)) => self.scope(scope).section_blocks(section),
            None => self
                .roots
                .get(&b.owner_method)
                .map_or(&[], |v| v.as_slice()),
        };
        next_in_list(list, b.id)
    }

    /// What executes when the given section of a construct completes.
    fn after_section(&self, scope: ScopeId, section: Section) -> (BlockId, Via) {
        let s = self.scope(scope);
        match &s.kind {
            ScopeKind::Loop { .. } => (s.header_block, Via::Loop),
            ScopeKind::If { .. } => self.after_construct(scope),
            ScopeKind::Try { finally, .. } => {
                if section != Section::Finally {
                    if let Some(f) = finally {
                        return (f.header, Via::Finally);
                    }
                }
                self.after_construct(scope)
            }
            ScopeKind::Switch { cases } => {
                // Java case fall-through: a case body that does not break
                // runs into the next label.
                if let Section::Case(i) = section {
                    if let Some(next) = cases.get(i + 1) {
                        return (next.label, Via::Plain);
                    }
                }
                self.after_construct(scope)
            }
        }
    }

    /// What executes when the whole construct completes: the next sibling
    /// after its header, found by walking up the scope tree.
    fn after_construct(&self, scope: ScopeId) -> (BlockId, Via) {
        let s = self.scope(scope);
        let siblings: &[BlockId] = match s.parent {
            Some(p) => self.scope(p).section_blocks(s.parent_section),
            None => {
                let owner = self.blocks[s.header_block as usize].owner_method;
                self.roots.get(&owner).map_or(&[], |v| v.as_slice())
            }
        };
        if let Some(next) = next_in_list(siblings, s.header_block) {
            return (next, Via::Plain);
        }
        match s.parent {
            Some(p) => self.after_section(p, s.parent_section),
            None => (self.end, Via::Plain),
        }
    }

    /// Fall-through target for a non-terminal block: next in section, else
    /// whatever follows the enclosing construct.
    fn fall_through(&self, b: &Block) -> (BlockId, Via) {
        if let Some(next) = self.next_in_home(b) {
            return (next, Via::Plain);
        }
        match b.home {
            Some((scope, section)) => self.after_section(scope, section),
            None => (self.end, Via::Plain),
        }
    }

    fn flow_target(&mut self, from: BlockId, target: (BlockId, Via)) {
        let (to, via) = target;
        let kind = match via {
            Via::Plain => EdgeKind::Sequential,
            Via::Loop => EdgeKind::LoopBack,
            Via::Finally => EdgeKind::Finally,
        };
        self.add(from, to, kind);
    }

    /// Blanket exception edges: every block lexically inside a try body gets
    /// an edge to each catch header, in source order. The try header itself
    /// is excluded (its home chain starts outside its own scope).
    fn exception_edges(&mut self) {
        for b in self.blocks {
            for &ancestor in &b.scope_path {
                let ScopeKind::Try { catches, .. } = &self.scope(ancestor).kind else {
                    continue;
                };
                if self.section_within(b.id, ancestor) != Some(Section::Body) {
                    continue;
                }
                for c in catches {
                    let header = c.header;
                    self.add(b.id, header, EdgeKind::Exception);
                    self.has_exception_out.insert(b.id);
                }
            }
        }
    }

    fn flow_edges(&mut self) {
        for b in self.blocks {
            match b.kind.clone() {
                StatementKind::BranchHeader { condition } => self.branch_edges(b, &condition),
                StatementKind::LoopHeader { kind, condition } => {
                    self.loop_edges(b, kind, &condition);
                }
                StatementKind::SwitchHeader { .. } => self.switch_edges(b),
                StatementKind::TryHeader => self.try_entry(b),
                StatementKind::CatchHeader { .. } => self.clause_entry(b),
                StatementKind::FinallyHeader => self.clause_entry(b),
                StatementKind::CaseLabel { .. } => self.clause_entry(b),
                StatementKind::Return => self.return_edges(b),
                StatementKind::Break => self.break_edge(b),
                StatementKind::Continue => self.continue_edge(b),
                StatementKind::Throw => self.throw_edge(b),
                StatementKind::Assignment | StatementKind::Expression => {
                    let target = self.fall_through(b);
                    self.flow_target(b.id, target);
                }
            }
        }
    }

    fn branch_edges(&mut self, b: &Block, condition: &str) {
        let Some(s) = self.own_scope(b) else { return };
        let first_then = s.body_blocks.first().copied();
        let else_blocks = match &s.kind {
            ScopeKind::If { else_blocks } => else_blocks.as_slice(),
            _ => &[],
        };
        let false_target = match else_blocks.first() {
            Some(&e) => e,
            None => self.after_construct(s.id).0,
        };
        if let Some(t) = first_then {
            self.add(b.id, t, EdgeKind::BranchTrue(condition.to_string()));
        }
        self.add(b.id, false_target, EdgeKind::BranchFalse(condition.to_string()));
    }

    fn loop_edges(&mut self, b: &Block, kind: LoopKind, condition: &str) {
        let Some(s) = self.own_scope(b) else { return };
        let first_body = s.body_blocks.first().copied();
        let exit = self.after_construct(s.id).0;
        if let Some(t) = first_body {
            // A do-while body always runs once; for/while enter on the
            // condition.
            let entry = match kind {
                LoopKind::DoWhile => EdgeKind::Sequential,
                LoopKind::For | LoopKind::While => {
                    EdgeKind::BranchTrue(condition.to_string())
                }
            };
            self.add(b.id, t, entry);
        }
        self.add(b.id, exit, EdgeKind::BranchFalse(condition.to_string()));
    }

    fn switch_edges(&mut self, b: &Block) {
        let Some(s) = self.own_scope(b) else { return };
        let ScopeKind::Switch { cases } = &s.kind else { return };
        let scope_id = s.id;
        let mut dispatch = Vec::new();
        let mut has_default = false;
        for c in cases {
            match &c.value {
                Some(v) => dispatch.push((c.label, EdgeKind::CaseMatch(v.clone()))),
                None => {
                    has_default = true;
                    dispatch.push((c.label, EdgeKind::DefaultCase));
                }
            }
        }
        for (label, kind) in dispatch {
            self.add(b.id, label, kind);
        }
        if !has_default {
            // No default clause: the switch can fall straight through.
            let exit = self.after_construct(scope_id).0;
            self.add(b.id, exit, EdgeKind::Sequential);
        }
    }

    fn try_entry(&mut self, b: &Block) {
        let Some(s) = self.own_scope(b) else { return };
        let scope_id = s.id;
        match s.body_blocks.first().copied() {
            Some(t) => self.add(b.id, t, EdgeKind::Sequential),
            None => {
                let target = self.after_section(scope_id, Section::Body);
                self.flow_target(b.id, target);
            }
        }
    }

    /// Entry edge for a catch, finally, or case label block into its body.
    fn clause_entry(&mut self, b: &Block) {
        let Some((scope, section)) = b.home else { return };
        let body = self.scope(scope).section_blocks(section);
        match body.first().copied() {
            Some(t) => self.add(b.id, t, EdgeKind::Sequential),
            None => {
                let target = self.after_section(scope, section);
                self.flow_target(b.id, target);
            }
        }
    }

    fn return_edges(&mut self, b: &Block) {
        if b.owner_method == self.target {
            self.add(b.id, self.end, EdgeKind::Sequential);
        }
        // Inlined callee returns are wired back to call sites in call_edges.
    }

    fn break_edge(&mut self, b: &Block) {
        let breakable = b
            .scope_path
            .iter()
            .rev()
            .find(|&&s| self.scope(s).is_breakable())
            .copied();
        match breakable {
            Some(s) => {
                let exit = self.after_construct(s).0;
                self.add(b.id, exit, EdgeKind::BreakExit);
            }
            None => {
                self.diagnostics.push(Diagnostic {
                    line: b.line,
                    kind: DiagnosticKind::UnsupportedConstruct,
                    message: "`break` outside any loop or switch".to_string(),
                });
                self.add(b.id, self.end, EdgeKind::BreakExit);
            }
        }
    }

    fn continue_edge(&mut self, b: &Block) {
        let header = b
            .scope_path
            .iter()
            .rev()
            .find(|&&s| self.scope(s).is_loop())
            .map(|&s| self.scope(s).header_block);
        match header {
            Some(h) => self.add(b.id, h, EdgeKind::Continue),
            None => {
                self.diagnostics.push(Diagnostic {
                    line: b.line,
                    kind: DiagnosticKind::UnsupportedConstruct,
                    message: "`continue` outside any loop".to_string(),
                });
                self.add(b.id, self.end, EdgeKind::Sequential);
            }
        }
    }

    /// A throw inside a try body is covered by the blanket exception edges;
    /// anywhere else it propagates out of the method.
    fn throw_edge(&mut self, b: &Block) {
        if !self.has_exception_out.contains(&b.id) {
            self.add(b.id, self.end, EdgeKind::Exception);
        }
    }

    /// Call edges into inlined callee bodies and return edges back to the
    /// call sites.
    fn call_edges(&mut self) {
        let mut entry: HashMap<MethodId, BlockId> = HashMap::new();
        for b in self.blocks {
            entry.entry(b.owner_method).or_insert(b.id);
        }

        let mut sites: BTreeMap<MethodId, Vec<BlockId>> = BTreeMap::new();
        for b in self.blocks {
            for &callee in &b.calls {
                if entry.contains_key(&callee) {
                    sites.entry(callee).or_default().push(b.id);
                }
            }
        }

        for (callee, callers) in &sites {
            let first = entry[callee];
            for &site in callers {
                self.add(site, first, EdgeKind::Call);
            }
        }
        for b in self.blocks {
            if b.kind != StatementKind::Return || b.owner_method == self.target {
                continue;
            }
            if let Some(callers) = sites.get(&b.owner_method) {
                for &site in callers {
                    self.add(b.id, site, EdgeKind::Return);
                }
            }
        }
    }
}

fn next_in_list(list: &[BlockId], id: BlockId) -> Option<BlockId> {
    let pos = list.iter().position(|&b| b == id)?;
    list.get(pos + 1).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CfgBuilder;
    use crate::classify::classify_fragments;
    use crate::methods::MethodTable;
    use crate::normalize::normalize_body;

    fn resolve(body: &str) -> (Vec<Block>, Vec<Edge>) {
        let table = MethodTable::scan("class T { void m() { } }");
        let mut b = CfgBuilder::new(&table);
        let n = normalize_body(body, 1);
        b.add_method(0, classify_fragments(&n.fragments));
        let (blocks, scopes, _, _) = b.finish();
        let (edges, _) = resolve_edges(&blocks, &scopes, 0, false);
        (blocks, edges)
    }

    fn has(edges: &[Edge], from: BlockId, to: BlockId, kind: &EdgeKind) -> bool {
        edges
            .iter()
            .any(|e| e.from == from && e.to == to && e.kind == *kind)
    }

    #[test]
    fn if_else_with_returns() {
        let (blocks, edges) =
            resolve("if (x > 0) {\n  return 1;\n} else {\n  return 2;\n}\n");
        assert_eq!(blocks.len(), 3);
        assert!(has(&edges, 0, 1, &EdgeKind::BranchTrue("x > 0".into())));
        assert!(has(&edges, 0, 2, &EdgeKind::BranchFalse("x > 0".into())));
        assert!(has(&edges, 1, 3, &EdgeKind::Sequential));
        assert!(has(&edges, 2, 3, &EdgeKind::Sequential));
        assert_eq!(edges.len(), 4);
    }

    #[test]
    fn for_loop_back_edge() {
        let (blocks, edges) = resolve("for (i = 0; i < n; i++) {\n  sum += i;\n}\n");
        assert_eq!(blocks.len(), 2);
        let cond = "i = 0; i < n; i++".to_string();
        assert!(has(&edges, 0, 1, &EdgeKind::BranchTrue(cond.clone())));
        assert!(has(&edges, 1, 0, &EdgeKind::LoopBack));
        assert!(has(&edges, 0, 2, &EdgeKind::BranchFalse(cond)));
        assert_eq!(edges.len(), 3);
    }

    #[test]
    fn try_catch_exception_edges() {
        let (blocks, edges) = resolve("try {\n  risky();\n} catch (E e) {\n  handle();\n}\n");
        assert_eq!(blocks.len(), 4);
        assert!(has(&edges, 0, 1, &EdgeKind::Sequential));
        assert!(has(&edges, 1, 2, &EdgeKind::Exception));
        assert!(has(&edges, 1, 4, &EdgeKind::Sequential)); // past the construct
        assert!(has(&edges, 2, 3, &EdgeKind::Sequential));
        assert!(has(&edges, 3, 4, &EdgeKind::Sequential));
    }

    #[test]
    fn finally_intercepts_fall_through() {
        let body = "try {\n  risky();\n} catch (E e) {\n  handle();\n} finally {\n  cleanup();\n}\nafter();\n";
        let (blocks, edges) = resolve(body);
        assert_eq!(blocks.len(), 7);
        // try body and catch body both route through the finally header.
        assert!(has(&edges, 1, 4, &EdgeKind::Finally));
        assert!(has(&edges, 3, 4, &EdgeKind::Finally));
        assert!(has(&edges, 5, 6, &EdgeKind::Sequential)); // cleanup -> after
    }

    #[test]
    fn branch_false_inside_loop_goes_back_to_header() {
        let body = "while (run) {\n  if (x) {\n    a();\n  }\n}\n";
        let (_, edges) = resolve(body);
        // Nothing follows the if inside the loop body.
        assert!(has(&edges, 1, 0, &EdgeKind::BranchFalse("x".into())));
        assert!(has(&edges, 2, 0, &EdgeKind::LoopBack));
    }

    #[test]
    fn break_and_continue_target_the_loop() {
        let body = "while (run) {\n  if (x) {\n    break;\n  }\n  if (y) {\n    continue;\n  }\n  work();\n}\ndone();\n";
        let (blocks, edges) = resolve(body);
        let done = blocks.len() as BlockId - 1;
        assert!(has(&edges, 2, done, &EdgeKind::BreakExit));
        assert!(has(&edges, 4, 0, &EdgeKind::Continue));
    }

    #[test]
    fn switch_dispatch_and_fall_through() {
        let body = "switch (x) {\n  case 1:\n    a();\n  case 2:\n    b();\n    break;\n  default:\n    c();\n}\nafter();\n";
        let (blocks, edges) = resolve(body);
        assert!(has(&edges, 0, 1, &EdgeKind::CaseMatch("1".into())));
        assert!(has(&edges, 0, 3, &EdgeKind::CaseMatch("2".into())));
        assert!(has(&edges, 0, 6, &EdgeKind::DefaultCase));
        // case 1 body has no break: falls into the case 2 label.
        assert!(has(&edges, 2, 3, &EdgeKind::Sequential));
        let after = blocks.len() as BlockId - 1;
        assert!(has(&edges, 5, after, &EdgeKind::BreakExit));
        assert!(has(&edges, 7, after, &EdgeKind::Sequential));
    }

    #[test]
    fn throw_outside_try_exits_the_method() {
        let (_, edges) = resolve("throw new IllegalStateException();\n");
        assert!(has(&edges, 0, 1, &EdgeKind::Exception));
    }

    #[test]
    fn do_while_enters_unconditionally() {
        let (_, edges) = resolve("do {\n  i++;\n} while (i < n);\n");
        assert!(has(&edges, 0, 1, &EdgeKind::Sequential));
        assert!(has(&edges, 1, 0, &EdgeKind::LoopBack));
        assert!(has(&edges, 0, 2, &EdgeKind::BranchFalse("i < n".into())));
    }
}
