// src/builder.rs
//! Scope tracking and block allocation: a brace-depth stack machine that
//! turns classified statements into blocks and a scope tree.
//!
//! A scope is pushed when its header block is emitted and popped when a
//! statement arrives at or below the depth recorded at the push — unless that
//! statement continues the construct (`else`, `catch`, `finally`, the
//! do-while tail), in which case the open scope switches section instead.

use crate::classify::{Classified, FallbackReason, LoopKind, StatementKind, Stmt};
use crate::graph::{Block, BlockId, Diagnostic, DiagnosticKind};
use crate::methods::{MethodId, MethodTable};
use crate::scope::{CatchClause, CaseClause, FinallyClause, Scope, ScopeId, ScopeKind, Section};

pub struct CfgBuilder<'a> {
    table: &'a MethodTable,
    blocks: Vec<Block>,
    scopes: Vec<Scope>,
    diagnostics: Vec<Diagnostic>,
    partial: bool,
}

/// One open construct on the tracker stack.
struct OpenScope {
    scope: ScopeId,
    /// Brace depth of the header statement; body statements sit deeper.
    open_depth: u32,
    section: Section,
}

impl<'a> CfgBuilder<'a> {
    #[must_use]
    pub fn new(table: &'a MethodTable) -> Self {
        CfgBuilder {
            table,
            blocks: Vec::new(),
            scopes: Vec::new(),
            diagnostics: Vec::new(),
            partial: false,
        }
    }

    pub fn mark_partial(&mut self) {
        self.partial = true;
    }

    pub fn push_diagnostics(&mut self, diags: Vec<Diagnostic>) {
        self.diagnostics.extend(diags);
    }

    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[must_use]
    pub fn finish(self) -> (Vec<Block>, Vec<Scope>, Vec<Diagnostic>, bool) {
        (self.blocks, self.scopes, self.diagnostics, self.partial)
    }

    /// Consumes one method's classified statements, appending its blocks and
    /// scopes to the shared arena.
    pub fn add_method(&mut self, method: MethodId, stmts: Vec<Stmt>) {
        let mut stack: Vec<OpenScope> = Vec::new();

        for stmt in stmts {
            if let Some(reason) = stmt.fallback {
                self.note_fallback(&stmt, reason);
            }

            self.pop_closed(&mut stack, &stmt);

            match stmt.kind.clone() {
                Classified::ElseMarker => self.enter_else(&mut stack, &stmt),
                Classified::ChainedBranch(kind) => {
                    self.enter_chained_branch(&mut stack, &stmt, kind, method);
                }
                Classified::DoWhileClose { condition } => {
                    self.close_do_while(&mut stack, &stmt, condition);
                }
                Classified::Statement(kind) => self.statement(&mut stack, &stmt, kind, method),
            }
        }
    }

    /// Pops every scope the statement's depth has closed. A statement at the
    /// header depth keeps the top scope open only when it continues it.
    fn pop_closed(&self, stack: &mut Vec<OpenScope>, stmt: &Stmt) {
        while let Some(top) = stack.last() {
            if stmt.depth > top.open_depth {
                break;
            }
            if stmt.depth == top.open_depth && self.continues_top(top, &stmt.kind) {
                break;
            }
            stack.pop();
        }
    }

    fn continues_top(&self, top: &OpenScope, kind: &Classified) -> bool {
        let scope_kind = &self.scopes[top.scope as usize].kind;
        match kind {
            Classified::ElseMarker | Classified::ChainedBranch(_) => {
                matches!(scope_kind, ScopeKind::If { .. })
            }
            Classified::DoWhileClose { .. } => matches!(
                scope_kind,
                ScopeKind::Loop {
                    kind: LoopKind::DoWhile
                }
            ),
            Classified::Statement(
                StatementKind::CatchHeader { .. } | StatementKind::FinallyHeader,
            ) => matches!(scope_kind, ScopeKind::Try { .. }),
            Classified::Statement(_) => false,
        }
    }

    fn enter_else(&mut self, stack: &mut [OpenScope], stmt: &Stmt) {
        match stack.last_mut() {
            Some(top) if matches!(self.scopes[top.scope as usize].kind, ScopeKind::If { .. }) => {
                top.section = Section::Else;
            }
            _ => self.diagnostics.push(Diagnostic {
                line: stmt.line,
                kind: DiagnosticKind::UnknownFragment,
                message: "`else` without a matching `if`; ignored".to_string(),
            }),
        }
    }

    /// `} else if (...) {`: the header block lands in the open if's else
    /// section, and a new nested if scope is chained from it.
    fn enter_chained_branch(
        &mut self,
        stack: &mut Vec<OpenScope>,
        stmt: &Stmt,
        kind: StatementKind,
        method: MethodId,
    ) {
        let StatementKind::BranchHeader { .. } = kind else {
            self.statement(stack, stmt, kind, method);
            return;
        };
        match stack.last_mut() {
            Some(top) if matches!(self.scopes[top.scope as usize].kind, ScopeKind::If { .. }) => {
                top.section = Section::Else;
            }
            _ => {
                self.diagnostics.push(Diagnostic {
                    line: stmt.line,
                    kind: DiagnosticKind::UnknownFragment,
                    message: "`else if` without a matching `if`".to_string(),
                });
            }
        }
        self.open_construct(
            stack,
            stmt,
            kind,
            ScopeKind::If {
                else_blocks: Vec::new(),
            },
            method,
        );
    }

    fn close_do_while(&mut self, stack: &mut Vec<OpenScope>, stmt: &Stmt, condition: String) {
        let header = match stack.last() {
            Some(top)
                if matches!(
                    self.scopes[top.scope as usize].kind,
                    ScopeKind::Loop {
                        kind: LoopKind::DoWhile
                    }
                ) =>
            {
                self.scopes[top.scope as usize].header_block
            }
            _ => {
                self.diagnostics.push(Diagnostic {
                    line: stmt.line,
                    kind: DiagnosticKind::UnknownFragment,
                    message: "`while (...);` tail without a matching `do`; ignored".to_string(),
                });
                return;
            }
        };
        stack.pop();
        self.blocks[header as usize].kind = StatementKind::LoopHeader {
            kind: LoopKind::DoWhile,
            condition,
        };
    }

    fn statement(
        &mut self,
        stack: &mut Vec<OpenScope>,
        stmt: &Stmt,
        kind: StatementKind,
        method: MethodId,
    ) {
        match kind {
            StatementKind::BranchHeader { .. } => self.open_construct(
                stack,
                stmt,
                kind,
                ScopeKind::If {
                    else_blocks: Vec::new(),
                },
                method,
            ),
            StatementKind::LoopHeader { kind: loop_kind, .. } => {
                let scope_kind = ScopeKind::Loop { kind: loop_kind };
                self.open_construct(stack, stmt, kind, scope_kind, method);
            }
            StatementKind::SwitchHeader { .. } => {
                self.open_construct(stack, stmt, kind, ScopeKind::Switch { cases: Vec::new() }, method);
            }
            StatementKind::TryHeader => self.open_construct(
                stack,
                stmt,
                kind,
                ScopeKind::Try {
                    catches: Vec::new(),
                    finally: None,
                },
                method,
            ),
            StatementKind::CatchHeader { exception_type } => {
                self.enter_catch(stack, stmt, exception_type, method);
            }
            StatementKind::FinallyHeader => self.enter_finally(stack, stmt, method),
            StatementKind::CaseLabel { value } => self.enter_case(stack, stmt, value, method),
            _ => {
                let id = self.emit_block(stack, stmt, kind, method);
                self.append_to_section(stack, id);
            }
        }
    }

    /// Emits a construct header block into the current section, then pushes
    /// the new scope. The header's scope path ends with its own scope.
    fn open_construct(
        &mut self,
        stack: &mut Vec<OpenScope>,
        stmt: &Stmt,
        kind: StatementKind,
        scope_kind: ScopeKind,
        method: MethodId,
    ) {
        let scope_id = self.scopes.len() as ScopeId;
        let id = self.emit_block(stack, stmt, kind, method);
        self.append_to_section(stack, id);
        self.blocks[id as usize].scope_path.push(scope_id);

        let (parent, parent_section) = match stack.last() {
            Some(top) => (Some(top.scope), top.section),
            None => (None, Section::Body),
        };
        self.scopes.push(Scope {
            id: scope_id,
            parent,
            parent_section,
            header_block: id,
            kind: scope_kind,
            body_blocks: Vec::new(),
        });
        stack.push(OpenScope {
            scope: scope_id,
            open_depth: stmt.depth,
            section: Section::Body,
        });
    }

    fn enter_catch(
        &mut self,
        stack: &mut Vec<OpenScope>,
        stmt: &Stmt,
        exception_type: Option<String>,
        method: MethodId,
    ) {
        let Some(top) = stack.last() else {
            self.degrade(stack, stmt, method, "`catch` without a matching `try`");
            return;
        };
        let scope_id = top.scope;
        if !matches!(self.scopes[scope_id as usize].kind, ScopeKind::Try { .. }) {
            self.degrade(stack, stmt, method, "`catch` without a matching `try`");
            return;
        }
        let id = self.next_id();
        let index = match &self.scopes[scope_id as usize].kind {
            ScopeKind::Try { catches, .. } => catches.len(),
            _ => 0,
        };
        self.push_block(stmt, StatementKind::CatchHeader { exception_type: exception_type.clone() },
            method, stack_path(stack), Some((scope_id, Section::Catch(index))));
        if let ScopeKind::Try { catches, .. } = &mut self.scopes[scope_id as usize].kind {
            catches.push(CatchClause {
                header: id,
                exception_type,
                body: Vec::new(),
            });
        }
        if let Some(top) = stack.last_mut() {
            top.section = Section::Catch(index);
        }
    }

    fn enter_finally(&mut self, stack: &mut Vec<OpenScope>, stmt: &Stmt, method: MethodId) {
        let Some(top) = stack.last() else {
            self.degrade(stack, stmt, method, "`finally` without a matching `try`");
            return;
        };
        let scope_id = top.scope;
        if !matches!(self.scopes[scope_id as usize].kind, ScopeKind::Try { .. }) {
            self.degrade(stack, stmt, method, "`finally` without a matching `try`");
            return;
        }
        let id = self.next_id();
        self.push_block(stmt, StatementKind::FinallyHeader, method, stack_path(stack),
            Some((scope_id, Section::Finally)));
        if let ScopeKind::Try { finally, .. } = &mut self.scopes[scope_id as usize].kind {
            *finally = Some(FinallyClause {
                header: id,
                body: Vec::new(),
            });
        }
        if let Some(top) = stack.last_mut() {
            top.section = Section::Finally;
        }
    }

    fn enter_case(
        &mut self,
        stack: &mut Vec<OpenScope>,
        stmt: &Stmt,
        value: Option<String>,
        method: MethodId,
    ) {
        let Some(top) = stack.last() else {
            self.degrade(stack, stmt, method, "case label outside a `switch`");
            return;
        };
        let scope_id = top.scope;
        if !matches!(self.scopes[scope_id as usize].kind, ScopeKind::Switch { .. }) {
            self.degrade(stack, stmt, method, "case label outside a `switch`");
            return;
        }
        let id = self.next_id();
        let index = match &self.scopes[scope_id as usize].kind {
            ScopeKind::Switch { cases } => cases.len(),
            _ => 0,
        };
        self.push_block(stmt, StatementKind::CaseLabel { value: value.clone() }, method,
            stack_path(stack), Some((scope_id, Section::Case(index))));
        if let ScopeKind::Switch { cases } = &mut self.scopes[scope_id as usize].kind {
            cases.push(CaseClause {
                label: id,
                value,
                body: Vec::new(),
            });
        }
        if let Some(top) = stack.last_mut() {
            top.section = Section::Case(index);
        }
    }

    /// A construct fragment that cannot attach anywhere becomes an opaque
    /// expression block, so the statement is not lost.
    fn degrade(&mut self, stack: &mut Vec<OpenScope>, stmt: &Stmt, method: MethodId, msg: &str) {
        self.diagnostics.push(Diagnostic {
            line: stmt.line,
            kind: DiagnosticKind::UnsupportedConstruct,
            message: format!("{msg}: `{}`", stmt.text),
        });
        let id = self.emit_block(stack, stmt, StatementKind::Expression, method);
        self.append_to_section(stack, id);
    }

    fn note_fallback(&mut self, stmt: &Stmt, reason: FallbackReason) {
        let (kind, what) = match reason {
            FallbackReason::UnknownFragment => (DiagnosticKind::UnknownFragment, "unrecognized"),
            FallbackReason::UnsupportedConstruct => {
                (DiagnosticKind::UnsupportedConstruct, "unsupported")
            }
        };
        self.diagnostics.push(Diagnostic {
            line: stmt.line,
            kind,
            message: format!("{what} fragment kept as opaque expression: `{}`", stmt.text),
        });
    }

    fn next_id(&self) -> BlockId {
        self.blocks.len() as BlockId
    }

    fn emit_block(
        &mut self,
        stack: &[OpenScope],
        stmt: &Stmt,
        kind: StatementKind,
        method: MethodId,
    ) -> BlockId {
        let home = stack.last().map(|top| (top.scope, top.section));
        self.push_block(stmt, kind, method, stack_path(stack), home)
    }

    fn push_block(
        &mut self,
        stmt: &Stmt,
        kind: StatementKind,
        method: MethodId,
        scope_path: Vec<ScopeId>,
        home: Option<(ScopeId, Section)>,
    ) -> BlockId {
        let id = self.next_id();
        self.blocks.push(Block {
            id,
            kind,
            code: stmt.text.clone(),
            line: stmt.line,
            owner_method: method,
            scope_path,
            home,
            calls: self.table.calls_in(&stmt.text),
        });
        id
    }

    fn append_to_section(&mut self, stack: &[OpenScope], id: BlockId) {
        if let Some(top) = stack.last() {
            if let Some(list) = self.scopes[top.scope as usize].section_blocks_mut(top.section) {
                list.push(id);
            }
        }
        // Top-level blocks live in no list; the resolver derives the method
        // root sequence from `home == None` in id order.
    }
}

fn stack_path(stack: &[OpenScope]) -> Vec<ScopeId> {
    stack.iter().map(|o| o.scope).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_fragments;
    use crate::normalize::normalize_body;

    fn build(body: &str) -> (Vec<Block>, Vec<Scope>) {
        let table = MethodTable::scan("class T { void m() { } }");
        let mut b = CfgBuilder::new(&table);
        let n = normalize_body(body, 1);
        b.add_method(0, classify_fragments(&n.fragments));
        let (blocks, scopes, _, _) = b.finish();
        (blocks, scopes)
    }

    #[test]
    fn if_else_builds_one_scope_with_two_sections() {
        let (blocks, scopes) = build("if (x) {\n  a();\n} else {\n  b();\n}\n");
        assert_eq!(blocks.len(), 3);
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes[0].body_blocks, vec![1]);
        assert_eq!(scopes[0].section_blocks(Section::Else), &[2]);
        assert_eq!(blocks[0].scope_path, vec![0]);
        assert_eq!(blocks[2].home, Some((0, Section::Else)));
    }

    #[test]
    fn else_if_chains_a_nested_scope() {
        let (blocks, scopes) = build("if (a) {\n  x();\n} else if (b) {\n  y();\n}\nz();\n");
        // if, x, else-if, y, z
        assert_eq!(blocks.len(), 5);
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[0].section_blocks(Section::Else), &[2]);
        assert_eq!(scopes[1].parent, Some(0));
        assert_eq!(scopes[1].parent_section, Section::Else);
        assert_eq!(scopes[1].body_blocks, vec![3]);
        assert_eq!(blocks[4].home, None);
    }

    #[test]
    fn try_catch_finally_sections() {
        let body = "try {\n  risky();\n} catch (IOException e) {\n  handle();\n} finally {\n  cleanup();\n}\n";
        let (blocks, scopes) = build(body);
        assert_eq!(blocks.len(), 6);
        let ScopeKind::Try { catches, finally } = &scopes[0].kind else {
            panic!("expected try scope");
        };
        assert_eq!(catches.len(), 1);
        assert_eq!(catches[0].header, 2);
        assert_eq!(catches[0].body, vec![3]);
        assert_eq!(catches[0].exception_type.as_deref(), Some("IOException"));
        let fin = finally.as_ref().expect("finally clause");
        assert_eq!(fin.header, 4);
        assert_eq!(fin.body, vec![5]);
    }

    #[test]
    fn do_while_condition_is_backfilled() {
        let (blocks, scopes) = build("do {\n  i++;\n} while (i < n);\n");
        assert_eq!(blocks.len(), 2);
        assert_eq!(scopes.len(), 1);
        assert_eq!(
            blocks[0].kind,
            StatementKind::LoopHeader {
                kind: LoopKind::DoWhile,
                condition: "i < n".to_string()
            }
        );
    }

    #[test]
    fn switch_cases_open_sections_not_scopes() {
        let body = "switch (x) {\n  case 1:\n    a();\n    break;\n  default:\n    b();\n}\n";
        let (blocks, scopes) = build(body);
        assert_eq!(scopes.len(), 1);
        let ScopeKind::Switch { cases } = &scopes[0].kind else {
            panic!("expected switch scope");
        };
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].value.as_deref(), Some("1"));
        assert_eq!(cases[0].body, vec![2, 3]);
        assert!(cases[1].value.is_none());
        assert_eq!(blocks[4].kind, StatementKind::CaseLabel { value: None });
    }

    #[test]
    fn nested_loop_scope_paths() {
        let body = "for (int i = 0; i < n; i++) {\n  if (x) {\n    a();\n  }\n}\n";
        let (blocks, scopes) = build(body);
        assert_eq!(scopes.len(), 2);
        assert_eq!(blocks[2].scope_path, vec![0, 1]);
        assert_eq!(blocks[2].home, Some((1, Section::Body)));
        assert!(scopes[0].is_loop());
    }
}
