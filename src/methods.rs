// src/methods.rs
//! Class and method discovery over raw Java source.
//!
//! Declaration matching is deliberately regex + brace matching rather than a
//! full parser: the analyzer only needs to locate method bodies and resolve
//! in-file call targets.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{CfgError, Result, TargetKind};

pub type MethodId = u32;

pub const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally", "float",
    "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "package", "private", "protected", "public", "return", "short", "static",
    "strictfp", "super", "switch", "synchronized", "this", "throw", "throws", "transient", "try",
    "void", "volatile", "while",
];

/// Common receivers/identifiers that match the call-site pattern but never
/// name an in-file method.
const CALL_NOISE: &[&str] = &["System", "out", "println", "print", "length"];

#[derive(Debug, Clone, Serialize)]
pub struct ClassDecl {
    pub name: String,
    pub line: u32,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodDecl {
    pub id: MethodId,
    pub name: String,
    pub class: String,
    pub line: u32,
    /// Byte offset just past the body-opening `{`.
    pub body_start: usize,
    /// Byte offset of the matching closing `}` (exclusive body end).
    pub body_end: usize,
}

impl MethodDecl {
    #[must_use]
    pub fn signature(&self) -> String {
        format!("{}.{}()", self.class, self.name)
    }
}

/// Every class and method declared in one source file, in declaration order.
#[derive(Debug, Default, Serialize)]
pub struct MethodTable {
    pub classes: Vec<ClassDecl>,
    pub methods: Vec<MethodDecl>,
    #[serde(skip)]
    by_name: HashMap<String, MethodId>,
}

fn class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:public\s+|private\s+|protected\s+)?(?:abstract\s+|final\s+)?class\s+(\w+)(?:\s+extends\s+\w+)?(?:\s+implements\s+[\w,\s]+)?\s*\{",
        )
        .expect("class pattern is valid")
    })
}

fn method_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:public\s+|private\s+|protected\s+)?(?:static\s+)?(?:final\s+)?(?:[\w<>\[\],\s]+?)\s+(\w+)\s*\(([^)]*)\)\s*(?:throws\s+[\w,\s]+)?\s*\{",
        )
        .expect("method pattern is valid")
    })
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+)\s*\(").expect("call pattern is valid"))
}

impl MethodTable {
    /// Scans a source file for class and method declarations.
    #[must_use]
    pub fn scan(source: &str) -> Self {
        let mut table = MethodTable::default();

        for caps in class_re().captures_iter(source) {
            let m = caps.get(0).expect("whole match");
            let name = caps[1].to_string();
            let start = m.start();
            table.classes.push(ClassDecl {
                name,
                line: line_of(source, start),
                start,
                end: matching_brace_end(source, start),
            });
        }

        for caps in method_re().captures_iter(source) {
            let m = caps.get(0).expect("whole match");
            let name = caps[1].to_string();
            if JAVA_KEYWORDS.contains(&name.as_str()) {
                continue;
            }
            // Only methods that sit inside a discovered class body count.
            let Some(class) = table
                .classes
                .iter()
                .find(|c| m.start() > c.start && m.start() < c.end)
            else {
                continue;
            };
            let id = table.methods.len() as MethodId;
            // Call sites resolve to the first declaration of a name; every
            // declaration stays addressable for target resolution.
            table.by_name.entry(name.clone()).or_insert(id);
            table.methods.push(MethodDecl {
                id,
                name,
                class: class.name.clone(),
                line: line_of(source, m.start()),
                body_start: m.end(),
                body_end: matching_brace_end(source, m.start()),
            });
        }

        table
    }

    #[must_use]
    pub fn get(&self, id: MethodId) -> &MethodDecl {
        &self.methods[id as usize]
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<MethodId> {
        self.by_name.get(name).copied()
    }

    /// Resolves the analysis target: a named method (restricted to the
    /// requested class when one is given), or the first method of the
    /// (named or first) class.
    pub fn resolve_target(
        &self,
        method: Option<&str>,
        class: Option<&str>,
    ) -> Result<MethodId> {
        if let Some(name) = class {
            if !self.classes.iter().any(|c| c.name == name) {
                return Err(CfgError::UnresolvedTarget {
                    kind: TargetKind::Class,
                    name: name.to_string(),
                });
            }
        }

        if let Some(name) = method {
            return self
                .methods
                .iter()
                .find(|m| m.name == name && class.map_or(true, |c| m.class == c))
                .map(|m| m.id)
                .ok_or_else(|| CfgError::UnresolvedTarget {
                    kind: TargetKind::Method,
                    name: name.to_string(),
                });
        }

        let target_class = class
            .map(str::to_string)
            .or_else(|| self.classes.first().map(|c| c.name.clone()));
        self.methods
            .iter()
            .find(|m| target_class.as_deref().map_or(true, |c| m.class == c))
            .map(|m| m.id)
            .ok_or(CfgError::EmptySource)
    }

    /// In-file methods referenced by a call site in `code`, in first-mention
    /// order, deduplicated.
    #[must_use]
    pub fn calls_in(&self, code: &str) -> Vec<MethodId> {
        let mut seen = Vec::new();
        for caps in call_re().captures_iter(code) {
            let name = &caps[1];
            if JAVA_KEYWORDS.contains(&name) || CALL_NOISE.contains(&name) {
                continue;
            }
            if let Some(id) = self.lookup(name) {
                if !seen.contains(&id) {
                    seen.push(id);
                }
            }
        }
        seen
    }
}

/// Byte offset just past the brace that closes the `{` following `start`.
/// Falls back to the end of the source when the braces never balance.
fn matching_brace_end(source: &str, start: usize) -> usize {
    let mut depth = 0u32;
    let mut entered = false;
    for (i, c) in source[start..].char_indices() {
        match c {
            '{' => {
                entered = true;
                depth += 1;
            }
            '}' if entered => {
                depth -= 1;
                if depth == 0 {
                    return start + i;
                }
            }
            _ => {}
        }
    }
    source.len()
}

pub(crate) fn line_of(source: &str, offset: usize) -> u32 {
    source[..offset].bytes().filter(|&b| b == b'\n').count() as u32 + 1
}
