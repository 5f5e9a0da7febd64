// src/error.rs
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which kind of analysis target could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Class,
    Method,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Class => write!(f, "class"),
            TargetKind::Method => write!(f, "method"),
        }
    }
}

/// Fatal analysis errors. Recoverable conditions (unbalanced braces, unknown
/// fragments, unsupported constructs) never end up here; they are recorded as
/// diagnostics on the graph so the caller can decide whether a partial result
/// is still useful.
#[derive(Debug, Error)]
pub enum CfgError {
    #[error("I/O error: {source} (path: {path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("target {kind} `{name}` not found in source")]
    UnresolvedTarget { kind: TargetKind, name: String },

    #[error("no method definitions found in source")]
    EmptySource,
}

pub type Result<T> = std::result::Result<T, CfgError>;
