//! `rocq-core`: the bridge between agent tool calls and `vsrocqtop`.
//!
//! Scope:
//! - own a `vsrocqtop` subprocess and speak Content-Length framed JSON-RPC
//!   2.0 (LSP plus the `prover/*` extension methods) over its stdio
//! - track per-document state (version, diagnostics, last proof view) and
//!   route the prover's push notifications to whichever operation is waiting
//! - turn each operation into a plain-text reply an agent can read
//!
//! The prover is the single source of truth for sentence boundaries and
//! proof state; nothing here parses `.v` syntax.
//!
//! Entrypoints:
//! - [`Bridge`] carries the whole session: open/sync/close documents,
//!   check/step through proofs, run queries and searches
//! - the MCP tool surface lives in the `mcp-server` crate
//! - a sentence-stepping debug CLI lives in `src/bin/proof-trace.rs`

use serde::{Deserialize, Serialize};

pub mod client;
pub mod codec;
pub mod doc;
pub mod format;
pub mod ops;
pub mod ppcmd;

pub use client::ProverClient;
pub use ops::{Bridge, QueryKind, Timeouts, TraceStep};

/// Errors surfaced to tool callers and internal tasks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed Content-Length framing or message JSON. Fatal for the
    /// reader task that hits it.
    #[error("framing: {0}")]
    Framing(String),

    /// A JSON-RPC error object in a prover response.
    #[error("prover error {code}: {message}")]
    Prover { code: i64, message: String },

    /// The reader task terminated; pending and future requests fail.
    #[error("prover process exited")]
    ProverDied,

    #[error("document not open: {0}")]
    NotOpen(String),

    #[error("document already open: {0}")]
    AlreadyOpen(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One focused goal, pre-rendered to its display block
/// (hypotheses, separator line, conclusion).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub text: String,
}

/// Structured snapshot of the prover state at the last checked point.
///
/// `unfocused_count` is already clamped: the prover's background-subgoals
/// list includes the focused goals, so the focused count is subtracted
/// (floored at zero) during parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofView {
    pub goals: Vec<Goal>,
    pub unfocused_count: usize,
    pub shelved_count: usize,
    pub given_up_count: usize,
    pub messages: Vec<String>,
}

impl ProofView {
    /// True when no focused goals remain and all background counts are zero.
    pub fn is_complete(&self) -> bool {
        self.goals.is_empty()
            && self.unfocused_count == 0
            && self.shelved_count == 0
            && self.given_up_count == 0
    }
}

/// One `prover/searchResult` entry, with both sides rendered from their
/// pretty-print trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub name: String,
    pub statement: String,
}
