//! Bridge operations: the verbs an agent drives the prover with.
//!
//! Every proof-advancing verb follows the same discipline: drain the
//! document's channels, send one notification, then collect the resulting
//! `proofView` and `publishDiagnostics` pushes under a quiescence timer and
//! fold them into a reply. Queries and searches are ordinary requests.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use lsp_types::{
    Diagnostic, DidChangeTextDocumentParams, DidOpenTextDocumentParams, Position,
    TextDocumentContentChangeEvent, TextDocumentItem, Uri, VersionedTextDocumentIdentifier,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use crate::client::ProverClient;
use crate::doc::{file_uri, DocEntry, Registry, SEARCH_CHANNEL_CAPACITY};
use crate::{format, Error, ProofView, Result, SearchResult};

/// Language id reported in `textDocument/didOpen`.
const LANGUAGE_ID: &str = "rocq";

/// Collector and drain timeouts. Fields so a harness can tighten them; the
/// defaults are the production values.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Ceiling on waiting for the first notification after a request.
    pub collect: Duration,
    /// Extra window granted after each arrival for the remaining ones.
    pub quiesce: Duration,
    /// Ceiling on waiting for the first search result.
    pub search_first: Duration,
    /// Sliding window after each search result.
    pub search_idle: Duration,
    /// Ceiling for the three-gate trace collector.
    pub trace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            collect: Duration::from_secs(10),
            quiesce: Duration::from_millis(500),
            search_first: Duration::from_secs(2),
            search_idle: Duration::from_millis(200),
            trace: Duration::from_secs(5),
        }
    }
}

/// Which query command a `prover/*` request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// `About`: information about an identifier.
    About,
    /// `Check`: the type of an expression.
    CheckType,
    /// `Locate`: the defining module of an identifier.
    Locate,
    /// `Print`: the full definition of an identifier.
    Print,
}

impl QueryKind {
    fn method(self) -> &'static str {
        match self {
            QueryKind::About => "prover/about",
            QueryKind::CheckType => "prover/check",
            QueryKind::Locate => "prover/locate",
            QueryKind::Print => "prover/print",
        }
    }
}

/// Everything one `prover/stepForward` produced, undigested. Used by the
/// `proof-trace` binary, which wants the cursor position to slice the next
/// sentence out of the source text.
#[derive(Debug, Default)]
pub struct TraceStep {
    pub cursor: Option<Position>,
    pub proof_view: Option<ProofView>,
    pub diagnostics: Vec<Diagnostic>,
}

/// One bridge session: the (lazily started) prover plus all open documents.
///
/// Operations on a single document must be issued serially by the caller;
/// the bridge does not interleave them.
pub struct Bridge {
    prover_args: Vec<String>,
    client: tokio::sync::Mutex<Option<Arc<ProverClient>>>,
    registry: Registry,
    pub timeouts: Timeouts,
}

impl Bridge {
    /// `prover_args` are forwarded verbatim to the prover subprocess when it
    /// is first needed.
    pub fn new(prover_args: Vec<String>) -> Self {
        Self {
            prover_args,
            client: tokio::sync::Mutex::new(None),
            registry: Registry::default(),
            timeouts: Timeouts::default(),
        }
    }

    /// Adopt an already-connected client instead of spawning one. The
    /// notification router is installed on it exactly as `spawn` would.
    pub async fn attach_client(&self, client: Arc<ProverClient>) {
        self.registry.install(&client);
        *self.client.lock().await = Some(client);
    }

    /// Start the prover on first use and run the LSP handshake rooted at
    /// the current working directory.
    async fn ensure_client(&self) -> Result<Arc<ProverClient>> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(Arc::clone(client));
        }

        let client = ProverClient::spawn(&self.prover_args)?;
        self.registry.install(&client);

        let cwd = std::env::current_dir()?;
        let root = url::Url::from_file_path(&cwd)
            .map_err(|_| Error::InvalidPath(cwd.display().to_string()))?;
        client.initialize(root.as_str()).await?;

        *guard = Some(Arc::clone(&client));
        Ok(client)
    }

    async fn client(&self) -> Result<Arc<ProverClient>> {
        self.client.lock().await.clone().ok_or(Error::ProverDied)
    }

    fn doc(&self, file: &str) -> Result<Arc<DocEntry>> {
        let uri = file_uri(Path::new(file))?;
        self.registry
            .get(&uri)
            .ok_or_else(|| Error::NotOpen(file.to_string()))
    }

    /// Open a `.v` file: register it at version 1 and send
    /// `textDocument/didOpen` with its current contents.
    pub async fn open_doc(&self, file: &str) -> Result<()> {
        let client = self.ensure_client().await?;
        let uri = file_uri(Path::new(file))?;
        let text = tokio::fs::read_to_string(file).await?;

        let Some(doc) = self.registry.insert(uri, text.clone()) else {
            return Err(Error::AlreadyOpen(file.to_string()));
        };

        let params = DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: parse_uri(&doc.uri)?,
                language_id: LANGUAGE_ID.to_string(),
                version: 1,
                text,
            },
        };
        client
            .notify("textDocument/didOpen", Some(serde_json::to_value(params)?))
            .await
    }

    /// Close a document and release its state.
    pub async fn close_doc(&self, file: &str) -> Result<()> {
        let doc = self.doc(file)?;
        let client = self.client().await?;
        let result = client
            .notify(
                "textDocument/didClose",
                Some(json!({"textDocument": {"uri": doc.uri}})),
            )
            .await;
        self.registry.remove(&doc.uri);
        result
    }

    /// Re-read the file from disk and send the whole text as a single
    /// `didChange`. The version strictly increases per document.
    pub async fn sync_doc(&self, file: &str) -> Result<()> {
        let doc = self.doc(file)?;
        let client = self.client().await?;
        let text = tokio::fs::read_to_string(file).await?;

        let version = {
            let mut record = doc.record.lock();
            record.version += 1;
            record.text = text.clone();
            record.version
        };

        let params = DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: parse_uri(&doc.uri)?,
                version,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text,
            }],
        };
        client
            .notify("textDocument/didChange", Some(serde_json::to_value(params)?))
            .await
    }

    /// Interpret up to a (0-indexed) position and report the proof state.
    pub async fn check(&self, file: &str, line: u32, col: u32) -> Result<String> {
        let doc = self.doc(file)?;
        let client = self.client().await?;
        doc.drain().await;

        client
            .notify(
                "prover/interpretToPoint",
                Some(json!({
                    "textDocument": text_document(&doc),
                    "position": {"line": line, "character": col},
                })),
            )
            .await?;

        let (view, diagnostics) = self.collect(&doc).await;
        Ok(format::full(view.as_ref(), &diagnostics))
    }

    /// Interpret the whole file and report the proof state.
    pub async fn check_all(&self, file: &str) -> Result<String> {
        let doc = self.doc(file)?;
        let client = self.client().await?;
        doc.drain().await;

        client
            .notify(
                "prover/interpretToEnd",
                Some(json!({"textDocument": text_document(&doc)})),
            )
            .await?;

        let (view, diagnostics) = self.collect(&doc).await;
        Ok(format::full(view.as_ref(), &diagnostics))
    }

    /// Advance or retract the proof position by one sentence.
    pub async fn step(&self, file: &str, forward: bool) -> Result<String> {
        let method = if forward {
            "prover/stepForward"
        } else {
            "prover/stepBackward"
        };
        let doc = self.doc(file)?;
        let client = self.client().await?;
        doc.drain().await;

        client
            .notify(method, Some(json!({"textDocument": text_document(&doc)})))
            .await?;

        let (view, diagnostics) = self.collect(&doc).await;
        Ok(format::step(view.as_ref(), &diagnostics))
    }

    /// Run one query command and render its pretty-print reply.
    pub async fn query(&self, file: &str, kind: QueryKind, pattern: &str) -> Result<String> {
        let doc = self.doc(file)?;
        let client = self.client().await?;

        let result = client
            .request(
                kind.method(),
                Some(json!({
                    "textDocument": text_document(&doc),
                    "position": {"line": 0, "character": 0},
                    "pattern": pattern,
                })),
            )
            .await?;

        let text = crate::ppcmd::render(&result);
        if text.is_empty() {
            return Ok("No result.".to_string());
        }
        Ok(text)
    }

    /// Search for statements matching a pattern. Results are pushed as
    /// `prover/searchResult` notifications tagged with our id; the sink is
    /// registered before the request so none can slip past.
    pub async fn search(&self, file: &str, pattern: &str) -> Result<String> {
        let doc = self.doc(file)?;
        let client = self.client().await?;

        let search_id = format!("search-{}", uuid::Uuid::new_v4());
        let (tx, mut rx) = mpsc::channel(SEARCH_CHANNEL_CAPACITY);
        self.registry.register_search(&search_id, tx);

        let request = client
            .request(
                "prover/search",
                Some(json!({
                    "textDocument": text_document(&doc),
                    "position": {"line": 0, "character": 0},
                    "pattern": pattern,
                    "id": search_id,
                })),
            )
            .await;

        let outcome = match request {
            Ok(_) => Ok(self.drain_search(&mut rx).await),
            Err(e) => Err(e),
        };
        self.registry.unregister_search(&search_id);
        let results = outcome?;

        if results.is_empty() {
            return Ok("No results found.".to_string());
        }
        let mut out = format!("=== Search Results: {} ===\n", results.len());
        for r in &results {
            out.push_str(&format!("{} : {}\n", r.name, r.statement));
        }
        Ok(out)
    }

    /// Reset the prover state for a document and forget its cached view.
    pub async fn reset(&self, file: &str) -> Result<()> {
        let doc = self.doc(file)?;
        let client = self.client().await?;

        client
            .request(
                "prover/resetRocq",
                Some(json!({"textDocument": text_document(&doc)})),
            )
            .await?;

        let mut record = doc.record.lock();
        record.proof_view = None;
        record.diagnostics.clear();
        Ok(())
    }

    /// List the proof blocks the prover sees in a document.
    pub async fn document_proofs(&self, file: &str) -> Result<String> {
        let doc = self.doc(file)?;
        let client = self.client().await?;

        let result = client
            .request(
                "prover/documentProofs",
                Some(json!({"textDocument": text_document(&doc)})),
            )
            .await?;
        Ok(format::document_proofs(&result))
    }

    /// Format the cached proof state without touching the prover.
    pub async fn proof_state(&self, file: &str) -> Result<String> {
        let doc = self.doc(file)?;
        let record = doc.record.lock();
        match record.proof_view.as_ref() {
            None => Ok(
                "No proof state available. Run rocq_check or rocq_step_forward first.".to_string(),
            ),
            Some(view) => Ok(format::full(Some(view), &record.diagnostics)),
        }
    }

    /// One forward step returning the raw collected parts, cursor included.
    pub async fn trace_step(&self, file: &str) -> Result<TraceStep> {
        let doc = self.doc(file)?;
        let client = self.client().await?;
        doc.drain().await;

        client
            .notify(
                "prover/stepForward",
                Some(json!({"textDocument": text_document(&doc)})),
            )
            .await?;

        let mut step = TraceStep::default();
        let mut got_diagnostics = false;
        let mut view_rx = doc.proof_view_rx.lock().await;
        let mut diag_rx = doc.diagnostics_rx.lock().await;
        let mut cursor_rx = doc.cursor_rx.lock().await;

        let timer = sleep(self.timeouts.trace);
        tokio::pin!(timer);
        while step.cursor.is_none() || step.proof_view.is_none() || !got_diagnostics {
            tokio::select! {
                Some(pos) = cursor_rx.recv() => {
                    step.cursor = Some(pos);
                    timer.as_mut().reset(Instant::now() + self.timeouts.quiesce);
                }
                Some(view) = view_rx.recv() => {
                    step.proof_view = Some(view);
                    timer.as_mut().reset(Instant::now() + self.timeouts.quiesce);
                }
                Some(diags) = diag_rx.recv() => {
                    step.diagnostics = diags;
                    got_diagnostics = true;
                    timer.as_mut().reset(Instant::now() + self.timeouts.quiesce);
                }
                _ = &mut timer => break,
            }
        }

        let mut record = doc.record.lock();
        if let Some(view) = &step.proof_view {
            record.proof_view = Some(view.clone());
        }
        Ok(step)
    }

    /// Text of an open document as of the last open/sync.
    pub fn document_text(&self, file: &str) -> Result<String> {
        Ok(self.doc(file)?.record.lock().text.clone())
    }

    /// Shut the prover down if it ever started.
    pub async fn shutdown(&self) -> Result<()> {
        let client = self.client.lock().await.take();
        match client {
            Some(client) => client.shutdown().await,
            None => Ok(()),
        }
    }

    /// Wait (bounded, then quiesce) for one proof view and one diagnostics
    /// batch, merging whatever arrived into the document record. A timeout
    /// is not an error: the caller formats what it has.
    async fn collect(&self, doc: &DocEntry) -> (Option<ProofView>, Vec<Diagnostic>) {
        let mut view: Option<ProofView> = None;
        let mut diagnostics: Option<Vec<Diagnostic>> = None;
        let mut got_view = false;
        let mut got_diagnostics = false;

        let mut view_rx = doc.proof_view_rx.lock().await;
        let mut diag_rx = doc.diagnostics_rx.lock().await;

        let timer = sleep(self.timeouts.collect);
        tokio::pin!(timer);
        while !(got_view && got_diagnostics) {
            tokio::select! {
                Some(v) = view_rx.recv() => {
                    view = Some(v);
                    got_view = true;
                    timer.as_mut().reset(Instant::now() + self.timeouts.quiesce);
                }
                Some(d) = diag_rx.recv() => {
                    diagnostics = Some(d);
                    got_diagnostics = true;
                    timer.as_mut().reset(Instant::now() + self.timeouts.quiesce);
                }
                _ = &mut timer => break,
            }
        }

        let mut record = doc.record.lock();
        if let Some(view) = &view {
            record.proof_view = Some(view.clone());
        }
        if let Some(diagnostics) = &diagnostics {
            record.diagnostics = diagnostics.clone();
        }
        (view, diagnostics.unwrap_or_default())
    }

    /// Drain search results: up to `search_first` for the first one, then a
    /// `search_idle` sliding window for each next.
    async fn drain_search(&self, rx: &mut mpsc::Receiver<SearchResult>) -> Vec<SearchResult> {
        let mut results = Vec::new();
        let timer = sleep(self.timeouts.search_first);
        tokio::pin!(timer);
        loop {
            tokio::select! {
                Some(result) = rx.recv() => {
                    results.push(result);
                    timer.as_mut().reset(Instant::now() + self.timeouts.search_idle);
                }
                _ = &mut timer => break,
            }
        }
        results
    }
}

fn text_document(doc: &DocEntry) -> Value {
    json!({"uri": doc.uri, "version": doc.record.lock().version})
}

fn parse_uri(uri: &str) -> Result<Uri> {
    Uri::from_str(uri).map_err(|e| Error::InvalidPath(format!("{uri}: {e}")))
}
