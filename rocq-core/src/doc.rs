//! Per-document state and routing of the prover's push notifications.
//!
//! Each open document carries the durable record (version, text, last
//! diagnostics, last proof view) plus bounded channels that hand
//! asynchronous arrivals to whichever operation is currently waiting.
//! Senders never block: the record is authoritative, the channel is a
//! wakeup hint, and a full channel just drops the hint.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use lsp_types::{Diagnostic, Position, PublishDiagnosticsParams, Range};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::ProverClient;
use crate::{format, ppcmd, ProofView, Result, SearchResult};

/// Capacity of every per-document channel.
const CHANNEL_CAPACITY: usize = 16;

/// Buffer for search results between the router and the collecting task.
pub(crate) const SEARCH_CHANNEL_CAPACITY: usize = 256;

/// Durable per-document state, always current regardless of channel drops.
#[derive(Debug, Default)]
pub struct DocRecord {
    pub version: i32,
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
    pub proof_view: Option<ProofView>,
}

/// One open document: its record plus the channels bridging the prover's
/// asynchronous notifications to synchronous operations.
pub struct DocEntry {
    pub uri: String,
    pub record: Mutex<DocRecord>,
    proof_view_tx: mpsc::Sender<ProofView>,
    pub(crate) proof_view_rx: tokio::sync::Mutex<mpsc::Receiver<ProofView>>,
    diagnostics_tx: mpsc::Sender<Vec<Diagnostic>>,
    pub(crate) diagnostics_rx: tokio::sync::Mutex<mpsc::Receiver<Vec<Diagnostic>>>,
    cursor_tx: mpsc::Sender<Position>,
    pub(crate) cursor_rx: tokio::sync::Mutex<mpsc::Receiver<Position>>,
}

impl DocEntry {
    fn new(uri: String, text: String) -> Arc<Self> {
        let (proof_view_tx, proof_view_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (diagnostics_tx, diagnostics_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (cursor_tx, cursor_rx) = mpsc::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            uri,
            record: Mutex::new(DocRecord {
                version: 1,
                text,
                ..DocRecord::default()
            }),
            proof_view_tx,
            proof_view_rx: tokio::sync::Mutex::new(proof_view_rx),
            diagnostics_tx,
            diagnostics_rx: tokio::sync::Mutex::new(diagnostics_rx),
            cursor_tx,
            cursor_rx: tokio::sync::Mutex::new(cursor_rx),
        })
    }

    /// Discard anything still queued from a previous operation so the next
    /// collector only sees arrivals caused by its own request.
    pub async fn drain(&self) {
        let mut views = self.proof_view_rx.lock().await;
        while views.try_recv().is_ok() {}
        drop(views);
        let mut diags = self.diagnostics_rx.lock().await;
        while diags.try_recv().is_ok() {}
        drop(diags);
        let mut cursors = self.cursor_rx.lock().await;
        while cursors.try_recv().is_ok() {}
    }
}

/// Translate a file path to the `file://` URI used as the document key.
pub fn file_uri(path: &Path) -> Result<String> {
    let abs = std::path::absolute(path)?;
    let url = url::Url::from_file_path(&abs)
        .map_err(|_| crate::Error::InvalidPath(path.display().to_string()))?;
    Ok(url.to_string())
}

/// Registry of open documents and in-flight searches, shared between the
/// notification router and the bridge operations.
#[derive(Clone, Default)]
pub struct Registry {
    docs: Arc<Mutex<HashMap<String, Arc<DocEntry>>>>,
    searches: Arc<Mutex<HashMap<String, mpsc::Sender<SearchResult>>>>,
}

impl Registry {
    pub fn get(&self, uri: &str) -> Option<Arc<DocEntry>> {
        self.docs.lock().get(uri).cloned()
    }

    /// Create a document entry at version 1. `None` if the URI is already
    /// registered.
    pub fn insert(&self, uri: String, text: String) -> Option<Arc<DocEntry>> {
        let mut docs = self.docs.lock();
        if docs.contains_key(&uri) {
            return None;
        }
        let entry = DocEntry::new(uri.clone(), text);
        docs.insert(uri, Arc::clone(&entry));
        Some(entry)
    }

    pub fn remove(&self, uri: &str) -> Option<Arc<DocEntry>> {
        self.docs.lock().remove(uri)
    }

    pub(crate) fn register_search(&self, id: &str, tx: mpsc::Sender<SearchResult>) {
        self.searches.lock().insert(id.to_string(), tx);
    }

    pub(crate) fn unregister_search(&self, id: &str) {
        self.searches.lock().remove(id);
    }

    /// Register every notification handler this bridge consumes on a
    /// freshly connected client.
    pub fn install(&self, client: &ProverClient) {
        let registry = self.clone();
        client.on_notification("textDocument/publishDiagnostics", move |params| {
            registry.on_publish_diagnostics(params);
        });
        let registry = self.clone();
        client.on_notification("prover/proofView", move |params| {
            registry.on_proof_view(params);
        });
        let registry = self.clone();
        client.on_notification("prover/searchResult", move |params| {
            registry.on_search_result(params);
        });
        let registry = self.clone();
        client.on_notification("prover/moveCursor", move |params| {
            registry.on_move_cursor(params);
        });
        client.on_notification("prover/updateHighlights", |_| {});
        client.on_notification("prover/blockOnError", |_| {});
        client.on_notification("prover/debugMessage", |params| {
            debug!(target: "vsrocqtop", %params, "prover debug message");
        });
    }

    fn on_publish_diagnostics(&self, params: Value) {
        let parsed: PublishDiagnosticsParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "malformed publishDiagnostics notification");
                return;
            }
        };
        let uri = parsed.uri.to_string();
        let Some(doc) = self.get(&uri) else {
            debug!(%uri, "diagnostics for unopened document");
            return;
        };
        doc.record.lock().diagnostics = parsed.diagnostics.clone();
        let _ = doc.diagnostics_tx.try_send(parsed.diagnostics);
    }

    fn on_proof_view(&self, params: Value) {
        let Some(view) = format::parse_proof_view(&params) else {
            warn!("malformed proofView notification");
            return;
        };
        // The notification carries no URI; only one proof session is active
        // at a time, so every open document's waiter gets the view and the
        // drain-before-send discipline discards strays.
        for doc in self.docs.lock().values() {
            let _ = doc.proof_view_tx.try_send(view.clone());
        }
    }

    fn on_search_result(&self, params: Value) {
        #[derive(Deserialize)]
        struct SearchResultParams {
            id: String,
            #[serde(default)]
            name: Value,
            #[serde(default)]
            statement: Value,
        }
        let parsed: SearchResultParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "malformed searchResult notification");
                return;
            }
        };
        let sink = self.searches.lock().get(&parsed.id).cloned();
        let Some(sink) = sink else {
            debug!(id = %parsed.id, "search result with no registered collector");
            return;
        };
        let _ = sink.try_send(SearchResult {
            name: ppcmd::render(&parsed.name),
            statement: ppcmd::render(&parsed.statement),
        });
    }

    fn on_move_cursor(&self, params: Value) {
        #[derive(Deserialize)]
        struct MoveCursorParams {
            #[serde(default)]
            uri: Option<String>,
            range: Range,
        }
        let parsed: MoveCursorParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "malformed moveCursor notification");
                return;
            }
        };
        match parsed.uri {
            Some(uri) => {
                if let Some(doc) = self.get(&uri) {
                    let _ = doc.cursor_tx.try_send(parsed.range.end);
                }
            }
            None => {
                for doc in self.docs.lock().values() {
                    let _ = doc.cursor_tx.try_send(parsed.range.end);
                }
            }
        }
    }
}
