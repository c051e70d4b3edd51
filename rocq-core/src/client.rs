//! Prover subprocess ownership and JSON-RPC plumbing.
//!
//! One reader task decodes everything the prover writes and fans it out:
//! responses to their pending waiters by id, server-to-client requests to a
//! small default responder, notifications to registered handlers. All
//! writes go through the shared [`FrameWriter`].

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::codec::{FrameReader, FrameWriter, RawMessage};
use crate::{Error, Result};

/// Name of the prover binary on PATH.
const PROVER_COMMAND: &str = "vsrocqtop";

type PendingMap = Arc<Mutex<HashMap<i64, oneshot::Sender<RawMessage>>>>;
type HandlerMap = Arc<RwLock<HashMap<String, Box<dyn Fn(Value) + Send + Sync>>>>;

/// Client for one prover subprocess (or, in tests, any stream pair that
/// speaks the same protocol).
pub struct ProverClient {
    writer: Arc<FrameWriter>,
    pending: PendingMap,
    handlers: HandlerMap,
    alive: Arc<AtomicBool>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl ProverClient {
    /// Spawn `vsrocqtop` with the given extra arguments and wire its stdio.
    /// Stderr lines are relayed to the log.
    pub fn spawn(args: &[String]) -> Result<Arc<Self>> {
        let mut child = Command::new(PROVER_COMMAND)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Io(std::io::Error::other("prover stdin not piped")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Io(std::io::Error::other("prover stdout not piped")))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "vsrocqtop", "{line}");
                }
            });
        }

        Ok(Self::wire(stdout, stdin, Some(child)))
    }

    /// Wire a client over an arbitrary stream pair and start the reader
    /// task. `spawn` uses this with the child's pipes; tests use in-process
    /// duplex streams.
    pub fn connect(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Arc<Self> {
        Self::wire(reader, writer, None)
    }

    fn wire(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
        child: Option<Child>,
    ) -> Arc<Self> {
        let client = Arc::new(Self {
            writer: Arc::new(FrameWriter::new(writer)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            alive: Arc::new(AtomicBool::new(true)),
            child: tokio::sync::Mutex::new(child),
        });

        tokio::spawn(read_loop(
            FrameReader::new(reader),
            Arc::clone(&client.writer),
            Arc::clone(&client.pending),
            Arc::clone(&client.handlers),
            Arc::clone(&client.alive),
        ));

        client
    }

    /// Send a request and block until its response arrives or the reader
    /// task dies. The response sink is registered before the bytes are
    /// written so the reader can never race the registration.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(Error::ProverDied);
        }

        let id = self.writer.next_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if let Err(e) = self
            .writer
            .write_message(&RawMessage::request(id, method, params))
            .await
        {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        let resp = rx.await.map_err(|_| Error::ProverDied)?;
        if let Some(err) = resp.error {
            return Err(Error::Prover {
                code: err.code,
                message: err.message,
            });
        }
        Ok(resp.result.unwrap_or(Value::Null))
    }

    /// Send a notification; never waits for a reply.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.writer
            .write_message(&RawMessage::notification(method, params))
            .await
    }

    /// Register a handler for an incoming notification method. Handlers run
    /// on the reader task and must not block.
    pub fn on_notification(&self, method: &str, handler: impl Fn(Value) + Send + Sync + 'static) {
        self.handlers
            .write()
            .insert(method.to_string(), Box::new(handler));
    }

    /// LSP handshake: `initialize`, `initialized`, then the configuration
    /// change that puts the prover in manual stepping mode so it does not
    /// interpret ahead on its own.
    pub async fn initialize(&self, root_uri: &str) -> Result<()> {
        let params = json!({
            "processId": std::process::id(),
            "rootUri": root_uri,
            "capabilities": {
                "textDocument": {
                    "publishDiagnostics": {},
                },
            },
        });
        self.request("initialize", Some(params)).await?;
        self.notify("initialized", Some(json!({}))).await?;
        self.notify(
            "workspace/didChangeConfiguration",
            Some(json!({
                "settings": {
                    "vsrocq": {
                        "proof": {"mode": 0},
                    },
                },
            })),
        )
        .await
    }

    /// `shutdown` request, `exit` notification, then wait for the child.
    pub async fn shutdown(&self) -> Result<()> {
        self.request("shutdown", None).await?;
        self.notify("exit", None).await?;
        if let Some(mut child) = self.child.lock().await.take() {
            let status = child.wait().await?;
            if !status.success() {
                warn!(%status, "prover exited with failure");
            }
        }
        Ok(())
    }
}

async fn read_loop(
    mut frames: FrameReader,
    writer: Arc<FrameWriter>,
    pending: PendingMap,
    handlers: HandlerMap,
    alive: Arc<AtomicBool>,
) {
    loop {
        let msg = match frames.read_message().await {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                debug!("prover closed its output stream");
                break;
            }
            Err(e) => {
                warn!(error = %e, "prover read failed");
                break;
            }
        };

        match (msg.id, msg.method.clone()) {
            // Response to one of our requests.
            (Some(id), None) => {
                let sink = pending.lock().remove(&id);
                match sink {
                    Some(tx) => {
                        let _ = tx.send(msg);
                    }
                    None => debug!(id, "response for unknown request id"),
                }
            }
            // Server-to-client request; must be answered or init wedges.
            (Some(id), Some(method)) => {
                answer_server_request(&writer, id, &method, msg.params.as_ref()).await;
            }
            // Notification.
            (None, Some(method)) => {
                let handlers = handlers.read();
                match handlers.get(&method) {
                    Some(handler) => handler(msg.params.unwrap_or(Value::Null)),
                    None => debug!(%method, "unhandled notification"),
                }
            }
            (None, None) => debug!("message with neither id nor method"),
        }
    }

    alive.store(false, Ordering::SeqCst);
    // Dropping the sinks wakes every waiter with a terminal error.
    pending.lock().clear();
}

async fn answer_server_request(
    writer: &FrameWriter,
    id: i64,
    method: &str,
    params: Option<&Value>,
) {
    let result = match method {
        "workspace/configuration" => {
            // One settings entry per requested item.
            let items = params
                .and_then(|p| p.get("items"))
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(1);
            let settings = json!({
                "proof": {"mode": 0},
            });
            Value::Array(vec![settings; items])
        }
        _ => {
            debug!(method, id, "unhandled server request");
            Value::Null
        }
    };

    if let Err(e) = writer.write_message(&RawMessage::response(id, result)).await {
        warn!(error = %e, method, "failed to answer server request");
    }
}
