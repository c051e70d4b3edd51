//! Content-Length framed JSON-RPC 2.0 codec.
//!
//! Every message to and from the prover is `Content-Length: <N>\r\n\r\n`
//! followed by N bytes of JSON. One [`FrameReader`] is consumed by the
//! single reader task; the [`FrameWriter`] is shared by every task that
//! sends, with writes serialized so header and body stay contiguous.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::{Error, Result};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Decoded JSON-RPC envelope. Which fields are present decides the message
/// kind: `{id}` is a response, `{id, method}` a server-to-client request,
/// `{method}` a notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RawMessage {
    pub fn request(id: i64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Some("2.0".to_string()),
            id: Some(id),
            method: Some(method.to_string()),
            params,
            ..Default::default()
        }
    }

    pub fn notification(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Some("2.0".to_string()),
            method: Some(method.to_string()),
            params,
            ..Default::default()
        }
    }

    pub fn response(id: i64, result: Value) -> Self {
        Self {
            jsonrpc: Some("2.0".to_string()),
            id: Some(id),
            result: Some(result),
            ..Default::default()
        }
    }
}

/// Write side of the codec. Many tasks may send concurrently; the stream
/// mutex keeps each frame atomic. Also owns the request-id counter.
pub struct FrameWriter {
    stream: Mutex<BoxedWriter>,
    next_id: AtomicI64,
}

impl FrameWriter {
    pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            stream: Mutex::new(Box::new(writer)),
            next_id: AtomicI64::new(1),
        }
    }

    /// Atomically allocate the next request id. Ids start at 1.
    pub fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn write_message(&self, msg: &RawMessage) -> Result<()> {
        let body = serde_json::to_vec(msg)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        let mut stream = self.stream.lock().await;
        stream.write_all(header.as_bytes()).await?;
        stream.write_all(&body).await?;
        stream.flush().await?;
        Ok(())
    }
}

/// Read side of the codec. Single consumer: one reader task per prover.
pub struct FrameReader {
    stream: BufReader<BoxedReader>,
}

impl FrameReader {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            stream: BufReader::new(Box::new(reader)),
        }
    }

    /// Read one framed message. `Ok(None)` means the stream closed cleanly
    /// at a frame boundary; anything torn mid-frame is a framing error.
    pub async fn read_message(&mut self) -> Result<Option<RawMessage>> {
        let mut content_length: Option<usize> = None;
        let mut saw_header = false;
        loop {
            let mut line = String::new();
            let n = self.stream.read_line(&mut line).await?;
            if n == 0 {
                if saw_header {
                    return Err(Error::Framing("eof inside frame headers".to_string()));
                }
                return Ok(None);
            }
            saw_header = true;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                break;
            }
            if let Some(rest) = line.strip_prefix("Content-Length:") {
                let parsed = rest.trim().parse::<usize>().map_err(|e| {
                    Error::Framing(format!("bad Content-Length {:?}: {e}", rest.trim()))
                })?;
                content_length = Some(parsed);
            }
            // Other headers (Content-Type, ...) are ignored.
        }

        let len =
            content_length.ok_or_else(|| Error::Framing("missing Content-Length header".into()))?;
        let mut body = vec![0u8; len];
        self.stream
            .read_exact(&mut body)
            .await
            .map_err(|e| Error::Framing(format!("short body read: {e}")))?;

        let msg = serde_json::from_slice(&body)
            .map_err(|e| Error::Framing(format!("malformed message: {e}")))?;
        Ok(Some(msg))
    }
}
