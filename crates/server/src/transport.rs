//! Line-delimited JSON over TCP.
//!
//! Each request is one line: `{"site": ..., "method": ..., "params": {...}}`.
//! Each response is one line: `{"status": "ok", "data": ...}` or
//! `{"status": "error", "data": "<CODE>: <message>"}`. Requests on one
//! connection are answered in order.

use std::future::Future;
use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::error::ServerError;
use crate::handler::Dispatcher;
use crate::params::Params;

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub site: String,
    pub method: String,
    #[serde(default)]
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum Response {
    Ok(Json),
    Error(String),
}

/// Answer one request line.
pub async fn respond(dispatcher: &Dispatcher, line: &str) -> Response {
    let result = match serde_json::from_str::<Request>(line) {
        Ok(request) => dispatcher.exec(&request.site, &request.method, &request.params).await,
        Err(e) => Err(ServerError::Malformed(e.to_string())),
    };
    match result {
        Ok(data) => Response::Ok(data),
        Err(err) => {
            tracing::warn!(error = %err, "request failed");
            Response::Error(err.to_string())
        }
    }
}

async fn handle(stream: TcpStream, dispatcher: Arc<Dispatcher>) -> io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let mut encoded = serde_json::to_vec(&respond(&dispatcher, &line).await)?;
        encoded.push(b'\n');
        write.write_all(&encoded).await?;
    }
    Ok(())
}

/// Accept connections until `shutdown` resolves.
///
/// Each connection gets its own task; a failing connection is logged and
/// does not affect the others.
pub async fn serve(listener: TcpListener, dispatcher: Arc<Dispatcher>, shutdown: impl Future<Output = ()>) -> io::Result<()> {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                tracing::debug!(%peer, "connection accepted");
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    if let Err(e) = handle(stream, dispatcher).await {
                        tracing::warn!(%peer, error = %e, "connection closed with error");
                    }
                });
            }
        }
    }
}
