//! Newline-delimited JSON-RPC over a byte stream pair (stdin/stdout).
//!
//! One request per input line; one response per request that carries an
//! `id`. Notifications are interleaved on the same output as they happen.
//! Input EOF ends the session.

use std::sync::Arc;

use labman_protocol::{HandlerResult, RequestId, RpcError, RpcRequest, RpcResponse};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

/// Implemented by the server to handle incoming requests.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> impl std::future::Future<Output = HandlerResult> + Send;
}

/// Serve requests read from `input` until EOF, writing responses and
/// forwarded notifications to `output`.
pub async fn serve<H, R, W>(
    handler: Arc<H>,
    input: R,
    output: W,
    mut notifications: broadcast::Receiver<String>,
) -> std::io::Result<()>
where
    H: RequestHandler,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    // Writer task: single owner of the output stream
    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(mut line) = out_rx.recv().await {
            line.push('\n');
            if output.write_all(line.as_bytes()).await.is_err() || output.flush().await.is_err() {
                break;
            }
        }
    });

    // Notification forwarder. On input EOF it flushes whatever is already
    // queued before exiting, so events raised by the last request still go out.
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let forward_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            tokio::select! {
                received = notifications.recv() => match received {
                    Ok(json) => {
                        if forward_tx.send(json).is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Dropped {n} notifications");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
                _ = &mut stop_rx => break,
            }
        }
        loop {
            match notifications.try_recv() {
                Ok(json) => {
                    if forward_tx.send(json).is_err() {
                        return;
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Dropped {n} notifications");
                }
                Err(_) => return,
            }
        }
    });

    let mut lines = input.lines();
    let result = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if let Some(response) = handle_message(&line, &handler).await {
                    if out_tx.send(response).is_err() {
                        break Ok(());
                    }
                }
            }
            Ok(None) => {
                debug!("Input closed");
                break Ok(());
            }
            Err(e) => break Err(e),
        }
    };

    let _ = stop_tx.send(());
    let _ = forwarder.await;
    drop(out_tx);
    let _ = writer.await;
    result
}

/// Handle one JSON-RPC line. Returns `None` for requests without an id.
pub async fn handle_message<H: RequestHandler>(text: &str, handler: &Arc<H>) -> Option<String> {
    let parsed: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => {
            let err = RpcResponse::error(None, RpcError::parse_error("Failed to parse JSON"));
            return Some(encode(&err));
        }
    };

    // Echo the id back even when the rest of the request is malformed.
    let id: Option<RequestId> = parsed
        .get("id")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok());

    let request: RpcRequest = match serde_json::from_value::<RpcRequest>(parsed) {
        Ok(request) if request.is_valid() => request,
        _ => {
            let err = RpcResponse::error(id, RpcError::invalid_request("Invalid JSON-RPC 2.0 request"));
            return Some(encode(&err));
        }
    };

    let result = handler.handle_request(&request.method, request.params.clone()).await;
    if !request.expects_response() {
        return None;
    }
    let id = request.id?;
    let resp = match result {
        Ok(result) => RpcResponse::success(id, result),
        Err(err) => RpcResponse::error(Some(id), err),
    };
    Some(encode(&resp))
}

fn encode(resp: &RpcResponse) -> String {
    serde_json::to_string(resp).unwrap_or_else(|e| {
        warn!("Failed to encode response: {e}");
        r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Failed to encode response"}}"#.to_string()
    })
}
