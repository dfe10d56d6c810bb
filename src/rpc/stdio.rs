//! Newline-delimited JSON-RPC over stdin/stdout.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::engine::RouterEngine;

use super::RpcDispatcher;

/// Serve requests from stdin until EOF, one message per line, strictly in
/// order. Responses go to stdout; logging must stay on stderr so the protocol
/// stream stays clean.
pub async fn serve(engine: Arc<RouterEngine>) -> std::io::Result<()> {
    serve_streams(engine, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Transport-generic serve loop, split out so tests can drive it with
/// in-memory streams.
pub async fn serve_streams<R, W>(
    engine: Arc<RouterEngine>,
    reader: R,
    mut writer: W,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let dispatcher = RpcDispatcher::new(engine);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        // undecodable bytes degrade to replacement characters instead of
        // killing the transport
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(response) = dispatcher.handle_line(line) {
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }
    tracing::info!("stdin closed, shutting down");
    Ok(())
}
