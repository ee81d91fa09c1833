//! The stdio request loop: one JSON-RPC request per input line, one response
//! per output line.

use std::panic::AssertUnwindSafe;

use caldav_rpc_core::protocol::{self, Request};
use caldav_rpc_core::{Dispatcher, RpcError, Store};
use futures::FutureExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, warn};

/// Serve requests from `input` until it is exhausted.
///
/// Each response is written and flushed before the next line is read.
pub async fn serve<S, R, W>(
    dispatcher: &mut Dispatcher<S>,
    input: R,
    mut output: W,
) -> std::io::Result<()>
where
    S: Store,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(dispatcher, &line).await;

        output.write_all(response.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }

    Ok(())
}

/// Turn one input line into one response line.
pub async fn handle_line<S: Store>(dispatcher: &mut Dispatcher<S>, line: &str) -> String {
    let Request { id, method, params } = match protocol::decode(line) {
        Ok(request) => request,
        Err(failure) => {
            warn!("Rejected request: {}", failure.error);
            return protocol::encode_error(&failure.id, &failure.error);
        }
    };

    let outcome = AssertUnwindSafe(dispatcher.dispatch(&method, &params))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(result)) => protocol::encode_result(&id, result),
        Ok(Err(err)) => {
            match &err {
                RpcError::Store(_) | RpcError::Codec(_) | RpcError::AuthFailure(_) => {
                    warn!("{} failed: {}", method, err)
                }
                _ => debug!("{} failed: {}", method, err),
            }
            protocol::encode_error(&id, &err)
        }
        Err(_) => {
            error!("Handler panicked while processing {}", method);
            protocol::encode_error(&id, &RpcError::Internal)
        }
    }
}
