//! Device connection handling.

use std::sync::Arc;

use buzzer_core::Environment;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{error::ServerError, state::SharedState};

/// Largest chunk read from a device socket at once.
const READ_CHUNK_SIZE: usize = 1024;

/// Serve one device connection until it closes.
///
/// Requests on one connection are handled strictly in arrival order and
/// their replies are written in the same order. The receipt instant is
/// taken as soon as a chunk is read.
pub async fn serve_device<E, S>(
    shared: Arc<SharedState<E>>,
    mut stream: S,
    peer: String,
) -> Result<(), ServerError>
where
    E: Environment,
    S: AsyncRead + AsyncWrite + Unpin,
{
    tracing::info!(%peer, "Device connected");
    let mut buf = [0u8; READ_CHUNK_SIZE];

    let result = loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => break Err(ServerError::from(e)),
        };
        let received_at = shared.env().now();

        let replies = shared.handle_device_chunk(&peer, &buf[..n], received_at).await;
        if replies.is_empty() {
            continue;
        }
        if let Err(e) = stream.write_all(&replies).await {
            break Err(ServerError::from(e));
        }
    };

    match &result {
        Ok(()) => tracing::info!(%peer, "Device disconnected"),
        Err(error) => tracing::info!(%peer, %error, "Device connection lost"),
    }
    result
}
