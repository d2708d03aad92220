//! Origin connection, request transfer and response streaming.
//!
//! # Data Flow
//! ```text
//! connect(host, port)          failure → 503, no retry
//!     → write request head     failure → 500
//!     → POST: copy exactly Content-Length bytes client → origin
//!     → read origin line by line, write each to the client as it arrives
//!     → drop origin socket (closed on every path)
//! ```

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::relay::error::RelayError;
use crate::relay::line::{LineReader, LineStatus};
use crate::relay::target::ResolvedTarget;

/// Byte counts for one relayed request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub request_bytes: u64,
    pub body_bytes: u64,
    pub response_bytes: u64,
}

/// Send `head` (and `body_len` bytes of body taken from `client`) to the
/// target origin, then stream the origin's response back to `client`.
pub async fn forward<C>(
    client: &mut LineReader<C>,
    target: &ResolvedTarget,
    head: &[u8],
    body_len: Option<u64>,
) -> Result<RelayStats, RelayError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let mut origin = TcpStream::connect((target.host.as_str(), target.port))
        .await
        .map_err(|source| RelayError::OriginUnreachable {
            host: target.host.clone(),
            port: target.port,
            source,
        })?;

    tracing::debug!(host = %target.host, port = target.port, "connected to origin");

    let mut stats = RelayStats {
        request_bytes: head.len() as u64,
        ..RelayStats::default()
    };

    origin
        .write_all(head)
        .await
        .map_err(|source| origin_write(target, source))?;

    if let Some(len) = body_len {
        stats.body_bytes = copy_body(client, &mut origin, len, target).await?;
    }

    let max_line = client.max_line();
    stats.response_bytes = stream_response(&mut origin, client.get_mut(), max_line).await?;

    Ok(stats)
}

/// Move exactly `len` bytes from the client to the origin, however the
/// client happens to chunk them.
async fn copy_body<C, O>(
    client: &mut LineReader<C>,
    origin: &mut O,
    len: u64,
    target: &ResolvedTarget,
) -> Result<u64, RelayError>
where
    C: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let reader = client.buffered();
    let mut remaining = len;

    while remaining > 0 {
        let chunk = reader.fill_buf().await.map_err(RelayError::ClientIo)?;
        if chunk.is_empty() {
            tracing::debug!(missing = remaining, "client closed before the declared body was sent");
            return Err(RelayError::ClientClosed);
        }

        let take = chunk.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        origin
            .write_all(&chunk[..take])
            .await
            .map_err(|source| origin_write(target, source))?;
        reader.consume(take);
        remaining -= take as u64;
    }

    origin
        .flush()
        .await
        .map_err(|source| origin_write(target, source))?;
    Ok(len)
}

/// Relay the origin's response until it closes, one line at a time.
async fn stream_response<O, C>(
    origin: &mut O,
    client: &mut C,
    max_line: usize,
) -> Result<u64, RelayError>
where
    O: AsyncRead + Unpin,
    C: AsyncWrite + Unpin,
{
    let mut response = LineReader::new(origin, max_line);
    let mut line = Vec::with_capacity(max_line);
    let mut relayed = 0u64;

    loop {
        let status = response
            .next_line(&mut line)
            .await
            .map_err(RelayError::OriginIo)?;
        if status == LineStatus::Eof {
            break;
        }

        client.write_all(&line).await.map_err(RelayError::ClientIo)?;
        relayed += line.len() as u64;
    }

    client.flush().await.map_err(RelayError::ClientIo)?;
    Ok(relayed)
}

fn origin_write(target: &ResolvedTarget, source: std::io::Error) -> RelayError {
    RelayError::OriginWrite {
        host: target.host.clone(),
        source,
    }
}
