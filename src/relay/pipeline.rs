//! One request, start to finish.
//!
//! `serve` runs the stages and propagates the first error; `handle` is
//! the boundary a worker calls: it turns errors into a diagnostic or a
//! silent abort, logs and records the outcome, and never fails.

use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::Instrument;

use crate::config::RelayConfig;
use crate::net::connection::ClientConnection;
use crate::observability::metrics;
use crate::relay::error::RelayError;
use crate::relay::forward::{forward, RelayStats};
use crate::relay::headers::{assemble, content_length, encode_request};
use crate::relay::line::{LineReader, LineStatus};
use crate::relay::request::{Method, RequestLine};
use crate::relay::target::ResolvedTarget;

/// What happened to a connection, as seen by its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The origin's response was relayed.
    Relayed,
    /// The request was refused with a diagnostic of this code.
    Rejected { code: u16 },
    /// The connection was dropped without a response.
    Aborted,
}

impl Disposition {
    /// Whether the client got a response of any kind.
    pub fn is_handled(&self) -> bool {
        !matches!(self, Self::Aborted)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Relayed => "relayed",
            Self::Rejected { .. } => "rejected",
            Self::Aborted => "aborted",
        }
    }
}

/// Summary of a successfully relayed request.
#[derive(Debug, Clone)]
pub struct RelaySummary {
    pub method: Method,
    pub target: ResolvedTarget,
    pub header_segments: usize,
    pub stats: RelayStats,
}

/// Parses, rewrites and forwards requests according to a [`RelayConfig`].
#[derive(Debug, Clone)]
pub struct RelayPipeline {
    relay: Arc<RelayConfig>,
}

impl RelayPipeline {
    pub fn new(relay: RelayConfig) -> Self {
        Self {
            relay: Arc::new(relay),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.relay
    }

    /// Serve one accepted connection. All failures end here.
    pub async fn handle<S>(&self, conn: &mut ClientConnection<S>) -> Disposition
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let span = tracing::info_span!("relay", conn = %conn.id(), peer = ?conn.peer());
        let started = Instant::now();

        let disposition = self.handle_stream(conn.stream_mut()).instrument(span).await;

        metrics::record_connection(disposition.label(), started);
        disposition
    }

    /// [`handle`](Self::handle) for a bare stream.
    pub async fn handle_stream<S>(&self, stream: &mut S) -> Disposition
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.serve(stream).await {
            Ok(summary) => {
                tracing::info!(
                    method = %summary.method,
                    host = %summary.target.host,
                    port = summary.target.port,
                    path = %summary.target.display_path(),
                    header_segments = summary.header_segments,
                    body_bytes = summary.stats.body_bytes,
                    response_bytes = summary.stats.response_bytes,
                    "request relayed"
                );
                metrics::record_response_bytes(summary.stats.response_bytes);
                Disposition::Relayed
            }
            Err(err) => match err.diagnostic() {
                Some(diag) => {
                    tracing::warn!(code = diag.code, error = %err, "request rejected");
                    metrics::record_diagnostic(diag.code);
                    if let Err(write_err) = diag.write_to(stream).await {
                        tracing::debug!(error = %write_err, "could not deliver diagnostic");
                    }
                    Disposition::Rejected { code: diag.code }
                }
                None => {
                    tracing::debug!(error = %err, "connection aborted");
                    Disposition::Aborted
                }
            },
        }
    }

    /// Run every stage against `stream`, stopping at the first error.
    pub async fn serve<S>(&self, stream: &mut S) -> Result<RelaySummary, RelayError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let relay = self.relay.as_ref();
        let mut client = LineReader::new(stream, relay.read_buffer_size);

        let mut line = Vec::with_capacity(relay.read_buffer_size);
        match client.next_line(&mut line).await.map_err(RelayError::ClientIo)? {
            LineStatus::Eof => return Err(RelayError::ClientClosed),
            LineStatus::Truncated => {
                return Err(RelayError::RequestLineTooLong(relay.read_buffer_size))
            }
            LineStatus::Complete | LineStatus::Partial => {}
        }

        let request = RequestLine::parse(&line, relay)?;
        let target = ResolvedTarget::resolve(&request.uri, relay).map_err(|reason| {
            RelayError::BadUri {
                uri: String::from_utf8_lossy(&request.uri).into_owned(),
                reason,
            }
        })?;
        tracing::debug!(
            method = %request.method,
            client_version = %request.client_version,
            host = %target.host,
            port = target.port,
            path = %target.display_path(),
            "request line accepted"
        );

        let upstream_line_len = request.upstream_line(&target.path).len();
        let headers = assemble(&mut client, upstream_line_len, &target.host, relay).await?;

        // Validated before any origin connection is opened.
        let body_len = if request.method.has_body() {
            Some(content_length(&headers.table)?)
        } else {
            None
        };

        let head = encode_request(&request, &target.path, &headers, relay);
        let stats = forward(&mut client, &target, &head, body_len).await?;

        Ok(RelaySummary {
            method: request.method,
            target,
            header_segments: headers.segments,
            stats,
        })
    }
}
