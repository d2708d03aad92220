//! Errors raised while relaying one request.

use std::io;

use thiserror::Error;

use crate::relay::diagnostic::Diagnostic;
use crate::relay::headers::HeaderError;
use crate::relay::target::UriError;

/// Every way a single relay can stop short of a complete response.
///
/// Malformed-request, framing and upstream-connect errors carry a
/// [`Diagnostic`] for the client; the rest are silent aborts because the
/// channel is already unusable or the request is dropped by policy.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("client closed the connection")]
    ClientClosed,

    #[error("client i/o failed: {0}")]
    ClientIo(#[source] io::Error),

    #[error("request line has no method")]
    MissingMethod,

    #[error("method {0} is not implemented")]
    UnsupportedMethod(String),

    #[error("request line has no uri")]
    MissingUri,

    #[error("protocol version {0} is not accepted")]
    VersionRejected(String),

    #[error("request line exceeds {0} bytes")]
    RequestLineTooLong(usize),

    #[error("malformed request uri {uri}: {reason}")]
    BadUri { uri: String, reason: UriError },

    #[error("malformed header block: {0}")]
    BadHeaders(#[from] HeaderError),

    #[error("invalid Content-Length {0:?}")]
    BadContentLength(Option<String>),

    #[error("origin {host}:{port} unreachable: {source}")]
    OriginUnreachable {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to send request to {host}: {source}")]
    OriginWrite {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("origin i/o failed mid-response: {0}")]
    OriginIo(#[source] io::Error),
}

impl RelayError {
    /// The diagnostic owed to the client, if any.
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        let diag = match self {
            Self::MissingMethod => Diagnostic::bad_request("Missing arg", "Method"),
            Self::UnsupportedMethod(method) => {
                Diagnostic::new(501, "Not Implemented", "Method used is not valid", method.as_str())
            }
            Self::MissingUri => Diagnostic::bad_request("Missing arg", "uri"),
            Self::RequestLineTooLong(_) => Diagnostic::bad_request("Line too long", "request line"),
            Self::BadUri { uri, .. } => Diagnostic::bad_request("Received bad request", uri.as_str()),
            Self::BadHeaders(_) => Diagnostic::bad_request("Denied due to", "Bad headers"),
            Self::BadContentLength(value) => Diagnostic::bad_request(
                "Invalid Content-Length",
                value.as_deref().unwrap_or("missing"),
            ),
            Self::OriginUnreachable { host, .. } => {
                Diagnostic::new(503, "Server Unreachable", "Cannot find host", host.as_str())
            }
            Self::OriginWrite { host, .. } => {
                Diagnostic::new(500, "Internal Server Error", "Did not send to", host.as_str())
            }
            Self::ClientClosed
            | Self::ClientIo(_)
            | Self::VersionRejected(_)
            | Self::OriginIo(_) => return None,
        };
        Some(diag)
    }
}
