//! Origin resolution from the request URI.
//!
//! Two request targets are understood: the bare `/` used for local
//! testing, which goes to the configured fallback origin, and the
//! absolute form `http://host[:port]/path`.

use std::borrow::Cow;

use thiserror::Error;

use crate::config::RelayConfig;

const SCHEME_PREFIX: &[u8] = b"http://";

/// Bytes that end the host part of an absolute URI.
const HOST_TERMINATORS: &[u8] = b" :/\r\n\0";

/// Why an absolute URI was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("uri must start with http://")]
    UnsupportedScheme,
    #[error("uri has no host")]
    MissingHost,
    #[error("host is not valid UTF-8")]
    InvalidHost,
    #[error("port {0:?} is not a positive port number")]
    InvalidPort(String),
    #[error("uri has no path after the authority")]
    MissingPath,
}

/// Pieces of an absolute-form URI, borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsoluteUri<'a> {
    pub host: &'a str,
    pub port: Option<&'a [u8]>,
    /// Path bytes as sent, starting with `/`.
    pub path: &'a [u8],
}

impl<'a> AbsoluteUri<'a> {
    /// Split `http://host[:port]/path` into its parts.
    ///
    /// The host runs until the first space, `:`, `/`, CR, LF or NUL. It
    /// must be followed by either `:port/...` or `/...`.
    pub fn lex(uri: &'a [u8]) -> Result<Self, UriError> {
        let rest = uri
            .strip_prefix(SCHEME_PREFIX)
            .ok_or(UriError::UnsupportedScheme)?;

        let host_end = rest
            .iter()
            .position(|b| HOST_TERMINATORS.contains(b))
            .unwrap_or(rest.len());
        let (host, after_host) = rest.split_at(host_end);
        if host.is_empty() {
            return Err(UriError::MissingHost);
        }
        let host = std::str::from_utf8(host).map_err(|_| UriError::InvalidHost)?;

        if let Some(after_colon) = after_host.strip_prefix(b":") {
            let slash = after_colon
                .iter()
                .position(|&b| b == b'/')
                .ok_or(UriError::MissingPath)?;
            let (port, path) = after_colon.split_at(slash);
            Ok(Self {
                host,
                port: Some(port),
                path,
            })
        } else if after_host.starts_with(b"/") {
            Ok(Self {
                host,
                port: None,
                path: after_host,
            })
        } else {
            Err(UriError::MissingPath)
        }
    }
}

/// Where a request is forwarded and what path it asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub host: String,
    pub port: u16,
    /// Always starts with `/`; bytes are kept exactly as received.
    pub path: Vec<u8>,
}

impl ResolvedTarget {
    pub fn resolve(uri: &[u8], relay: &RelayConfig) -> Result<Self, UriError> {
        if uri == b"/" {
            return Ok(Self {
                host: relay.fallback_host.clone(),
                port: relay.fallback_port,
                path: b"/".to_vec(),
            });
        }

        let parts = AbsoluteUri::lex(uri)?;
        let port = match parts.port {
            Some(raw) => parse_port(raw)?,
            None => relay.default_port,
        };

        Ok(Self {
            host: parts.host.to_string(),
            port,
            path: parts.path.to_vec(),
        })
    }

    /// The path for log output.
    pub fn display_path(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.path)
    }
}

fn parse_port(raw: &[u8]) -> Result<u16, UriError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse::<u16>().ok())
        .filter(|port| *port > 0)
        .ok_or_else(|| UriError::InvalidPort(String::from_utf8_lossy(raw).into_owned()))
}
