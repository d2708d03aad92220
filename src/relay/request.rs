//! Request-line tokenizing and validation.
//!
//! Validation runs in a fixed order and stops at the first violation:
//! method present, method supported, uri present, version accepted.

use std::fmt;

use crate::config::RelayConfig;
use crate::relay::error::RelayError;

/// Protocol version every forwarded request carries.
pub const UPSTREAM_VERSION: &str = "HTTP/1.0";

/// Methods this proxy forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// Match a wire token, ignoring ASCII case.
    pub fn from_token(token: &[u8]) -> Option<Self> {
        if token.eq_ignore_ascii_case(b"GET") {
            Some(Self::Get)
        } else if token.eq_ignore_ascii_case(b"POST") {
            Some(Self::Post)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }

    pub fn has_body(&self) -> bool {
        matches!(self, Self::Post)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    /// Request target exactly as the client sent it.
    pub uri: Vec<u8>,
    /// Version as the client sent it, or `HTTP/1.0` when omitted.
    pub client_version: String,
}

impl RequestLine {
    /// Tokenize and validate a raw request line.
    ///
    /// Tokens are separated by ASCII whitespace; anything after the third
    /// token is ignored. An omitted version defaults to `HTTP/1.0` and is
    /// not subject to the version policy.
    pub fn parse(line: &[u8], relay: &RelayConfig) -> Result<Self, RelayError> {
        let mut tokens = line
            .split(u8::is_ascii_whitespace)
            .filter(|token| !token.is_empty());

        let method_token = tokens.next().ok_or(RelayError::MissingMethod)?;
        let method = Method::from_token(method_token).ok_or_else(|| {
            RelayError::UnsupportedMethod(String::from_utf8_lossy(method_token).into_owned())
        })?;

        let uri = tokens.next().ok_or(RelayError::MissingUri)?;

        let client_version = match tokens.next() {
            None => UPSTREAM_VERSION.to_string(),
            Some(raw) => match std::str::from_utf8(raw) {
                Ok(version) if relay.accepts_version(version) => version.to_string(),
                _ => {
                    return Err(RelayError::VersionRejected(
                        String::from_utf8_lossy(raw).into_owned(),
                    ))
                }
            },
        };

        Ok(Self {
            method,
            uri: uri.to_vec(),
            client_version,
        })
    }

    /// The rewritten line sent upstream: `METHOD SP path SP HTTP/1.0 CRLF`.
    /// The path bytes are copied unchanged.
    pub fn upstream_line(&self, path: &[u8]) -> Vec<u8> {
        let method = self.method.as_str().as_bytes();
        let mut line = Vec::with_capacity(method.len() + path.len() + UPSTREAM_VERSION.len() + 4);
        line.extend_from_slice(method);
        line.push(b' ');
        line.extend_from_slice(path);
        line.push(b' ');
        line.extend_from_slice(UPSTREAM_VERSION.as_bytes());
        line.extend_from_slice(b"\r\n");
        line
    }
}
