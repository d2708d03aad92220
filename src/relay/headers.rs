//! Header table, header-line lexing and outbound request assembly.
//!
//! # Header block accumulation
//! ```text
//! seed table with proxy headers (Connection, Proxy-Connection, Host, User-Agent)
//!     → read_segment(): lines into a fresh segment table
//!         blank line            → Complete
//!         remaining < margin    → Continue (last line already stored)
//!     → merge segment into the request table (first seen wins)
//!     → repeat on Continue with a fresh buffer
//! ```
//!
//! Names and values are kept as raw bytes and written back unchanged.
//! Header names match ASCII case-insensitively; the stored spelling is
//! the one seen first.

use thiserror::Error;
use tokio::io::AsyncRead;

use crate::config::RelayConfig;
use crate::relay::error::RelayError;
use crate::relay::line::{LineReader, LineStatus};
use crate::relay::request::RequestLine;

/// Protocol violations inside the header block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("header line has no colon: {0:?}")]
    MissingColon(String),
    #[error("header line has an empty name")]
    EmptyName,
    #[error("header name {0:?} contains whitespace")]
    WhitespaceInName(String),
    #[error("header line exceeds {0} bytes")]
    LineTooLong(usize),
}

/// Ordered name → value store with first-write-wins insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTable {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl HeaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding the headers the proxy always sends.
    pub fn seeded(host: &str, user_agent: &str) -> Self {
        let mut table = Self::new();
        table.put("Connection", "close");
        table.put("Proxy-Connection", "close");
        table.put("Host", host);
        table.put("User-Agent", user_agent);
        table
    }

    /// Insert or overwrite.
    pub fn put(&mut self, name: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        let (name, value) = (name.as_ref(), value.as_ref());
        match self.position(name) {
            Some(i) => self.entries[i].1 = value.to_vec(),
            None => self.entries.push((name.to_vec(), value.to_vec())),
        }
    }

    /// Insert unless the name is already present. Returns whether the
    /// entry was stored.
    pub fn insert_if_absent(&mut self, name: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> bool {
        let name = name.as_ref();
        if self.position(name).is_some() {
            return false;
        }
        self.entries.push((name.to_vec(), value.as_ref().to_vec()));
        true
    }

    pub fn get(&self, name: impl AsRef<[u8]>) -> Option<&[u8]> {
        self.position(name.as_ref())
            .map(|i| self.entries[i].1.as_slice())
    }

    /// Fold `other` in, keeping existing entries on conflicts.
    pub fn merge(&mut self, other: HeaderTable) {
        for (name, value) in other.entries {
            if self.position(&name).is_none() {
                self.entries.push((name, value));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries
            .iter()
            .map(|(n, v)| (n.as_slice(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append every entry as `Name: value\r\n`.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        for (name, value) in self.iter() {
            buf.extend_from_slice(name);
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value);
            buf.extend_from_slice(b"\r\n");
        }
    }

    fn position(&self, name: &[u8]) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

/// One lexed header-block line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLine<'a> {
    /// The empty line ending the block.
    End,
    Field { name: &'a [u8], value: &'a [u8] },
}

impl<'a> HeaderLine<'a> {
    /// Split a raw line at its first colon. One separating space or tab
    /// after the colon is dropped; the rest of the value is kept as is.
    /// Names containing whitespace are refused, so `Host : x` cannot
    /// pose as a second `Host`.
    pub fn lex(line: &'a [u8]) -> Result<Self, HeaderError> {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return Ok(Self::End);
        }

        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or_else(|| HeaderError::MissingColon(String::from_utf8_lossy(line).into_owned()))?;
        let (name, rest) = (&line[..colon], &line[colon + 1..]);
        if name.is_empty() {
            return Err(HeaderError::EmptyName);
        }
        if name.iter().any(u8::is_ascii_whitespace) {
            return Err(HeaderError::WhitespaceInName(
                String::from_utf8_lossy(name).into_owned(),
            ));
        }
        let value = rest
            .strip_prefix(b" ")
            .or_else(|| rest.strip_prefix(b"\t"))
            .unwrap_or(rest);

        Ok(Self::Field { name, value })
    }
}

/// Outcome of reading one buffer's worth of header lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentSignal {
    /// The blank line was reached.
    Complete,
    /// The buffer is nearly full; read another segment.
    Continue,
}

/// Read header lines into `segment` until the block ends or fewer than
/// `continuation_margin` bytes of the buffer remain.
///
/// `already_used` is how much of the buffer is taken before the first
/// header line (the rewritten request line for the first segment).
pub async fn read_segment<R>(
    reader: &mut LineReader<R>,
    segment: &mut HeaderTable,
    already_used: usize,
    relay: &RelayConfig,
) -> Result<SegmentSignal, RelayError>
where
    R: AsyncRead + Unpin,
{
    let capacity = relay.read_buffer_size;
    let mut used = already_used;
    let mut line = Vec::with_capacity(capacity);

    loop {
        match reader.next_line(&mut line).await.map_err(RelayError::ClientIo)? {
            LineStatus::Complete => {}
            LineStatus::Truncated => {
                return Err(HeaderError::LineTooLong(reader.max_line()).into())
            }
            LineStatus::Partial | LineStatus::Eof => return Err(RelayError::ClientClosed),
        }

        match HeaderLine::lex(&line)? {
            HeaderLine::End => return Ok(SegmentSignal::Complete),
            HeaderLine::Field { name, value } => {
                segment.insert_if_absent(name, value);
            }
        }

        used += line.len();
        if capacity.saturating_sub(used) < relay.continuation_margin {
            return Ok(SegmentSignal::Continue);
        }
    }
}

/// The merged header table of one request.
#[derive(Debug, Clone)]
pub struct AssembledHeaders {
    pub table: HeaderTable,
    /// Number of read buffers the client's header block occupied.
    pub segments: usize,
}

impl AssembledHeaders {
    /// Whether the block needed more than one read buffer.
    pub fn spilled(&self) -> bool {
        self.segments > 1
    }
}

/// Read the whole client header block on top of the proxy-mandated
/// headers for `host`.
pub async fn assemble<R>(
    reader: &mut LineReader<R>,
    request_line_len: usize,
    host: &str,
    relay: &RelayConfig,
) -> Result<AssembledHeaders, RelayError>
where
    R: AsyncRead + Unpin,
{
    let mut table = HeaderTable::seeded(host, &relay.user_agent);
    let mut already_used = request_line_len;
    let mut segments = 0;

    loop {
        let mut segment = HeaderTable::new();
        let signal = read_segment(reader, &mut segment, already_used, relay).await?;
        table.merge(segment);
        segments += 1;

        match signal {
            SegmentSignal::Complete => break,
            SegmentSignal::Continue => {
                tracing::trace!(segments, "header block continues into another buffer");
                already_used = 0;
            }
        }
    }

    Ok(AssembledHeaders { table, segments })
}

/// The exact bytes sent to the origin before any body: the rewritten
/// request line, every header, and the terminating blank line.
pub fn encode_request(
    request: &RequestLine,
    path: &[u8],
    headers: &AssembledHeaders,
    relay: &RelayConfig,
) -> Vec<u8> {
    let capacity = if headers.spilled() {
        relay.read_buffer_size * relay.oversize_multiplier
    } else {
        relay.read_buffer_size
    };

    let mut buf = Vec::with_capacity(capacity);
    buf.extend_from_slice(&request.upstream_line(path));
    headers.table.write_to(&mut buf);
    buf.extend_from_slice(b"\r\n");
    buf
}

/// Declared body length of a POST. Missing, non-numeric and
/// non-positive values are all rejected.
pub fn content_length(table: &HeaderTable) -> Result<u64, RelayError> {
    let raw = table
        .get("Content-Length")
        .ok_or(RelayError::BadContentLength(None))?;
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.trim().parse::<u64>().ok())
        .filter(|len| *len > 0)
        .ok_or_else(|| RelayError::BadContentLength(Some(String::from_utf8_lossy(raw).into_owned())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::request::Method;

    fn relay() -> RelayConfig {
        RelayConfig::default()
    }

    async fn assemble_from(input: &[u8], relay: &RelayConfig) -> Result<AssembledHeaders, RelayError> {
        let mut reader = LineReader::new(input, relay.read_buffer_size);
        assemble(&mut reader, 0, "example.com", relay).await
    }

    #[test]
    fn put_overwrites_and_insert_keeps_first() {
        let mut table = HeaderTable::new();
        assert!(table.insert_if_absent("Accept", "text/html"));
        assert!(!table.insert_if_absent("accept", "*/*"));
        assert_eq!(table.get("ACCEPT"), Some(&b"text/html"[..]));

        table.put("Accept", "*/*");
        assert_eq!(table.get("Accept"), Some(&b"*/*"[..]));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn lexes_fields_and_terminator() {
        assert_eq!(HeaderLine::lex(b"\r\n"), Ok(HeaderLine::End));
        assert_eq!(HeaderLine::lex(b"\n"), Ok(HeaderLine::End));
        assert_eq!(
            HeaderLine::lex(b"Host: a:80\r\n"),
            Ok(HeaderLine::Field {
                name: &b"Host"[..],
                value: &b"a:80"[..]
            })
        );
        assert_eq!(
            HeaderLine::lex(b"X-Empty:\r\n"),
            Ok(HeaderLine::Field {
                name: &b"X-Empty"[..],
                value: &b""[..]
            })
        );
        assert_eq!(
            HeaderLine::lex(b"no colon here\r\n"),
            Err(HeaderError::MissingColon("no colon here".into()))
        );
        assert_eq!(HeaderLine::lex(b": v\r\n"), Err(HeaderError::EmptyName));
    }

    #[test]
    fn whitespace_in_name_is_rejected() {
        assert_eq!(
            HeaderLine::lex(b"Host : evil.example\r\n"),
            Err(HeaderError::WhitespaceInName("Host ".into()))
        );
        assert_eq!(
            HeaderLine::lex(b" Host: evil.example\r\n"),
            Err(HeaderError::WhitespaceInName(" Host".into()))
        );
    }

    #[tokio::test]
    async fn spaced_host_cannot_slip_past_injected_host() {
        let err = assemble_from(b"Host : evil.example\r\n\r\n", &relay())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RelayError::BadHeaders(HeaderError::WhitespaceInName(_))
        ));
        assert_eq!(
            err.diagnostic().unwrap().to_bytes(),
            b"\r\n400: Bad Request\r\nDenied due to: Bad headers\r\n"
        );
    }

    #[tokio::test]
    async fn obs_text_values_are_kept_byte_for_byte() {
        let headers = assemble_from(b"X-Name: caf\xE9\r\n\r\n", &relay())
            .await
            .unwrap();
        assert_eq!(headers.table.get("X-Name"), Some(&b"caf\xE9"[..]));

        let mut out = Vec::new();
        headers.table.write_to(&mut out);
        assert!(out.ends_with(b"X-Name: caf\xE9\r\n"));
    }

    #[tokio::test]
    async fn proxy_headers_win_over_client_headers() {
        let input = b"Host: ignored\r\nConnection: keep-alive\r\nAccept: */*\r\n\r\n";
        let headers = assemble_from(input, &relay()).await.unwrap();

        assert_eq!(headers.segments, 1);
        assert_eq!(headers.table.get("Host"), Some(&b"example.com"[..]));
        assert_eq!(headers.table.get("Connection"), Some(&b"close"[..]));
        assert_eq!(headers.table.get("Proxy-Connection"), Some(&b"close"[..]));
        assert_eq!(headers.table.get("Accept"), Some(&b"*/*"[..]));
        assert_eq!(headers.table.len(), 5);
    }

    #[tokio::test]
    async fn duplicate_client_headers_keep_first_value() {
        let input = b"X-Trace: one\r\nX-Trace: two\r\nx-trace: three\r\n\r\n";
        let headers = assemble_from(input, &relay()).await.unwrap();
        assert_eq!(headers.table.get("X-Trace"), Some(&b"one"[..]));
        assert_eq!(headers.table.iter().filter(|(n, _)| n.eq_ignore_ascii_case(b"x-trace")).count(), 1);
    }

    #[tokio::test]
    async fn line_without_colon_is_rejected() {
        let input = b"Accept: */*\r\ngarbage\r\n\r\n";
        let err = assemble_from(input, &relay()).await.unwrap_err();
        assert!(matches!(err, RelayError::BadHeaders(HeaderError::MissingColon(_))));
    }

    #[tokio::test]
    async fn eof_before_blank_line_is_client_close() {
        let err = assemble_from(b"Accept: */*\r\n", &relay()).await.unwrap_err();
        assert!(matches!(err, RelayError::ClientClosed));
    }

    #[tokio::test]
    async fn oversized_line_is_rejected() {
        let relay = RelayConfig {
            read_buffer_size: 256,
            continuation_margin: 16,
            ..RelayConfig::default()
        };
        let mut input = b"X-Long: ".to_vec();
        input.extend(std::iter::repeat(b'a').take(400));
        input.extend_from_slice(b"\r\n\r\n");

        let err = assemble_from(&input, &relay).await.unwrap_err();
        assert!(matches!(err, RelayError::BadHeaders(HeaderError::LineTooLong(256))));
    }

    #[tokio::test]
    async fn segment_signals_continuation_near_capacity() {
        let relay = RelayConfig {
            read_buffer_size: 256,
            continuation_margin: 120,
            ..RelayConfig::default()
        };
        // 8 lines of 20 bytes: the 7th leaves 256 - 140 = 116 < 120.
        let mut input = Vec::new();
        for i in 0..8 {
            input.extend_from_slice(format!("X-Header-{i:02}: value\r\n").as_bytes());
        }
        input.extend_from_slice(b"\r\n");

        let mut reader = LineReader::new(&input[..], relay.read_buffer_size);
        let mut segment = HeaderTable::new();
        let signal = read_segment(&mut reader, &mut segment, 0, &relay).await.unwrap();
        assert_eq!(signal, SegmentSignal::Continue);
        assert_eq!(segment.len(), 7);

        let mut rest = HeaderTable::new();
        let signal = read_segment(&mut reader, &mut rest, 0, &relay).await.unwrap();
        assert_eq!(signal, SegmentSignal::Complete);
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn spilled_block_merges_like_a_single_buffer() {
        let small = RelayConfig {
            read_buffer_size: 256,
            continuation_margin: 120,
            ..RelayConfig::default()
        };
        let mut input = Vec::new();
        for i in 0..40 {
            input.extend_from_slice(format!("X-Header-{}: value-{i}\r\n", i % 25).as_bytes());
        }
        input.extend_from_slice(b"Host: client.example\r\n\r\n");

        let spilled = assemble_from(&input, &small).await.unwrap();
        let single = assemble_from(&input, &relay()).await.unwrap();

        assert!(spilled.spilled());
        assert_eq!(single.segments, 1);
        assert_eq!(spilled.table, single.table);
        assert_eq!(spilled.table.get("X-Header-3"), Some(&b"value-3"[..]));
        assert_eq!(spilled.table.get("Host"), Some(&b"example.com"[..]));
    }

    #[test]
    fn encodes_request_line_headers_and_blank_line() {
        let request = RequestLine {
            method: Method::Get,
            uri: b"http://example.com/index.html".to_vec(),
            client_version: "HTTP/1.1".into(),
        };
        let mut table = HeaderTable::seeded("example.com", "test-agent");
        table.insert_if_absent("Accept", "*/*");
        let headers = AssembledHeaders { table, segments: 1 };

        let bytes = encode_request(&request, b"/index.html", &headers, &relay());
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "GET /index.html HTTP/1.0\r\n\
             Connection: close\r\n\
             Proxy-Connection: close\r\n\
             Host: example.com\r\n\
             User-Agent: test-agent\r\n\
             Accept: */*\r\n\
             \r\n"
        );
    }

    #[test]
    fn spilled_requests_get_an_enlarged_buffer() {
        let request = RequestLine {
            method: Method::Get,
            uri: b"/".to_vec(),
            client_version: "HTTP/1.0".into(),
        };
        let headers = AssembledHeaders {
            table: HeaderTable::new(),
            segments: 3,
        };
        let bytes = encode_request(&request, b"/", &headers, &relay());
        assert!(bytes.capacity() >= relay().read_buffer_size * relay().oversize_multiplier);
    }

    #[test]
    fn content_length_must_be_positive_integer() {
        let mut table = HeaderTable::new();
        assert!(matches!(content_length(&table), Err(RelayError::BadContentLength(None))));

        table.put("Content-Length", "0");
        assert!(matches!(content_length(&table), Err(RelayError::BadContentLength(Some(_)))));

        table.put("Content-Length", "abc");
        assert!(matches!(content_length(&table), Err(RelayError::BadContentLength(Some(_)))));

        table.put("content-length", "42");
        assert_eq!(content_length(&table).unwrap(), 42);
    }
}
