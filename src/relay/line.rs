//! Bounded line reading over any async byte stream.
//!
//! Both the client request head and the origin response are consumed
//! line by line. A line never grows past the configured read buffer size;
//! when it would, the caller gets the bytes read so far and decides
//! whether that is a protocol error (request head) or just a chunk
//! boundary (response relay).

use tokio::io::{self, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// What a single [`LineReader::next_line`] call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// A full line including its `\n` terminator.
    Complete,
    /// The stream ended after some bytes but before a terminator.
    Partial,
    /// The line reached the size limit without a terminator.
    Truncated,
    /// The stream ended before any byte was read.
    Eof,
}

/// Buffered reader handing out lines of at most `max_line` bytes.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: BufReader<R>,
    max_line: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R, max_line: usize) -> Self {
        Self {
            inner: BufReader::with_capacity(max_line, inner),
            max_line,
        }
    }

    /// Read the next line into `buf`, replacing its contents.
    pub async fn next_line(&mut self, buf: &mut Vec<u8>) -> io::Result<LineStatus> {
        buf.clear();
        let limit = self.max_line as u64;
        let read = (&mut self.inner).take(limit).read_until(b'\n', buf).await?;

        Ok(if read == 0 {
            LineStatus::Eof
        } else if buf.ends_with(b"\n") {
            LineStatus::Complete
        } else if read == self.max_line {
            LineStatus::Truncated
        } else {
            LineStatus::Partial
        })
    }

    pub fn max_line(&self) -> usize {
        self.max_line
    }

    /// Access to the buffered reader for exact-length body transfer, so
    /// bytes already pulled in while reading lines are not lost.
    pub fn buffered(&mut self) -> &mut BufReader<R> {
        &mut self.inner
    }

    /// The underlying stream, for writing back to the peer.
    pub fn get_mut(&mut self) -> &mut R {
        self.inner.get_mut()
    }
}
