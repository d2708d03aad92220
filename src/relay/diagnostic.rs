//! Plain-text diagnostics written straight to a rejected client.
//!
//! The block is a blank separator, `"<code>: <short>"` and
//! `"<long>: <cause>"`, each CRLF-terminated. There is no status line and
//! no body; the connection is closed right after.

use std::fmt;

use tokio::io::{self, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: u16,
    pub short: &'static str,
    pub long: &'static str,
    pub cause: String,
}

impl Diagnostic {
    pub fn new(code: u16, short: &'static str, long: &'static str, cause: impl Into<String>) -> Self {
        Self {
            code,
            short,
            long,
            cause: cause.into(),
        }
    }

    pub fn bad_request(long: &'static str, cause: impl Into<String>) -> Self {
        Self::new(400, "Bad Request", long, cause)
    }

    /// Wire form of the diagnostic.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.to_bytes()).await?;
        writer.flush().await
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\r\n{}: {}\r\n{}: {}\r\n",
            self.code, self.short, self.long, self.cause
        )
    }
}
