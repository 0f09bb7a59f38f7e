//! Framed I/O for IMAP.
//!
//! Responses are CRLF-terminated lines that may embed `{n}` literals; a
//! response only ends at a line that does not announce a literal.

#![allow(clippy::missing_errors_doc)]

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::response::Response;
use crate::{Error, Result};

const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Maximum literal size. Only header blocks are fetched, so this is small.
const MAX_LITERAL_SIZE: usize = 4 * 1024 * 1024;

/// Line-oriented reader/writer over an IMAP stream.
pub struct FramedStream<S> {
    reader: BufReader<S>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
        }
    }

    /// Reads one complete response, collecting any literals.
    pub async fn read_response(&mut self) -> Result<Response> {
        let mut response = Response::default();

        loop {
            let line = self.read_line().await?;
            response.text.push_str(&String::from_utf8_lossy(trim_eol(&line)));

            let Some(len) = parse_literal_length(&line) else {
                break;
            };
            if len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }
            let mut literal = vec![0u8; len];
            self.reader.read_exact(&mut literal).await?;
            response.literals.push(literal);
        }

        Ok(response)
    }

    /// Reads responses until the tagged completion for `tag`.
    ///
    /// An untagged `BYE` ends the exchange early with [`Error::Bye`].
    pub async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Response>> {
        let mut responses = Vec::new();
        loop {
            let response = self.read_response().await?;
            if let Some(text) = response.bye_text() {
                return Err(Error::Bye(text.to_string()));
            }
            let done = response.is_tagged(tag);
            responses.push(response);
            if done {
                return Ok(responses);
            }
        }
    }

    /// Reads a single line, including its terminator.
    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let mut limited = (&mut self.reader).take(MAX_LINE_LENGTH as u64);
        limited.read_until(b'\n', &mut line).await?;

        if line.ends_with(b"\n") {
            return Ok(line);
        }
        if line.len() >= MAX_LINE_LENGTH {
            return Err(Error::Protocol("line too long".to_string()));
        }
        Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed",
        )))
    }

    /// Writes a command and flushes.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Returns a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Buffered data is discarded; only call this between exchanges.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Parses a trailing literal announcement: `{123}` or `{123+}` before CRLF.
fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\n")?;
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;
    std::str::from_utf8(&line[open + 1..]).ok()?.parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    #[test]
    fn literal_length() {
        assert_eq!(parse_literal_length(b"BODY {123}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"BODY {123+}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(parse_literal_length(b"no literal\r\n"), None);
        assert_eq!(parse_literal_length(b"incomplete {123"), None);
        assert_eq!(parse_literal_length(b"wrong {abc}\r\n"), None);
    }

    #[tokio::test]
    async fn reads_simple_line() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut framed = FramedStream::new(mock);
        let response = framed.read_response().await.unwrap();
        assert_eq!(response.text, "* OK ready");
        assert!(response.literals.is_empty());
    }

    #[tokio::test]
    async fn reads_literal_across_chunks() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (UID 5 BODY[HEADER] {5}\r")
            .read(b"\nhel")
            .read(b"lo)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        let response = framed.read_response().await.unwrap();
        assert_eq!(response.text, "* 1 FETCH (UID 5 BODY[HEADER] {5})");
        assert_eq!(response.literals, vec![b"hello".to_vec()]);
    }

    #[tokio::test]
    async fn collects_until_tagged() {
        let mock = Builder::new()
            .read(b"* SEARCH 1 2\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        let responses = framed.read_until_tagged("A0001").await.unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1].text, "A0001 OK done");
    }

    #[tokio::test]
    async fn bye_aborts_exchange() {
        let mock = Builder::new().read(b"* BYE idle timeout\r\n").build();
        let mut framed = FramedStream::new(mock);
        let err = framed.read_until_tagged("A0001").await.unwrap_err();
        assert!(matches!(err, Error::Bye(text) if text == "idle timeout"));
    }

    #[tokio::test]
    async fn oversized_literal_is_rejected() {
        let header = format!("* 1 FETCH (BODY {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);
        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("literal too large"));
    }

    #[tokio::test]
    async fn overlong_line_is_rejected() {
        let long_line = "A".repeat(MAX_LINE_LENGTH);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);
        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }

    #[tokio::test]
    async fn eof_is_an_error() {
        let mock = Builder::new().read(b"* OK partial").build();
        let mut framed = FramedStream::new(mock);
        assert!(matches!(framed.read_response().await, Err(Error::Io(_))));
    }
}
