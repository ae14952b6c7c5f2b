//! Wire protocol implementation
//!
//! Decodes RESP2 requests: arrays of bulk strings, plus the inline form
//! (`PING\r\n`) used by telnet-style clients.

use crate::config::ServerConfig;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Protocol error types
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid length: {0}")]
    InvalidLength(String),

    #[error("expected '$', got '{0}'")]
    ExpectedBulk(char),

    #[error("invalid bulk terminator")]
    InvalidTerminator,

    #[error("bulk string too large: {0} bytes")]
    BulkTooLarge(usize),

    #[error("too many arguments: {0}")]
    TooManyArgs(usize),

    #[error("line too long")]
    LineTooLong,

    #[error("unexpected end of data")]
    UnexpectedEof,
}

/// Read one line without its trailing `\r\n` (or bare `\n`) into `buf`
///
/// Returns `false` on a clean end of stream before any byte was read.
async fn read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_len: usize,
) -> Result<bool, ProtocolError> {
    buf.clear();
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            if buf.is_empty() {
                return Ok(false);
            }
            return Err(ProtocolError::UnexpectedEof);
        }
        let (take, done) = match chunk.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (chunk.len(), false),
        };
        if buf.len() + take > max_len + 2 {
            return Err(ProtocolError::LineTooLong);
        }
        buf.extend_from_slice(&chunk[..take]);
        reader.consume(take);
        if done {
            break;
        }
    }
    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(true)
}

fn parse_len(digits: &[u8]) -> Result<i64, ProtocolError> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| ProtocolError::InvalidLength(String::from_utf8_lossy(digits).into_owned()))
}

/// Split an inline command on ASCII whitespace
fn split_inline(line: &[u8]) -> Vec<Vec<u8>> {
    line.split(|b| b.is_ascii_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| word.to_vec())
        .collect()
}

/// Read one request
///
/// Returns `Ok(None)` when the client closed the connection between requests
/// and `Ok(Some(vec![]))` for blank lines and null arrays, which callers skip.
pub async fn read_request<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    config: &ServerConfig,
) -> Result<Option<Vec<Vec<u8>>>, ProtocolError> {
    let mut line = Vec::new();
    if !read_line(reader, &mut line, config.max_inline_len).await? {
        return Ok(None);
    }
    if line.first() != Some(&b'*') {
        return Ok(Some(split_inline(&line)));
    }

    let count = parse_len(&line[1..])?;
    if count <= 0 {
        return Ok(Some(Vec::new()));
    }
    let count = count as usize;
    if count > config.max_args {
        return Err(ProtocolError::TooManyArgs(count));
    }

    let mut args = Vec::with_capacity(count.min(1024));
    let mut header = Vec::new();
    for _ in 0..count {
        if !read_line(reader, &mut header, config.max_inline_len).await? {
            return Err(ProtocolError::UnexpectedEof);
        }
        match header.first() {
            Some(b'$') => {}
            Some(&other) => return Err(ProtocolError::ExpectedBulk(other as char)),
            None => return Err(ProtocolError::ExpectedBulk(' ')),
        }
        let len = parse_len(&header[1..])?;
        if len < 0 {
            args.push(Vec::new());
            continue;
        }
        let len = len as usize;
        if len > config.max_bulk_len {
            return Err(ProtocolError::BulkTooLarge(len));
        }
        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data).await.map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ProtocolError::UnexpectedEof,
            _ => ProtocolError::Io(e),
        })?;
        if &data[len..] != b"\r\n" {
            return Err(ProtocolError::InvalidTerminator);
        }
        data.truncate(len);
        args.push(data);
    }
    Ok(Some(args))
}
