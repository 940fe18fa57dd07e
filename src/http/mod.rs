// Request framing: method sniffing and the header/body split
mod request;
mod response;
pub use request::{leading_int, UploadRequest};
pub use response::HttpResponse;

use bytes::{Bytes, BytesMut};
use std::io::{ErrorKind, Read};

use crate::error::UploadError;

pub fn find_hdr_end(d: &[u8]) -> Option<usize> {
    if d.len() < 4 { return None; }
    for i in 0..=(d.len() - 4) {
        if &d[i..i + 4] == b"\r\n\r\n" { return Some(i); }
    }
    None
}

/// First whitespace-delimited token and whether whitespace already follows it.
pub fn method_token(d: &[u8]) -> Option<(&[u8], bool)> {
    let start = d.iter().position(|b| !b.is_ascii_whitespace())?;
    let rest = &d[start..];
    match rest.iter().position(|b| b.is_ascii_whitespace()) {
        Some(end) => Some((&rest[..end], true)),
        None => Some((rest, false)),
    }
}

pub fn is_preflight(method: &[u8]) -> bool {
    method.eq_ignore_ascii_case(b"OPTIONS")
}

#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// CORS preflight; nothing past the method is needed.
    Preflight,
    /// `head_len` covers the request line, headers and the blank line.
    Complete { head_len: usize },
    Incomplete,
}

/// Classify the bytes received so far. OPTIONS wins before any
/// header-completeness check.
pub fn frame(d: &[u8]) -> Frame {
    if let Some((m, true)) = method_token(d) {
        if is_preflight(m) { return Frame::Preflight; }
    }
    match find_hdr_end(d) {
        Some(p) => Frame::Complete { head_len: p + 4 },
        None => Frame::Incomplete,
    }
}

#[derive(Debug)]
pub enum RequestHead {
    Preflight,
    Upload { head: Bytes, leftover: Bytes },
    /// Peer closed without sending a single byte.
    Closed,
}

/// Accumulate reads until the head is framed. Gives up with
/// `IncompleteHeaders` once `max_header` bytes are buffered without a
/// terminator, or when the peer stops sending first.
pub fn read_head(r: &mut impl Read, buf_size: usize, max_header: usize) -> Result<RequestHead, UploadError> {
    let mut d = BytesMut::with_capacity(buf_size);
    let mut b = vec![0u8; buf_size.max(1)];

    loop {
        match frame(&d) {
            Frame::Preflight => return Ok(RequestHead::Preflight),
            Frame::Complete { head_len } => {
                if head_len > max_header {
                    return Err(UploadError::IncompleteHeaders);
                }
                let head = d.split_to(head_len).freeze();
                return Ok(RequestHead::Upload { head, leftover: d.freeze() });
            }
            Frame::Incomplete if d.len() > max_header => {
                return Err(UploadError::IncompleteHeaders);
            }
            Frame::Incomplete => {}
        }

        match r.read(&mut b) {
            Ok(0) => break,
            Ok(n) => {
                crate::metrics::add_bytes_in(n as u64);
                d.extend_from_slice(&b[..n]);
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(error = %e, buffered = d.len(), "read failed before end of head");
                break;
            }
        }
    }

    if d.is_empty() {
        return Ok(RequestHead::Closed);
    }
    // "OPTIONS" with nothing after it is still a preflight.
    if method_token(&d).is_some_and(|(m, _)| is_preflight(m)) {
        return Ok(RequestHead::Preflight);
    }
    Err(UploadError::IncompleteHeaders)
}
