// Validation, body assembly and persistence for one upload request
use std::io::{ErrorKind, Read};

use crate::config::UploadCfg;
use crate::error::UploadError;
use crate::http::{HttpResponse, UploadRequest};

use super::outcome::UploadOutcome;
use super::store::{check_file_name, FileStore};

const READ_CHUNK: usize = 16 * 1024;

pub struct Processed {
    pub request: UploadRequest,
    pub response: HttpResponse,
    pub outcome: UploadOutcome,
}

/// Run the whole pipeline for a framed head. `leftover` holds body bytes that
/// arrived together with the head; the rest is pulled from `body`.
pub fn process(
    head: &[u8],
    leftover: &[u8],
    body: &mut impl Read,
    store: &dyn FileStore,
    cfg: &UploadCfg,
) -> Processed {
    let request = UploadRequest::parse(head);
    let mut outcome = UploadOutcome::new(
        request.file_name.clone(),
        store.root().to_path_buf(),
        request.content_length,
    );

    let response = match save_upload(&request, leftover, body, store, cfg) {
        Ok(written) => {
            outcome.success = true;
            outcome.bytes_written = written;
            HttpResponse::uploaded()
        }
        Err(e) => {
            outcome.reason = Some(e.to_string());
            HttpResponse::error(e.status())
        }
    };
    Processed { request, response, outcome }
}

fn save_upload(
    req: &UploadRequest,
    leftover: &[u8],
    src: &mut impl Read,
    store: &dyn FileStore,
    cfg: &UploadCfg,
) -> Result<usize, UploadError> {
    authorize(req.security_code.as_deref(), &cfg.security_code)?;

    let name = req
        .file_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or(UploadError::MissingFileName)?;
    check_file_name(name)?;

    let len = body_length(req.content_length, cfg.max_body_size)?;
    let data = read_body(leftover, src, len)?;

    if data.len() < len {
        crate::metrics::inc_truncated();
        if cfg.reject_truncated {
            return Err(UploadError::TruncatedBody { expected: len, received: data.len() });
        }
        tracing::warn!(file = name, expected = len, received = data.len(), "peer closed before full body, saving what arrived");
    }

    store.save(name, &data)?;
    Ok(data.len())
}

/// Exact, case-sensitive match. Every byte is compared even after a mismatch.
pub fn authorize(given: Option<&str>, secret: &str) -> Result<(), UploadError> {
    let given = match given {
        Some(g) if !g.is_empty() => g.as_bytes(),
        _ => return Err(UploadError::AuthFailed),
    };
    let expected = secret.as_bytes();
    if given.len() != expected.len() {
        return Err(UploadError::AuthFailed);
    }
    let diff = given.iter().zip(expected).fold(0u8, |acc, (a, b)| acc | (a ^ b));
    if diff != 0 {
        return Err(UploadError::AuthFailed);
    }
    Ok(())
}

pub fn body_length(declared: i64, limit: usize) -> Result<usize, UploadError> {
    if declared <= 0 {
        return Err(UploadError::InvalidContentLength(declared));
    }
    let len = usize::try_from(declared).map_err(|_| UploadError::AllocationFailure(usize::MAX))?;
    if len > limit {
        return Err(UploadError::BodyTooLarge { declared: len, limit });
    }
    Ok(len)
}

/// Assemble up to `len` body bytes. A read returning 0 or failing ends the
/// loop early; the caller decides what a short buffer means.
pub fn read_body(leftover: &[u8], src: &mut impl Read, len: usize) -> Result<Vec<u8>, UploadError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| UploadError::AllocationFailure(len))?;
    data.extend_from_slice(&leftover[..leftover.len().min(len)]);

    let mut chunk = vec![0u8; READ_CHUNK.min(len)];
    while data.len() < len {
        let want = (len - data.len()).min(chunk.len());
        match src.read(&mut chunk[..want]) {
            Ok(0) => break,
            Ok(n) => {
                crate::metrics::add_bytes_in(n as u64);
                data.extend_from_slice(&chunk[..n]);
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(error = %e, received = data.len(), expected = len, "body read failed");
                break;
            }
        }
    }
    Ok(data)
}
