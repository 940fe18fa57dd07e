// Per-connection upload handling
pub mod outcome;
pub mod processor;
pub mod store;

pub use outcome::{NotifyKind, OutcomeSink};
pub use store::{DiskStore, FileStore};

use std::io::{Read, Write};

use http::StatusCode;

use crate::config::{Srv, UploadCfg};
use crate::http::{read_head, HttpResponse, RequestHead};

use outcome::sink_for;
use processor::process;

/// Everything a connection needs, fixed at construction and shared
/// read-only between workers.
pub struct UploadService {
    buf_size: usize,
    max_header: usize,
    upload: UploadCfg,
    store: Box<dyn FileStore>,
    sink: Box<dyn OutcomeSink>,
}

/// What happened on one connection, for access logging.
#[derive(Debug)]
pub struct Served {
    pub status: Option<StatusCode>,
    pub method: String,
    pub file_name: Option<String>,
}

impl UploadService {
    pub fn new(srv: &Srv, upload: UploadCfg) -> Self {
        let store = Box::new(DiskStore::new(upload.storage_dir.clone()));
        let sink = sink_for(upload.notify);
        Self::with_parts(srv, upload, store, sink)
    }

    pub fn with_parts(
        srv: &Srv,
        upload: UploadCfg,
        store: Box<dyn FileStore>,
        sink: Box<dyn OutcomeSink>,
    ) -> Self {
        UploadService {
            buf_size: srv.buffer_size,
            max_header: srv.max_header_size,
            upload,
            store,
            sink,
        }
    }

    /// Serve exactly one request on `c` and write exactly one response
    /// (none if the peer sent nothing at all).
    pub fn handle<S: Read + Write>(&self, c: &mut S) -> std::io::Result<Served> {
        let (resp, method, file_name) = match read_head(c, self.buf_size, self.max_header) {
            Ok(RequestHead::Closed) => {
                return Ok(Served { status: None, method: String::new(), file_name: None });
            }
            Ok(RequestHead::Preflight) => (HttpResponse::preflight(), "OPTIONS".to_string(), None),
            Ok(RequestHead::Upload { head, leftover }) => {
                let p = process(&head, &leftover, c, self.store.as_ref(), &self.upload);
                self.sink.report(&p.outcome);
                (p.response, p.request.method, p.request.file_name)
            }
            Err(e) => {
                tracing::debug!(error = %e, "rejecting request");
                (HttpResponse::error(e.status()), String::new(), None)
            }
        };

        let out = resp.to_bytes();
        c.write_all(&out)?;
        c.flush()?;
        crate::metrics::add_bytes_out(out.len() as u64);
        Ok(Served { status: Some(resp.status), method, file_name })
    }
}
