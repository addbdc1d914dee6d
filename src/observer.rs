//! Response-observing decorator.

use std::io;

use http::{HeaderMap, StatusCode};

use crate::writer::ResponseWriter;

/// Wraps a [`ResponseWriter`] and records what went through it.
///
/// Every call is forwarded unchanged. On the side it records the status the
/// response was committed with and the number of body bytes accepted. The
/// observer holds the only mutable borrow of the wrapped sink for its
/// lifetime, so nothing deeper in the chain can write around it.
///
/// A sink that an outer layer already committed keeps its status: the
/// observer reports that one, not whatever the inner chain asks for later.
pub struct ResponseObserver<'w> {
    inner: &'w mut dyn ResponseWriter,
    status: Option<StatusCode>,
    bytes_written: u64,
}

impl<'w> ResponseObserver<'w> {
    pub fn new(inner: &'w mut dyn ResponseWriter) -> Self {
        let status = inner.committed_status();
        Self { inner, status, bytes_written: 0 }
    }

    /// Status the response was committed with; `200 OK` if the handler wrote
    /// nothing or only wrote body bytes.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Total body bytes accepted by the wrapped sink.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl ResponseWriter for ResponseObserver<'_> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn committed_status(&self) -> Option<StatusCode> {
        self.inner.committed_status()
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status.get_or_insert(status);
        self.inner.write_header(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.status.get_or_insert(StatusCode::OK);
        let n = self.inner.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }
}
