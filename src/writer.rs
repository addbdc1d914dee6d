//! The response sink handlers write into.
//!
//! A response is committed exactly once: the first [`write_header`] call, or
//! the first [`write`] (which commits `200 OK`), fixes the status and the
//! headers. After that only body bytes can be added. Later status calls are
//! ignored, as are header edits.
//!
//! [`write_header`]: ResponseWriter::write_header
//! [`write`]: ResponseWriter::write

use std::io;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use tracing::debug;

/// Response sink: set the status once, then write bytes any number of times.
///
/// Implemented by [`ResponseBuffer`] (the server's per-request sink) and by
/// decorators such as [`ResponseObserver`](crate::ResponseObserver).
pub trait ResponseWriter: Send {
    /// Headers to be sent with the response.
    fn headers(&self) -> &HeaderMap;

    /// Mutable access to the headers. Edits after the response is committed
    /// have no effect.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// The status the response was committed with, or `None` while nothing
    /// is committed.
    fn committed_status(&self) -> Option<StatusCode>;

    /// Commits the response with `status`. Only the first call counts.
    fn write_header(&mut self, status: StatusCode);

    /// Appends `buf` to the body, committing `200 OK` first if nothing was
    /// committed yet. Returns the number of bytes accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Writes the entire buffer.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf)? {
                0 => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }
}

// ── ResponseBuffer ────────────────────────────────────────────────────────────

/// In-memory response sink.
///
/// The server creates one per request and turns it into a hyper response once
/// the handler chain returns. Tests use it as a recorder.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    headers: HeaderMap,
    committed: Option<(StatusCode, HeaderMap)>,
    body: BytesMut,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed status, or `200 OK` if nothing has been written.
    pub fn status(&self) -> StatusCode {
        self.committed.as_ref().map_or(StatusCode::OK, |(status, _)| *status)
    }

    pub fn is_committed(&self) -> bool {
        self.committed.is_some()
    }

    /// The headers that will be sent: the committed ones, or the pending ones
    /// if nothing was committed yet.
    pub fn sent_headers(&self) -> &HeaderMap {
        self.committed.as_ref().map_or(&self.headers, |(_, headers)| headers)
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.sent_headers().get(name)?.to_str().ok()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as UTF-8, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Converts into the response hyper sends.
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        let (status, headers) = self.committed.unwrap_or((StatusCode::OK, self.headers));
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl ResponseWriter for ResponseBuffer {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn committed_status(&self) -> Option<StatusCode> {
        self.committed.as_ref().map(|(status, _)| *status)
    }

    fn write_header(&mut self, status: StatusCode) {
        if let Some((committed, _)) = &self.committed {
            debug!(%committed, ignored = %status, "superfluous write_header call");
            return;
        }
        self.committed = Some((status, self.headers.clone()));
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.committed.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }
}
