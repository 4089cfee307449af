//! Response body wrapper that records what it streams.
//!
//! [`record`] wraps a response so that every data frame is passed through
//! to the client unchanged while a bounded copy is kept. When the body
//! ends, errors, or is dropped (client went away), the completed
//! [`AuditEntry`] is submitted exactly once.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::body::Body;
use axum::response::Response;
use bytes::{Bytes, BytesMut};
use hyper::body::{Body as HttpBody, Frame, SizeHint};

use super::entry::{snapshot_headers, AuditEntry};
use super::AuditLogger;

/// Attach audit recording to a response. A no-op when auditing is disabled.
#[must_use]
pub fn record(response: Response, mut entry: AuditEntry, audit: &AuditLogger) -> Response {
    if !audit.is_enabled() {
        return response;
    }

    entry.response_status = response.status().as_u16();
    entry.response_headers = snapshot_headers(response.headers());
    let audit = audit.clone();
    response.map(|body| Body::new(RecordingBody::new(body, entry, audit)))
}

pub struct RecordingBody {
    inner: Body,
    captured: BytesMut,
    limit: usize,
    truncated: bool,
    entry: Option<AuditEntry>,
    audit: AuditLogger,
}

impl RecordingBody {
    fn new(inner: Body, entry: AuditEntry, audit: AuditLogger) -> Self {
        Self {
            inner,
            captured: BytesMut::new(),
            limit: audit.max_body_capture(),
            truncated: false,
            entry: Some(entry),
            audit,
        }
    }

    fn capture(&mut self, data: &Bytes) {
        let room = self.limit.saturating_sub(self.captured.len());
        if data.len() > room {
            self.truncated = true;
        }
        self.captured
            .extend_from_slice(&data[..data.len().min(room)]);
    }

    fn finish(&mut self) {
        if let Some(mut entry) = self.entry.take() {
            entry.response_body = String::from_utf8_lossy(&self.captured).into_owned();
            entry.truncated |= self.truncated;
            self.audit.submit(entry);
        }
    }
}

impl HttpBody for RecordingBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.capture(data);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => {
                this.finish();
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.finish();
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for RecordingBody {
    fn drop(&mut self) {
        self.finish();
    }
}
