//! Buffered response writer.
//!
//! # Responsibilities
//! - Hold status, headers and body until the chain finishes
//! - Commit the status once: the first explicit status (or the implicit 200
//!   of a body write) wins, later attempts are logged and dropped
//! - Set `Content-Type` once: the first setter wins

use std::io;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Response, StatusCode};

#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit `code` unless a status is already committed.
    /// Returns whether `code` was applied.
    pub fn write_header(&mut self, code: StatusCode) -> bool {
        match self.status {
            Some(current) => {
                tracing::warn!(
                    current = current.as_u16(),
                    attempted = code.as_u16(),
                    "status already written, ignoring"
                );
                false
            }
            None => {
                self.status = Some(code);
                true
            }
        }
    }

    /// Set `Content-Type` unless it is already present.
    pub fn write_content_type(&mut self, value: HeaderValue) {
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers.insert(header::CONTENT_TYPE, value);
        }
    }

    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.headers.get(header::CONTENT_TYPE)
    }

    /// Status that will be sent; 200 until something commits another.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn is_committed(&self) -> bool {
        self.status.is_some()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response<Bytes> {
        let status = self.status();
        let mut response = Response::new(Bytes::from(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn first_status_wins() {
        let mut writer = ResponseWriter::new();
        assert!(writer.write_header(StatusCode::CREATED));
        assert!(!writer.write_header(StatusCode::BAD_REQUEST));
        assert_eq!(writer.into_response().status(), StatusCode::CREATED);
    }

    #[test]
    fn repeating_the_committed_status_is_still_rejected() {
        let mut writer = ResponseWriter::new();
        assert!(writer.write_header(StatusCode::ACCEPTED));
        assert!(!writer.write_header(StatusCode::ACCEPTED));
        assert!(writer.is_committed());
        assert_eq!(writer.status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn body_write_commits_ok() {
        let mut writer = ResponseWriter::new();
        writer.write_all(b"hello").unwrap();
        assert!(!writer.write_header(StatusCode::NOT_FOUND));

        let response = writer.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"hello");
    }

    #[test]
    fn first_content_type_wins() {
        let mut writer = ResponseWriter::new();
        writer.write_content_type(HeaderValue::from_static("application/json"));
        writer.write_content_type(HeaderValue::from_static("text/plain"));
        assert_eq!(writer.content_type().unwrap(), "application/json");
    }

    #[test]
    fn untouched_writer_is_empty_ok() {
        let response = ResponseWriter::new().into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
        assert!(response.headers().is_empty());
    }
}
