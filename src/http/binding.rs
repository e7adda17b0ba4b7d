//! Request binding: decode a request into a typed value.
//!
//! # Design Decisions
//! - GET requests bind from the query string whatever their content type
//! - Otherwise the `Content-Type` (parameters stripped) picks the decoder
//! - Failures go back to the calling handler; nothing is written to the response

use axum::body::Bytes;
use axum::http::{header, Method, Request};
use serde::de::DeserializeOwned;

use crate::error::BindError;

pub const MIME_JSON: &str = "application/json";
pub const MIME_POST_FORM: &str = "application/x-www-form-urlencoded";
pub const MIME_MULTIPART_FORM: &str = "multipart/form-data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Json,
    Query,
    FormPost,
}

impl Binding {
    /// Pick a binding from the method and `Content-Type`.
    pub fn for_request(method: &Method, content_type: &str) -> Result<Self, BindError> {
        if method == Method::GET {
            return Ok(Binding::Query);
        }
        match mime(content_type) {
            MIME_JSON => Ok(Binding::Json),
            MIME_POST_FORM => Ok(Binding::FormPost),
            MIME_MULTIPART_FORM => Err(BindError::UnsupportedContentType(
                MIME_MULTIPART_FORM.to_string(),
            )),
            _ => Ok(Binding::Query),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Binding::Json => "json",
            Binding::Query => "query",
            Binding::FormPost => "form-urlencoded",
        }
    }

    pub fn bind<T: DeserializeOwned>(&self, request: &Request<Bytes>) -> Result<T, BindError> {
        match self {
            Binding::Json => Ok(serde_json::from_slice(request.body())?),
            Binding::FormPost => Ok(serde_urlencoded::from_bytes(request.body())?),
            Binding::Query => {
                let query = request.uri().query().unwrap_or_default();
                Ok(serde_urlencoded::from_str(query)?)
            }
        }
    }
}

/// `Content-Type` of a request, empty when absent or not ASCII.
pub fn content_type(request: &Request<Bytes>) -> &str {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn mime(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
}
