//! Per-request state handed through the handler chain.
//!
//! # Responsibilities
//! - Captured path parameters (returned to the pool on drop)
//! - Request-scoped key/value store
//! - Cooperative deadline for the matched handler
//! - Cookie access and response emission through a buffered writer
//!
//! # Design Decisions
//! - Every emitter commits the status once and sets `Content-Type` once;
//!   later attempts are logged and dropped by `ResponseWriter`
//! - Encoder failures are kept on the context, never turned into a response
//! - A context is owned by exactly one request and is never shared

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use ::cookie::Cookie;
use serde::de::DeserializeOwned;
use serde::Serialize;
use validator::Validate;

use crate::config::KernelConfig;
use crate::error::{BindError, RenderError};
use crate::handler::Deadline;
use crate::http::binding::{self, Binding};
use crate::http::cookie;
use crate::http::render::{Data, Html, Json, Render, Text, Xml};
use crate::http::response::ResponseWriter;
use crate::routing::{Params, PooledParams};

pub struct Context {
    request: Request<Bytes>,
    params: PooledParams,
    store: HashMap<String, Box<dyn Any + Send + Sync>>,
    deadline: Deadline,
    pub(crate) call_index: isize,
    writer: ResponseWriter,
    config: Arc<KernelConfig>,
    error: Option<RenderError>,
}

impl Context {
    /// Context for `request` with no parameters and the configured default
    /// deadline.
    pub fn new(request: Request<Bytes>, config: Arc<KernelConfig>) -> Self {
        Self {
            request,
            params: PooledParams::default(),
            store: HashMap::new(),
            deadline: Deadline::after(config.timeout()),
            call_index: -1,
            writer: ResponseWriter::new(),
            config,
            error: None,
        }
    }

    pub(crate) fn with_params(mut self, params: PooledParams) -> Self {
        self.params = params;
        self
    }

    pub(crate) fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    /// Kernel configuration snapshot taken when the request arrived.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Value captured by the wildcard `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn set<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.store.insert(key.into(), Box::new(value));
    }

    /// Stored value under `key`, if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.store.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    /// Value of the request cookie `name`.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies()
            .into_iter()
            .find(|c| c.name() == name)
            .map(|c| c.value().to_string())
    }

    pub fn cookies(&self) -> Vec<Cookie<'static>> {
        cookie::request_cookies(self.request.headers())
    }

    /// Add a `Set-Cookie` header built from the cookie defaults. Empty names
    /// or values are ignored.
    pub fn set_cookie(&mut self, name: &str, value: &str) {
        if name.is_empty() || value.is_empty() {
            return;
        }
        let cookie = cookie::build_cookie(&self.config.cookie, name, value);
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(header_value) => {
                self.writer
                    .headers_mut()
                    .append(header::SET_COOKIE, header_value);
            }
            Err(e) => tracing::warn!(cookie = name, error = %e, "cookie is not a valid header value"),
        }
    }

    /// Commit `code` as the response status. Returns whether it was applied.
    pub fn status(&mut self, code: StatusCode) -> bool {
        self.writer.write_header(code)
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.writer.headers_mut()
    }

    pub fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    /// Emit `code` and the body produced by `encoder`.
    pub fn render(&mut self, code: StatusCode, encoder: &dyn Render) {
        self.writer
            .write_content_type(HeaderValue::from_static(encoder.content_type()));
        self.writer.write_header(code);

        if let Err(e) = encoder.render(&mut self.writer) {
            tracing::debug!(path = %self.request.uri().path(), error = %e, "render failed");
            if self.error.is_none() {
                self.error = Some(e);
            }
        }
    }

    pub fn string(&mut self, code: StatusCode, body: &str) {
        self.render(code, &Text(body));
    }

    pub fn html(&mut self, code: StatusCode, body: &str) {
        self.render(code, &Html(body));
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, code: StatusCode, value: &T) {
        self.render(code, &Json(value));
    }

    /// XML body under a `<response>` root element.
    pub fn xml<T: Serialize>(&mut self, code: StatusCode, value: &T) {
        self.render(code, &Xml::new(value));
    }

    pub fn bytes(&mut self, code: StatusCode, body: &[u8]) {
        self.render(code, &Data(&[body]));
    }

    /// Send `location` with a redirect status. Nothing is sent once a status
    /// is committed.
    pub fn redirect(&mut self, code: StatusCode, location: &str) {
        if !code.is_redirection() {
            tracing::warn!(status = code.as_u16(), location, "redirect with non-3xx status");
        }
        let value = match HeaderValue::from_str(location) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(location, error = %e, "invalid redirect location");
                return;
            }
        };
        if self.writer.write_header(code) {
            self.writer.headers_mut().insert(header::LOCATION, value);
        }
    }

    /// First encoder failure recorded for this request.
    pub fn error(&self) -> Option<&RenderError> {
        self.error.as_ref()
    }

    /// Decode the request into `T` with the binding picked from its method
    /// and `Content-Type`.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        let binding = Binding::for_request(self.request.method(), binding::content_type(&self.request))?;
        binding.bind(&self.request)
    }

    /// Like [`Context::bind`], then run the value's validation rules.
    pub fn bind_valid<T: DeserializeOwned + Validate>(&self) -> Result<T, BindError> {
        let value: T = self.bind()?;
        value.validate()?;
        Ok(value)
    }

    pub fn into_response(self) -> Response<Bytes> {
        self.writer.into_response()
    }

    #[cfg(test)]
    pub(crate) fn for_test(path: &str) -> Self {
        let request = Request::builder()
            .uri(path)
            .body(Bytes::new())
            .unwrap_or_default();
        Self::new(request, Arc::new(KernelConfig::default()))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("params", &*self.params)
            .field("call_index", &self.call_index)
            .field("status", &self.writer.status())
            .finish_non_exhaustive()
    }
}
