//! Error types for every layer of the kernel.
//!
//! # Design Decisions
//! - Registration faults (`RouteError`) are returned from the builder API and
//!   are expected to abort startup; none of them can occur while serving
//! - Infrastructure faults (`KernelError`) carry the address or file pair of the
//!   operation that failed
//! - Request-time soft faults (`RenderError`, `BindError`) never produce a
//!   response on their own; handler code decides what to do with them

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while building the route tree.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Method outside GET/POST/HEAD/PUT/PATCH/DELETE.
    #[error("method [{0}] not allowed")]
    MethodNotAllowed(String),

    /// A path such as `/a//b` produced an empty segment.
    #[error("path [{0}] contains an empty segment")]
    EmptySegment(String),

    /// Segment such as `:` or `:id(\d+` that cannot be parsed.
    #[error("malformed path segment [{0}]")]
    MalformedSegment(String),

    /// The regex of a `:name(pattern)` segment failed to compile.
    #[error("resolve path segment [{segment}] failed: {source}")]
    InvalidPattern {
        segment: String,
        #[source]
        source: regex::Error,
    },

    /// Two sibling leaves would match the same request.
    #[error("route [{path}] conflicts with [{existing}]")]
    Conflict { path: String, existing: String },

    /// The method is already bound on this node.
    #[error("method [{method}] on route [{path}] already exists")]
    DuplicateRoute { method: String, path: String },

    /// `Handler::endpoint` was called twice.
    #[error("endpoint already set")]
    EndpointAlreadySet,

    /// A handler was registered without an endpoint.
    #[error("handler for [{method}] [{path}] has no endpoint")]
    MissingEndpoint { method: String, path: String },
}

/// Errors raised by the server lifecycle.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tls: {addr} ({cert:?}, {key:?}): {source}")]
    Tls {
        addr: String,
        cert: PathBuf,
        key: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serve {addr}: {source}")]
    Serve {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no server running")]
    NoServerRunning,

    #[error("server already running")]
    AlreadyRunning,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors produced by a response encoder.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml encoding failed: {0}")]
    Xml(String),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while binding a request into a typed value.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid form data: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    #[error("unsupported content type [{0}]")]
    UnsupportedContentType(String),

    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}
