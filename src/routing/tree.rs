//! Route tree: registration surface and request dispatch.
//!
//! # Data Flow
//! ```text
//! Registration (before serving):
//!     handle(method, path, handler)
//!     → prepend base middlewares
//!     → Trie::add_path (conflict + duplicate checks)
//!     → per-method index (introspection only)
//!
//! Dispatch (per request):
//!     clean_path → 307 if dirty → 307 if trailing slash
//!     → Trie::search (params drawn from the pool on first capture)
//!     → Context + Deadline → Handler::handle
//!     → response; params go back to the pool with the context
//! ```
//!
//! # Design Decisions
//! - Build, then freeze: the tree is moved into `Kernel::new` and only read
//!   afterwards, so matching takes no locks
//! - The trie is the only authority for matching; the index never answers
//!   a request

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::http::{header, HeaderValue, Method, Request, Response, StatusCode};

use crate::config::KernelConfig;
use crate::error::RouteError;
use crate::handler::{Deadline, Endpoint, Handler, Middleware};
use crate::http::Context;
use crate::observability::metrics;
use crate::routing::node::Trie;
use crate::routing::params::{Params, ParamsPool, PooledParams};
use crate::routing::path::clean_path;

/// Methods accepted at registration, in listing order.
pub const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::HEAD,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

pub fn is_allowed(method: &Method) -> bool {
    ALLOWED_METHODS.contains(method)
}

/// Registration surface shared by [`RouteTree`] and [`RouteGroup`].
pub trait Routes {
    fn handle(&mut self, method: Method, path: &str, handler: Handler)
        -> Result<&mut Self, RouteError>;

    fn get(&mut self, path: &str, handler: Handler) -> Result<&mut Self, RouteError> {
        self.handle(Method::GET, path, handler)
    }

    fn post(&mut self, path: &str, handler: Handler) -> Result<&mut Self, RouteError> {
        self.handle(Method::POST, path, handler)
    }

    fn head(&mut self, path: &str, handler: Handler) -> Result<&mut Self, RouteError> {
        self.handle(Method::HEAD, path, handler)
    }

    fn put(&mut self, path: &str, handler: Handler) -> Result<&mut Self, RouteError> {
        self.handle(Method::PUT, path, handler)
    }

    fn patch(&mut self, path: &str, handler: Handler) -> Result<&mut Self, RouteError> {
        self.handle(Method::PATCH, path, handler)
    }

    fn delete(&mut self, path: &str, handler: Handler) -> Result<&mut Self, RouteError> {
        self.handle(Method::DELETE, path, handler)
    }
}

pub struct RouteTree {
    trie: Trie,
    index: HashMap<Method, BTreeMap<String, Arc<Handler>>>,
    base: Vec<Arc<dyn Middleware>>,
    not_found: Endpoint,
    pool: Arc<ParamsPool>,
}

impl RouteTree {
    pub fn new() -> Self {
        Self::with_pool(Arc::new(ParamsPool::default()))
    }

    pub fn with_pool(pool: Arc<ParamsPool>) -> Self {
        Self {
            trie: Trie::new(),
            index: HashMap::new(),
            base: Vec::new(),
            not_found: Arc::new(default_not_found),
            pool,
        }
    }

    /// Add base middlewares. They run before the own middlewares of every
    /// handler registered after this call; earlier routes are unaffected.
    pub fn use_middleware<M>(&mut self, middleware: M) -> &mut Self
    where
        M: Middleware + 'static,
    {
        self.base.push(Arc::new(middleware));
        self
    }

    /// Endpoint for requests that match no route or no method.
    pub fn not_found<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.not_found = Arc::new(f);
        self
    }

    /// Register routes under `prefix`, with `middlewares` running after the
    /// base middlewares and before each handler's own.
    pub fn group<F>(
        &mut self,
        prefix: &str,
        middlewares: Vec<Arc<dyn Middleware>>,
        f: F,
    ) -> Result<&mut Self, RouteError>
    where
        F: FnOnce(&mut RouteGroup<'_>) -> Result<(), RouteError>,
    {
        let mut group = RouteGroup {
            tree: &mut *self,
            prefix: join_path("/", prefix),
            middlewares,
        };
        f(&mut group)?;
        Ok(self)
    }

    /// Registered (method, path) pairs, methods in [`ALLOWED_METHODS`] order
    /// and paths sorted.
    pub fn routes(&self) -> Vec<(Method, String)> {
        ALLOWED_METHODS
            .iter()
            .filter_map(|m| self.index.get(m).map(|paths| (m, paths)))
            .flat_map(|(m, paths)| paths.keys().map(move |p| (m.clone(), p.clone())))
            .collect()
    }

    /// Handler registered for `method` at the registration path `full_path`.
    pub fn handler_for(&self, method: &Method, full_path: &str) -> Option<&Arc<Handler>> {
        self.index.get(method).and_then(|paths| paths.get(full_path))
    }

    /// Match `path` as given (no cleaning) and return the handler for
    /// `method` with the captured parameters.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<(Arc<Handler>, Params)> {
        let (id, params) = self.trie.search(path, Params::new)?;
        let handler = self.trie.node(id).handler(method)?;
        Some((handler.clone(), params.unwrap_or_default()))
    }

    /// Registration path of the node matching `path`.
    pub fn matched_path(&self, path: &str) -> Option<&str> {
        let (id, _) = self.trie.search(path, Params::new)?;
        Some(self.trie.node(id).full_path())
    }

    pub fn pool(&self) -> &Arc<ParamsPool> {
        &self.pool
    }

    /// Serve one request to completion.
    pub fn dispatch(&self, config: &Arc<KernelConfig>, request: Request<Bytes>) -> Response<Bytes> {
        let started = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let fixed = clean_path(&path);

        if fixed != path && config.redirect_fixed_path {
            let response = redirect(&request, &fixed);
            metrics::record_dispatch(method.as_str(), "redirect", response.status(), started);
            return response;
        }

        if fixed.len() > 1 && fixed.ends_with('/') {
            let response = redirect(&request, fixed.trim_end_matches('/'));
            metrics::record_dispatch(method.as_str(), "redirect", response.status(), started);
            return response;
        }

        let pool = &self.pool;
        let matched = self
            .trie
            .search(&fixed, || pool.acquire())
            .and_then(|(id, params)| {
                let params = PooledParams::new(params, pool.clone());
                let handler = self.trie.node(id).handler(&method)?;
                Some((handler.clone(), params))
            });

        let Some((handler, params)) = matched else {
            tracing::debug!(%method, path = %fixed, "no route");
            let mut ctx = Context::new(request, config.clone());
            (self.not_found)(&mut ctx);
            let response = ctx.into_response();
            metrics::record_dispatch(method.as_str(), "not_found", response.status(), started);
            return response;
        };

        let deadline = Deadline::after(handler.effective_timeout(config.timeout()));
        let mut ctx = Context::new(request, config.clone())
            .with_params(params)
            .with_deadline(deadline.clone());

        handler.handle(&mut ctx);
        deadline.cancel();

        let response = ctx.into_response();
        metrics::record_dispatch(method.as_str(), "matched", response.status(), started);
        response
    }

    fn insert(
        &mut self,
        method: Method,
        path: &str,
        mut handler: Handler,
    ) -> Result<(), RouteError> {
        if !is_allowed(&method) {
            return Err(RouteError::MethodNotAllowed(method.to_string()));
        }
        if !handler.has_endpoint() {
            return Err(RouteError::MissingEndpoint {
                method: method.to_string(),
                path: path.to_string(),
            });
        }
        handler.prepend(&self.base);

        let handler = Arc::new(handler);
        let id = self.trie.add_path(method.clone(), path, handler.clone())?;
        let full_path = self.trie.node(id).full_path().to_string();

        tracing::debug!(
            %method,
            full_path = %full_path,
            middlewares = handler.middleware_count(),
            timeout = ?handler.timeout_override(),
            "route registered"
        );
        self.index
            .entry(method)
            .or_default()
            .insert(full_path, handler);
        Ok(())
    }
}

impl Routes for RouteTree {
    fn handle(
        &mut self,
        method: Method,
        path: &str,
        handler: Handler,
    ) -> Result<&mut Self, RouteError> {
        self.insert(method, path, handler)?;
        Ok(self)
    }
}

impl Default for RouteTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RouteTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTree")
            .field("routes", &self.routes())
            .field("base_middlewares", &self.base.len())
            .finish_non_exhaustive()
    }
}

/// Routes registered under a common prefix.
pub struct RouteGroup<'a> {
    tree: &'a mut RouteTree,
    prefix: String,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl RouteGroup<'_> {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Nested group; its middlewares run after this group's.
    pub fn group<F>(
        &mut self,
        prefix: &str,
        middlewares: Vec<Arc<dyn Middleware>>,
        f: F,
    ) -> Result<&mut Self, RouteError>
    where
        F: FnOnce(&mut RouteGroup<'_>) -> Result<(), RouteError>,
    {
        let mut nested = RouteGroup {
            tree: &mut *self.tree,
            prefix: join_path(&self.prefix, prefix),
            middlewares: self.middlewares.iter().cloned().chain(middlewares).collect(),
        };
        f(&mut nested)?;
        Ok(self)
    }
}

impl Routes for RouteGroup<'_> {
    fn handle(
        &mut self,
        method: Method,
        path: &str,
        mut handler: Handler,
    ) -> Result<&mut Self, RouteError> {
        handler.prepend(&self.middlewares);
        let full = join_path(&self.prefix, path);
        self.tree.insert(method, &full, handler)?;
        Ok(self)
    }
}

fn default_not_found(ctx: &mut Context) {
    ctx.status(StatusCode::NOT_FOUND);
}

fn join_path(prefix: &str, path: &str) -> String {
    let joined = format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    if joined.len() > 1 {
        joined.trim_end_matches('/').to_string()
    } else {
        joined
    }
}

/// 307 to `path`, keeping the query string.
fn redirect(request: &Request<Bytes>, path: &str) -> Response<Bytes> {
    let location = match request.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };

    let mut response = Response::new(Bytes::new());
    *response.status_mut() = StatusCode::TEMPORARY_REDIRECT;
    match HeaderValue::from_str(&location) {
        Ok(value) => {
            response.headers_mut().insert(header::LOCATION, value);
        }
        Err(e) => tracing::warn!(location, error = %e, "invalid redirect location"),
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::middleware_fn;
    use std::sync::Mutex;

    fn ok() -> Handler {
        Handler::new().endpoint(|_| {}).unwrap()
    }

    #[test]
    fn joins_group_paths() {
        assert_eq!(join_path("/", "/"), "/");
        assert_eq!(join_path("/", "api"), "/api");
        assert_eq!(join_path("/api", "/"), "/api");
        assert_eq!(join_path("/api/", "/users/:id"), "/api/users/:id");
    }

    #[test]
    fn rejects_unsupported_method_and_missing_endpoint() {
        let mut tree = RouteTree::new();
        let err = tree.handle(Method::OPTIONS, "/a", ok()).unwrap_err();
        assert!(matches!(err, RouteError::MethodNotAllowed(_)));

        let err = tree.get("/a", Handler::new()).unwrap_err();
        assert!(matches!(err, RouteError::MissingEndpoint { .. }));
        assert!(tree.routes().is_empty());
    }

    #[test]
    fn lists_routes_in_stable_order() {
        let mut tree = RouteTree::new();
        tree.post("/b", ok())
            .unwrap()
            .get("/b", ok())
            .unwrap()
            .get("/a/:id(\\d+)", ok())
            .unwrap();

        assert_eq!(
            tree.routes(),
            vec![
                (Method::GET, "/a/:id(\\d+)".to_string()),
                (Method::GET, "/b".to_string()),
                (Method::POST, "/b".to_string()),
            ]
        );
        assert!(tree.handler_for(&Method::GET, "/a/:id(\\d+)").is_some());
        assert!(tree.handler_for(&Method::DELETE, "/b").is_none());
    }

    #[test]
    fn base_middlewares_apply_to_later_routes_only() {
        let mut tree = RouteTree::new();
        tree.get("/early", ok()).unwrap();
        tree.use_middleware(middleware_fn(|ctx, next| next.run(ctx)));
        tree.get("/late", ok()).unwrap();

        assert_eq!(tree.handler_for(&Method::GET, "/early").unwrap().middleware_count(), 0);
        assert_eq!(tree.handler_for(&Method::GET, "/late").unwrap().middleware_count(), 1);
    }

    #[test]
    fn groups_prefix_paths_and_order_middlewares() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (base, outer, inner, endpoint) = (log.clone(), log.clone(), log.clone(), log.clone());

        let outer: Arc<dyn Middleware> = Arc::new(middleware_fn(move |ctx, next| {
            outer.lock().unwrap().push("outer");
            next.run(ctx);
        }));
        let inner: Arc<dyn Middleware> = Arc::new(middleware_fn(move |ctx, next| {
            inner.lock().unwrap().push("inner");
            next.run(ctx);
        }));

        let mut tree = RouteTree::new();
        tree.use_middleware(middleware_fn(move |ctx, next| {
            base.lock().unwrap().push("base");
            next.run(ctx);
        }));
        tree.group("/api", vec![outer], |api| {
            api.group("v1", vec![inner], |v1| {
                let handler = Handler::new()
                    .endpoint(move |_| endpoint.lock().unwrap().push("endpoint"))?;
                v1.get("/users/:id", handler)?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

        let (handler, params) = tree.lookup(&Method::GET, "/api/v1/users/7").unwrap();
        assert_eq!(params.get("id"), Some("7"));

        let mut ctx = Context::for_test("/api/v1/users/7");
        handler.handle(&mut ctx);
        assert_eq!(*log.lock().unwrap(), vec!["base", "outer", "inner", "endpoint"]);
    }

    #[test]
    fn root_route_is_registrable() {
        let mut tree = RouteTree::new();
        tree.get("/", ok()).unwrap();
        let (_, params) = tree.lookup(&Method::GET, "/").unwrap();
        assert!(params.is_empty());
        assert_eq!(tree.matched_path("/"), Some("/"));
    }

    #[test]
    fn redirect_keeps_query() {
        let request = Request::builder()
            .uri("/a//b?x=1")
            .body(Bytes::new())
            .unwrap();
        let response = redirect(&request, "/a/b");
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/a/b?x=1");
    }
}
