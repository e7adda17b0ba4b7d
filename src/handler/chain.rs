//! Middleware chain with an explicit continuation.
//!
//! # Design Decisions
//! - The cursor lives in the request's `Context` (starts at -1), never in the
//!   shared `Handler`, so one handler serves any number of requests at once
//! - Each middleware receives a `Next` by value: it can resume the chain at
//!   most once, or drop it to stop the chain
//! - Nothing advances the chain on a middleware's behalf

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::RouteError;
use crate::http::Context;

/// Terminal request handler.
pub type Endpoint = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// A step of the chain. Call `next.run(ctx)` to continue, or return without
/// calling it to stop here.
pub trait Middleware: Send + Sync {
    fn process(&self, ctx: &mut Context, next: Next<'_>);
}

/// Adapter turning a closure into a [`Middleware`].
pub struct FnMiddleware<F>(F);

/// Wrap a closure as middleware.
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&mut Context, Next<'_>) + Send + Sync,
{
    FnMiddleware(f)
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Context, Next<'_>) + Send + Sync,
{
    fn process(&self, ctx: &mut Context, next: Next<'_>) {
        (self.0)(ctx, next)
    }
}

/// Continuation handed to a middleware.
pub struct Next<'a> {
    handler: &'a Handler,
}

impl Next<'_> {
    /// Resume the chain at the following step.
    pub fn run(self, ctx: &mut Context) {
        self.handler.advance(ctx);
    }
}

/// Ordered middlewares, one endpoint, and an optional deadline override.
#[derive(Clone, Default)]
pub struct Handler {
    middlewares: Vec<Arc<dyn Middleware>>,
    endpoint: Option<Endpoint>,
    timeout: Option<Duration>,
}

impl Handler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware.
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Append a closure middleware.
    pub fn wrap<F>(self, f: F) -> Self
    where
        F: Fn(&mut Context, Next<'_>) + Send + Sync + 'static,
    {
        self.middleware(middleware_fn(f))
    }

    /// Set the endpoint. A handler has exactly one.
    pub fn endpoint<F>(mut self, f: F) -> Result<Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        if self.endpoint.is_some() {
            return Err(RouteError::EndpointAlreadySet);
        }
        self.endpoint = Some(Arc::new(f));
        Ok(self)
    }

    /// Shorten the deadline for this handler. Zero is rejected and the
    /// tree-wide default stays in effect.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        if timeout.is_zero() {
            tracing::warn!("handler timeout must be positive, using the kernel default");
            self.timeout = None;
        } else {
            self.timeout = Some(timeout);
        }
        self
    }

    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn has_endpoint(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn middleware_count(&self) -> usize {
        self.middlewares.len()
    }

    /// Deadline for a request given the tree default: the override can only
    /// shorten it.
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        match self.timeout {
            Some(t) => t.min(default),
            None => default,
        }
    }

    /// Put `base` in front of this handler's own middlewares.
    pub(crate) fn prepend(&mut self, base: &[Arc<dyn Middleware>]) {
        if base.is_empty() {
            return;
        }
        let own = std::mem::take(&mut self.middlewares);
        self.middlewares = base.iter().cloned().chain(own).collect();
    }

    /// Run the chain for a fresh context.
    pub fn handle(&self, ctx: &mut Context) {
        self.advance(ctx);
    }

    fn advance(&self, ctx: &mut Context) {
        ctx.call_index += 1;
        let index = usize::try_from(ctx.call_index).unwrap_or(usize::MAX);

        match self.middlewares.get(index) {
            Some(middleware) => middleware.process(ctx, Next { handler: self }),
            None => {
                if let Some(endpoint) = &self.endpoint {
                    endpoint(ctx);
                }
            }
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("middlewares", &self.middlewares.len())
            .field("endpoint", &self.endpoint.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn record(log: &Arc<Mutex<Vec<&'static str>>>, entry: &'static str) {
        log.lock().unwrap().push(entry);
    }

    #[test]
    fn runs_middlewares_in_order_then_endpoint() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (log.clone(), log.clone(), log.clone());

        let handler = Handler::new()
            .wrap(move |ctx, next| {
                record(&a, "first:before");
                next.run(ctx);
                record(&a, "first:after");
            })
            .wrap(move |ctx, next| {
                record(&b, "second");
                next.run(ctx);
            })
            .endpoint(move |_| record(&c, "endpoint"))
            .unwrap();

        let mut ctx = Context::for_test("/");
        handler.handle(&mut ctx);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:before", "second", "endpoint", "first:after"]
        );
    }

    #[test]
    fn middleware_can_stop_the_chain() {
        let third = Arc::new(AtomicUsize::new(0));
        let hits = Arc::new(AtomicUsize::new(0));
        let (t, h) = (third.clone(), hits.clone());

        let handler = Handler::new()
            .wrap(|ctx, next| next.run(ctx))
            .wrap(|_, _next| {})
            .wrap(move |ctx, next| {
                t.fetch_add(1, Ordering::SeqCst);
                next.run(ctx);
            })
            .endpoint(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let mut ctx = Context::for_test("/");
        handler.handle(&mut ctx);

        assert_eq!(third.load(Ordering::SeqCst), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.call_index, 1);
    }

    #[test]
    fn endpoint_runs_directly_without_middlewares() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let handler = Handler::new()
            .endpoint(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let mut ctx = Context::for_test("/");
        handler.handle(&mut ctx);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn endpoint_is_set_once() {
        let result = Handler::new().endpoint(|_| {}).unwrap().endpoint(|_| {});
        assert!(matches!(result, Err(RouteError::EndpointAlreadySet)));
    }

    #[test]
    fn override_only_shortens() {
        let default = Duration::from_secs(5);

        let shorter = Handler::new().timeout(Duration::from_secs(2));
        assert_eq!(shorter.effective_timeout(default), Duration::from_secs(2));

        let none = Handler::new();
        assert_eq!(none.effective_timeout(default), default);

        let longer = Handler::new().timeout(Duration::from_secs(30));
        assert_eq!(longer.effective_timeout(default), default);

        let zero = Handler::new().timeout(Duration::ZERO);
        assert_eq!(zero.timeout_override(), None);
        assert_eq!(zero.effective_timeout(default), default);
    }

    #[test]
    fn prepended_middlewares_run_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (log.clone(), log.clone());

        let base: Vec<Arc<dyn Middleware>> = vec![Arc::new(middleware_fn(move |ctx, next| {
            record(&a, "base");
            next.run(ctx);
        }))];
        let mut handler = Handler::new()
            .wrap(move |ctx, next| {
                record(&b, "own");
                next.run(ctx);
            })
            .endpoint(|_| {})
            .unwrap();
        handler.prepend(&base);

        let mut ctx = Context::for_test("/");
        handler.handle(&mut ctx);
        assert_eq!(*log.lock().unwrap(), vec!["base", "own"]);
        assert_eq!(handler.middleware_count(), 2);
    }
}
