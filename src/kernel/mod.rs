//! Process-wide kernel: configuration and server lifecycle.
//!
//! # Responsibilities
//! - Own the frozen route tree and the configuration lock
//! - Serve over TCP, a pre-bound listener, a unix socket or TLS
//! - Graceful shutdown: stop accepting, drain in-flight requests
//! - Apply configuration updates as whole-value swaps
//!
//! # Design Decisions
//! - One server per kernel at a time; a second `run*` fails
//! - `shutdown` fails when nothing is running
//! - Readers clone the `Arc<KernelConfig>` under the read lock and never
//!   hold the lock across a request

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use arc_swap::ArcSwapOption;
use axum::body::Bytes;
use axum::http::{Request, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use crate::config::{validate_config, ConfigError, KernelConfig};
use crate::error::KernelError;
use crate::http::server::{build_router, AppState};
use crate::lifecycle::shutdown::{wait_for_signal, Shutdown};
use crate::net::listener;
use crate::net::tls::load_tls_config;
use crate::routing::RouteTree;

struct ServerHandle {
    addr: String,
    shutdown: Shutdown,
}

struct Shared {
    routes: Arc<RouteTree>,
    config: Arc<RwLock<Arc<KernelConfig>>>,
    server: ArcSwapOption<ServerHandle>,
}

/// Cheap to clone; clones share the same routes, configuration and server.
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<Shared>,
}

impl Kernel {
    /// Freeze `routes` and install `config`.
    pub fn new(routes: RouteTree, config: KernelConfig) -> Result<Self, KernelError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        Ok(Self {
            inner: Arc::new(Shared {
                routes: Arc::new(routes),
                config: Arc::new(RwLock::new(Arc::new(config))),
                server: ArcSwapOption::empty(),
            }),
        })
    }

    pub fn routes(&self) -> &RouteTree {
        &self.inner.routes
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<KernelConfig> {
        self.inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate `config` and replace the current one. Requests already in
    /// flight keep the snapshot they started with.
    pub fn set_config(&self, config: KernelConfig) -> Result<(), KernelError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let mut guard = self
            .inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(config);
        Ok(())
    }

    /// Apply configurations from `rx` until the channel closes. Invalid ones
    /// are logged and skipped.
    pub async fn apply_config_updates(&self, mut rx: mpsc::UnboundedReceiver<KernelConfig>) {
        while let Some(config) = rx.recv().await {
            match self.set_config(config) {
                Ok(()) => tracing::info!("Configuration updated"),
                Err(e) => tracing::error!(error = %e, "Rejected configuration update"),
            }
        }
    }

    /// Dispatch one request without a server, using the current configuration.
    pub fn dispatch(&self, request: Request<Bytes>) -> Response<Bytes> {
        self.inner.routes.dispatch(&self.config(), request)
    }

    pub fn is_running(&self) -> bool {
        self.inner.server.load().is_some()
    }

    /// Address of the running server.
    pub fn local_addr(&self) -> Option<String> {
        self.inner.server.load_full().map(|h| h.addr.clone())
    }

    /// Build the axum router serving this kernel's routes.
    pub fn router(&self) -> Router {
        let state = AppState::new(self.inner.routes.clone(), self.inner.config.clone());
        build_router(state, self.config().write_timeout())
    }

    /// Listen on `addr` (`":8080"` means every interface) until shutdown.
    pub async fn run(&self, addr: &str) -> Result<(), KernelError> {
        let listener = listener::bind_tcp(addr).await?;
        self.run_listener(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn run_listener(&self, listener: TcpListener) -> Result<(), KernelError> {
        let addr = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "tcp".to_string());

        self.serve(addr, |router, rx| async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(wait_for_signal(rx))
                .await
        })
        .await
    }

    /// Serve on a unix socket at `path`, replacing a stale socket file.
    #[cfg(unix)]
    pub async fn run_unix(&self, path: impl AsRef<std::path::Path>) -> Result<(), KernelError> {
        let path = path.as_ref();
        let listener = listener::bind_unix(path)?;

        self.serve(path.display().to_string(), |router, rx| async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(wait_for_signal(rx))
                .await
        })
        .await
    }

    /// Serve HTTPS on `addr` with the PEM certificate and key.
    pub async fn run_tls(
        &self,
        addr: &str,
        cert: impl AsRef<std::path::Path>,
        key: impl AsRef<std::path::Path>,
    ) -> Result<(), KernelError> {
        let (cert, key) = (cert.as_ref(), key.as_ref());
        let socket = listener::socket_addr(addr)?;
        let tls = load_tls_config(cert, key)
            .await
            .map_err(|source| KernelError::Tls {
                addr: socket.to_string(),
                cert: cert.to_path_buf(),
                key: key.to_path_buf(),
                source,
            })?;

        self.serve(socket.to_string(), |router, rx| async move {
            let handle = axum_server::Handle::new();
            let trigger = handle.clone();
            tokio::spawn(async move {
                wait_for_signal(rx).await;
                trigger.graceful_shutdown(None);
            });

            axum_server::bind_rustls(socket, tls)
                .handle(handle)
                .serve(router.into_make_service())
                .await
        })
        .await
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(&self) -> Result<(), KernelError> {
        let Some(handle) = self.inner.server.load_full() else {
            return Err(KernelError::NoServerRunning);
        };

        tracing::info!(address = %handle.addr, "Shutting down server");
        handle.shutdown.trigger();
        handle.shutdown.drained().await;
        Ok(())
    }

    async fn serve<F, Fut>(&self, addr: String, run: F) -> Result<(), KernelError>
    where
        F: FnOnce(Router, broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = std::io::Result<()>>,
    {
        let handle = Arc::new(ServerHandle {
            addr: addr.clone(),
            shutdown: Shutdown::new(),
        });
        let rx = handle.shutdown.subscribe();

        let previous = self.inner.server.rcu(|current| match current {
            Some(running) => Some(running.clone()),
            None => Some(handle.clone()),
        });
        if previous.is_some() {
            return Err(KernelError::AlreadyRunning);
        }

        tracing::info!(address = %addr, routes = self.inner.routes.routes().len(), "HTTP server starting");
        let result = run(self.router(), rx).await;

        self.inner.server.store(None);
        handle.shutdown.finish();

        match result {
            Ok(()) => {
                tracing::info!(address = %addr, "HTTP server stopped");
                Ok(())
            }
            Err(source) => {
                tracing::error!(address = %addr, error = %source, "HTTP server failed");
                Err(KernelError::Serve { addr, source })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::routing::Routes;
    use axum::http::StatusCode;

    fn kernel() -> Kernel {
        let mut routes = RouteTree::new();
        routes
            .get(
                "/timeout",
                Handler::new()
                    .endpoint(|ctx| {
                        let ms = ctx.config().timeout_ms.to_string();
                        ctx.string(StatusCode::OK, &ms);
                    })
                    .unwrap(),
            )
            .unwrap();
        Kernel::new(routes, KernelConfig::default()).unwrap()
    }

    fn get(path: &str) -> Request<Bytes> {
        Request::get(path).body(Bytes::new()).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let bad = KernelConfig {
            timeout_ms: 0,
            ..KernelConfig::default()
        };
        assert!(matches!(
            Kernel::new(RouteTree::new(), bad.clone()),
            Err(KernelError::Config(ConfigError::Validation(_)))
        ));

        let kernel = kernel();
        assert!(kernel.set_config(bad).is_err());
        assert_eq!(kernel.config().timeout_ms, 5_000);
    }

    #[test]
    fn config_swap_is_seen_by_next_request() {
        let kernel = kernel();
        assert_eq!(kernel.dispatch(get("/timeout")).body().as_ref(), b"5000");

        kernel
            .set_config(KernelConfig {
                timeout_ms: 1_500,
                ..KernelConfig::default()
            })
            .unwrap();
        assert_eq!(kernel.dispatch(get("/timeout")).body().as_ref(), b"1500");
    }

    #[tokio::test]
    async fn shutdown_without_server_fails() {
        let kernel = kernel();
        assert!(!kernel.is_running());
        assert!(matches!(kernel.shutdown().await, Err(KernelError::NoServerRunning)));
    }

    #[tokio::test]
    async fn applies_updates_until_channel_closes() {
        let kernel = kernel();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(KernelConfig {
            timeout_ms: 0,
            ..KernelConfig::default()
        })
        .unwrap();
        tx.send(KernelConfig {
            timeout_ms: 750,
            ..KernelConfig::default()
        })
        .unwrap();
        drop(tx);

        kernel.apply_config_updates(rx).await;
        assert_eq!(kernel.config().timeout_ms, 750);
    }
}
