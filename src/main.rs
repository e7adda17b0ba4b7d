//! route-kernel demo server.
//!
//! Registers a handful of routes and serves them over TCP, a unix socket or
//! TLS until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::time::Duration;

use axum::http::StatusCode;
use clap::Parser;
use serde::Serialize;

use route_kernel::config::watcher::ConfigWatcher;
use route_kernel::config::{load_config, KernelConfig};
use route_kernel::lifecycle::signals::shutdown_signal;
use route_kernel::observability::logging::init_logging;
use route_kernel::{middleware_fn, Handler, Kernel, RouteTree, Routes};

#[derive(Parser)]
#[command(name = "route-kernel")]
#[command(about = "Demo server for the route-kernel router", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address; ":8080" binds every interface
    #[arg(short, long, default_value = ":8080")]
    bind: String,

    /// Serve on a unix socket instead of TCP
    #[arg(long, conflicts_with_all = ["tls_cert", "tls_key"])]
    unix: Option<PathBuf>,

    /// PEM certificate for HTTPS
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key for HTTPS
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Reload the configuration file when it changes
    #[arg(long, requires = "config")]
    watch: bool,
}

#[derive(Serialize)]
struct Item {
    id: u64,
    name: String,
}

fn routes() -> Result<RouteTree, route_kernel::RouteError> {
    let mut routes = RouteTree::new();

    routes.use_middleware(middleware_fn(|ctx, next| {
        tracing::debug!(path = %ctx.path(), "request");
        next.run(ctx);
    }));

    routes
        .get(
            r"/:path(\d+)",
            Handler::new()
                .endpoint(|ctx| {
                    let path = ctx.param("path").unwrap_or_default().to_string();
                    if ctx.deadline().is_done() {
                        ctx.status(StatusCode::SERVICE_UNAVAILABLE);
                        return;
                    }
                    ctx.html(StatusCode::OK, &format!("<html><body>{path}</body></html>"));
                })?
                .timeout(Duration::from_secs(2)),
        )?
        .get(
            "/setcookie",
            Handler::new().endpoint(|ctx| {
                ctx.set_cookie("SESSIONID", "123123123");
                ctx.string(StatusCode::OK, "cookie set");
            })?,
        )?;

    routes.group("/items", Vec::new(), |items| {
        items.get(
            "/:id(\\d+)",
            Handler::new().endpoint(|ctx| {
                let id = ctx.param("id").and_then(|v| v.parse().ok()).unwrap_or_default();
                ctx.json(
                    StatusCode::OK,
                    &Item {
                        id,
                        name: format!("item-{id}"),
                    },
                );
            })?,
        )?;
        items.get(
            "/:id(\\d+)/xml",
            Handler::new().endpoint(|ctx| {
                let id: u64 = ctx.param("id").and_then(|v| v.parse().ok()).unwrap_or_default();
                ctx.xml(
                    StatusCode::OK,
                    &Item {
                        id,
                        name: format!("item-{id}"),
                    },
                );
            })?,
        )?;
        Ok(())
    })?;

    Ok(routes)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("route_kernel=debug,tower_http=debug");

    let cli = Cli::parse();

    tracing::info!("route-kernel v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => KernelConfig::default(),
    };

    tracing::info!(
        timeout_ms = config.timeout_ms,
        read_timeout_ms = config.read_timeout_ms,
        write_timeout_ms = config.write_timeout_ms,
        redirect_fixed_path = config.redirect_fixed_path,
        "Configuration loaded"
    );

    let kernel = Kernel::new(routes()?, config)?;

    // Keep the watcher alive for the lifetime of the server.
    let _watcher = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            let updater = kernel.clone();
            tokio::spawn(async move { updater.apply_config_updates(updates).await });
            Some(watcher)
        }
        _ => None,
    };

    let stopper = kernel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        if let Err(e) = stopper.shutdown().await {
            tracing::warn!(error = %e, "Shutdown requested with no server running");
        }
    });

    #[cfg(unix)]
    if let Some(path) = &cli.unix {
        kernel.run_unix(path).await?;
        tracing::info!("Shutdown complete");
        return Ok(());
    }

    match (&cli.tls_cert, &cli.tls_key) {
        (Some(cert), Some(key)) => kernel.run_tls(&cli.bind, cert, key).await?,
        _ => kernel.run(&cli.bind).await?,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
