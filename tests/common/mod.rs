//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, Request};
use route_kernel::Kernel;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve `kernel` on an ephemeral local port. Returns the base URL and the
/// server task.
pub async fn start_kernel(kernel: &Kernel) -> (String, JoinHandle<Result<(), route_kernel::KernelError>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = kernel.clone();
    let task = tokio::spawn(async move { server.run_listener(listener).await });

    wait_until(|| kernel.is_running()).await;
    (format!("http://{addr}"), task)
}

/// Poll `check` until it holds, for at most two seconds.
pub async fn wait_until<F: Fn() -> bool>(check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// HTTP client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

pub fn request(method: Method, uri: &str) -> Request<Bytes> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}
