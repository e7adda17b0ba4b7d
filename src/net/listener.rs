//! Listener binding.
//!
//! # Responsibilities
//! - Normalize `":port"` addresses to all interfaces
//! - Bind TCP and unix listeners, wrapping failures with the address

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::error::KernelError;

/// `":8080"` means every interface; anything else is used as given.
pub fn normalize_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

/// Parse an address for listeners that need a `SocketAddr` up front.
pub fn socket_addr(addr: &str) -> Result<SocketAddr, KernelError> {
    let normalized = normalize_addr(addr);
    normalized.parse().map_err(|e| KernelError::Bind {
        addr: normalized.clone(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
    })
}

pub async fn bind_tcp(addr: &str) -> Result<TcpListener, KernelError> {
    let normalized = normalize_addr(addr);
    TcpListener::bind(&normalized)
        .await
        .map_err(|source| KernelError::Bind {
            addr: normalized,
            source,
        })
}

/// Bind a unix socket at `path`, removing a stale socket file first.
#[cfg(unix)]
pub fn bind_unix(path: &std::path::Path) -> Result<tokio::net::UnixListener, KernelError> {
    let wrap = |source: std::io::Error| KernelError::Bind {
        addr: path.display().to_string(),
        source,
    };

    if path.exists() {
        std::fs::remove_file(path).map_err(wrap)?;
    }
    tokio::net::UnixListener::bind(path).map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_only_binds_all_interfaces() {
        assert_eq!(normalize_addr(":8080"), "0.0.0.0:8080");
        assert_eq!(normalize_addr("127.0.0.1:80"), "127.0.0.1:80");
        assert!(socket_addr(":443").is_ok());
        assert!(matches!(socket_addr("nope"), Err(KernelError::Bind { .. })));
    }

    #[tokio::test]
    async fn bind_failure_names_the_address() {
        let taken = bind_tcp("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        match bind_tcp(&addr).await {
            Err(KernelError::Bind { addr: reported, .. }) => assert_eq!(reported, addr),
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stale_unix_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.sock");
        std::fs::write(&path, "").unwrap();

        let listener = bind_unix(&path).unwrap();
        assert!(listener.local_addr().is_ok());
    }
}
