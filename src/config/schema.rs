//! Configuration schema definitions.
//!
//! This module defines the process-wide kernel configuration.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the kernel.
///
/// Never mutated in place: a new value replaces the old one as a whole
/// (see `Kernel::set_config`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Default per-request deadline in milliseconds.
    pub timeout_ms: u64,

    /// Time allowed to receive the request body, in milliseconds.
    pub read_timeout_ms: u64,

    /// Time allowed for the whole exchange, in milliseconds.
    pub write_timeout_ms: u64,

    /// Redirect dirty paths (`//`, `.`, `..`) to their cleaned form.
    pub redirect_fixed_path: bool,

    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,

    /// Defaults applied to cookies written by `Context::set_cookie`.
    pub cookie: CookieConfig,
}

impl KernelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            read_timeout_ms: 2_000,
            write_timeout_ms: 10_000,
            redirect_fixed_path: true,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            cookie: CookieConfig::default(),
        }
    }
}

/// Cookie defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    pub path: Option<String>,

    pub domain: Option<String>,

    /// `Expires` is set this many seconds after the cookie is built.
    pub expires_in_secs: Option<u64>,

    /// `Max-Age` attribute; omitted when unset.
    pub max_age_secs: Option<i64>,

    pub secure: bool,

    pub http_only: bool,

    pub same_site: SameSitePolicy,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            path: Some("/".to_string()),
            domain: Some("localhost".to_string()),
            expires_in_secs: Some(144 * 60 * 60),
            max_age_secs: None,
            secure: true,
            http_only: true,
            same_site: SameSitePolicy::Lax,
        }
    }
}

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    #[default]
    Lax,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: KernelConfig = toml::from_str(
            r#"
            timeout_ms = 1500
            redirect_fixed_path = false

            [cookie]
            secure = false
            same_site = "strict"
            "#,
        )
        .unwrap();

        assert_eq!(config.timeout(), Duration::from_millis(1500));
        assert!(!config.redirect_fixed_path);
        assert_eq!(config.read_timeout(), Duration::from_secs(2));
        assert!(!config.cookie.secure);
        assert!(config.cookie.http_only);
        assert_eq!(config.cookie.same_site, SameSitePolicy::Strict);
        assert_eq!(config.cookie.path.as_deref(), Some("/"));
    }
}
