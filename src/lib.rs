//! HTTP routing kernel: a path trie with wildcard and regex segments,
//! middleware chains with an explicit continuation, and a small server
//! lifecycle around them.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod kernel;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::{CookieConfig, KernelConfig};
pub use error::{BindError, KernelError, RenderError, RouteError};
pub use handler::{middleware_fn, Deadline, Handler, Middleware, Next};
pub use http::Context;
pub use kernel::Kernel;
pub use routing::{RouteGroup, RouteTree, Routes};
