//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS/unix connection
//!     → server.rs (Axum setup, request ID, body collection)
//!     → RouteTree::dispatch (blocking pool)
//!     → context.rs (params, store, cookies, deadline)
//!     → render.rs / response.rs (status + content type once, buffered body)
//!     → Send to client
//! ```

pub mod binding;
pub mod context;
pub mod cookie;
pub mod render;
pub mod response;
pub mod server;

pub use binding::Binding;
pub use context::Context;
pub use render::Render;
pub use response::ResponseWriter;
pub use server::build_router;
