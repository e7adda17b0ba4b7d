//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Kernel::run / run_unix / run_tls
//!     → listener.rs (address normalization, bind)
//!     → tls.rs (optional rustls setup)
//!     → Hand off to HTTP layer
//! ```

pub mod listener;
pub mod tls;
