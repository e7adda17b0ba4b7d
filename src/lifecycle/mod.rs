//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Kernel::shutdown → trigger → stop accepting → drain → finish
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Kernel::shutdown
//! ```
//!
//! # Design Decisions
//! - Shutdown waits for in-flight requests; there is no forced exit

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
