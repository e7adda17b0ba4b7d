//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (dispatch counters and latency histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Any `metrics` recorder installed by the embedding binary
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every HTTP log line (tower-http)
//! - Metrics are cheap (no recorder means no work)

pub mod logging;
pub mod metrics;
