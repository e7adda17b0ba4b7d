//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (at startup):
//!     (method, "/users/:id(\d+)", Handler)
//!     → node.rs (segment parsing, regex compile, conflict checks)
//!     → tree.rs (base middlewares, per-method index)
//!     → Moved into Kernel, read-only from then on
//!
//! Incoming Request (method, path):
//!     → path.rs (canonical form)
//!     → node.rs (backtracking search, parameter capture)
//!     → params.rs (buffer drawn from the shared pool)
//!     → Return: Handler + Params, or the not-found endpoint
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Literal segments are always tried before wildcards at the same depth
//! - Deterministic: same input always matches same route

pub mod node;
pub mod params;
pub mod path;
pub mod tree;

pub use node::{NodeId, RouteNode, Segment, Trie, ROOT};
pub use params::{Param, Params, ParamsPool, PooledParams};
pub use path::clean_path;
pub use tree::{is_allowed, RouteGroup, RouteTree, Routes, ALLOWED_METHODS};
