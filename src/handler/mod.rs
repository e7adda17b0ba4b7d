//! Request handlers.
//!
//! # Data Flow
//! ```text
//! RouteTree::dispatch
//!     → Handler::handle(ctx)
//!     → middleware[0].process(ctx, next) → next.run(ctx)
//!     → middleware[1].process(ctx, next) → ...
//!     → endpoint(ctx)
//! ```
//!
//! # Design Decisions
//! - Strictly synchronous: a step either calls its continuation or ends the chain
//! - A handler's timeout override can only shorten the kernel default
//! - Deadlines are advisory; see `deadline.rs`

pub mod chain;
pub mod deadline;

pub use chain::{middleware_fn, Endpoint, FnMiddleware, Handler, Middleware, Next};
pub use deadline::{Deadline, DeadlineError};
