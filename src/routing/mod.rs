//! Routing module
//!
//! The request-dispatch core:
//! - Path pattern compilation and matching
//! - Handler units and the `Next` continuation
//! - Routes walking their units with a pending-error slot
//! - Routers trying routes in registration order

mod keeper;
pub mod pattern;
mod route;
mod router;
mod unit;

pub use keeper::RouteKeeper;
pub use pattern::{split_path, PatternMatch, RoutePattern, Segment};
pub use route::Route;
pub use router::Router;
pub use unit::{ErrorMiddleware, HandlerUnit, Middleware, MiddlewareObject, Next};

pub(crate) use unit::{run_unit, Step};
