//! Middleware-chaining HTTP application framework.
//!
//! Requests travel through ordered routes, each a chain of handler units
//! linked by a [`Next`] continuation. A handler proceeds with `next.call()`,
//! raises with `next.fail(..)` or an `Err` return, or finalizes the response
//! and lets `next` drop. Errors skip plain handlers until an error handler
//! takes them, and bubble to the enclosing route otherwise.
//!
//! ```
//! use trellis::{Application, Request, Response, RouteKeeper};
//! use hyper::Method;
//!
//! let mut app = Application::new();
//! app.get("/hello/:name", |req, res, _next| {
//!     let name = req.param("name").unwrap_or("world").to_string();
//!     res.send(&format!("Hello, {name}!"))
//! });
//!
//! let mut req = Request::new(Method::GET, "/hello/ana");
//! let mut res = Response::new();
//! app.handle_request(&mut req, &mut res);
//! assert_eq!(res.body_text(), "Hello, ana!");
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod middleware;
pub mod routing;

pub use app::{AppHandle, Application, Settings, TemplateEngine};
pub use config::Config;
pub use error::{Error, Result};
pub use http::{Request, Response};
pub use routing::{HandlerUnit, MiddlewareObject, Next, Route, RouteKeeper, RoutePattern, Router};
