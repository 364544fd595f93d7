//! HTTP protocol layer module
//!
//! Request and response abstractions the dispatch core works on, content type
//! helpers and the adapter that connects them to hyper.

pub mod mime;
pub mod request;
pub mod response;
pub mod service;

// Re-export commonly used types
pub use request::{parse_urlencoded, Request, RequestContext, RequestHead};
pub use response::Response;
pub use service::serve;
