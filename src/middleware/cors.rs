//! CORS headers
//!
//! Sets the `Access-Control-Allow-*` headers on every response and can answer
//! preflight `OPTIONS` requests directly.

use hyper::Method;

use crate::error::Result;
use crate::http::{Request, Response};
use crate::routing::Next;

const DEFAULT_METHODS: &[&str] = &["GET", "HEAD", "POST", "DELETE", "OPTIONS", "PUT", "PATCH"];
const DEFAULT_HEADERS: &[&str] = &["Accept", "Content-Type"];

#[derive(Debug, Clone)]
pub struct CorsOptions {
    pub allow_origin: String,
    /// `None` means `Accept, Content-Type`
    pub allow_headers: Option<Vec<String>>,
    /// `None` means the common verbs
    pub allow_methods: Option<Vec<String>>,
    /// Answer `OPTIONS` with 200 instead of passing it on
    pub handle_options: bool,
}

impl CorsOptions {
    pub fn new(allow_origin: impl Into<String>) -> Self {
        Self {
            allow_origin: allow_origin.into(),
            allow_headers: None,
            allow_methods: None,
            handle_options: false,
        }
    }
}

/// Build the middleware; header values are computed once up front
pub fn cors(
    options: CorsOptions,
) -> impl Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static {
    let headers = options.allow_headers.map_or_else(
        || DEFAULT_HEADERS.join(", "),
        |list| list.join(", "),
    );
    let methods = options.allow_methods.map_or_else(
        || DEFAULT_METHODS.join(","),
        |list| list.join(","),
    );
    let origin = options.allow_origin;
    let handle_options = options.handle_options;

    move |req: &mut Request, res: &mut Response, next: Next<'_>| {
        res.set_header("Access-Control-Allow-Origin", origin.as_str());
        res.set_header("Access-Control-Allow-Headers", headers.as_str());
        res.set_header("Access-Control-Allow-Methods", methods.as_str());

        if req.method == Method::OPTIONS && handle_options {
            res.set_header("Allow", methods.as_str());
            res.write_head(200);
            return res.end();
        }
        next.call();
        Ok(())
    }
}
