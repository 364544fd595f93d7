//! hyper adapter
//!
//! Turns one `hyper::Request` into a dispatch through an [`Application`] and
//! returns the finished response. Meant to be wrapped in
//! `hyper::service::service_fn` by whatever owns the connection.

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use super::{Request, Response};
use crate::app::Application;
use crate::logger::{self, AccessLogEntry};

/// Collect the body, dispatch and convert the response back
pub async fn serve<B>(
    app: Arc<Application>,
    req: hyper::Request<B>,
) -> Result<hyper::Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let started = Instant::now();
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            let mut res = Response::new();
            res.status(400);
            // A fresh response cannot be finished yet
            if let Err(err) = res.send("Bad Request") {
                logger::log_error(&format!("Failed to write 400 response: {err}"));
            }
            return Ok(res.into_hyper());
        }
    };

    let mut request = Request::from_parts(&parts, body);
    let mut response = Response::new();
    app.handle_request(&mut request, &mut response);

    if let Some(format) = logger::access_log_format() {
        let entry = AccessLogEntry::from_exchange(&request, &response, started.elapsed());
        logger::log_access(&entry, format);
    }

    Ok(response.into_hyper())
}
