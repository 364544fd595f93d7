//! Outgoing response abstraction
//!
//! A buffered byte sink with explicit end-of-response signaling. Handlers
//! write into it during dispatch; the service layer turns the finished
//! value into a hyper response.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::app::AppHandle;
use crate::error::{Error, Result};
use crate::http::mime;
use crate::http::request::RequestHead;
use crate::logger;

#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    headers_sent: bool,
    finished: bool,
    /// Response scoped values for handlers and templates
    pub locals: Map<String, Value>,
    pub(crate) app: Option<AppHandle>,
    pub(crate) request: Option<RequestHead>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
            headers_sent: false,
            finished: false,
            locals: Map::new(),
            app: None,
            request: None,
        }
    }

    pub const fn status_code(&self) -> u16 {
        self.status
    }

    pub fn status(&mut self, code: u16) -> &mut Self {
        self.status = code;
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub const fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Active application, set while an application dispatches this response
    pub fn app(&self) -> Option<&AppHandle> {
        self.app.as_ref()
    }

    /// Request being answered, set while an application dispatches
    pub fn request(&self) -> Option<&RequestHead> {
        self.request.as_ref()
    }

    /// Set the status line; headers count as sent from here on
    pub fn write_head(&mut self, code: u16) -> &mut Self {
        self.status = code;
        self.headers_sent = true;
        self
    }

    pub fn write(&mut self, data: impl AsRef<[u8]>) -> Result<()> {
        if self.finished {
            return Err(Error::ResponseFinished);
        }
        self.headers_sent = true;
        self.body.extend_from_slice(data.as_ref());
        Ok(())
    }

    pub fn end(&mut self) -> Result<()> {
        if self.finished {
            return Err(Error::ResponseFinished);
        }
        self.headers_sent = true;
        self.finished = true;
        Ok(())
    }

    /// End the response if nobody did, never fails
    pub(crate) fn terminate(&mut self) {
        self.headers_sent = true;
        self.finished = true;
    }

    /// True while no content type is set and headers are still open
    pub fn can_assign_content_type(&self) -> bool {
        !self.headers_sent && self.get_header("content-type").is_none()
    }

    /// Set the content type from an extension or short name (`json`, `html`)
    pub fn set_type(&mut self, extension: &str) -> &mut Self {
        let content_type = if extension.contains('/') {
            extension
        } else {
            mime::content_type_for(extension)
        };
        self.set_header("Content-Type", content_type)
    }

    /// Send text and end. Picks `text/html` for bodies starting with `<html`,
    /// `text/plain` otherwise, unless a type is already set.
    pub fn send(&mut self, text: &str) -> Result<()> {
        if self.can_assign_content_type() {
            let content_type = if text.starts_with("<html") {
                "text/html; charset=utf-8"
            } else {
                "text/plain; charset=utf-8"
            };
            self.set_header("Content-Type", content_type);
        }
        self.write(text)?;
        self.end()
    }

    pub fn send_bytes(&mut self, data: &[u8]) -> Result<()> {
        if self.can_assign_content_type() {
            self.set_header("Content-Type", "application/octet-stream");
        }
        self.write(data)?;
        self.end()
    }

    /// Set the status and send its reason phrase as the body
    pub fn send_status(&mut self, code: u16) -> Result<()> {
        self.status = code;
        let reason = StatusCode::from_u16(code)
            .ok()
            .and_then(|s| s.canonical_reason())
            .map_or_else(|| format!("HTTP status {code}"), ToString::to_string);
        self.send(&reason)
    }

    /// Serialize `value` as JSON and end. Pretty printed when the active
    /// application sets `json spaces`.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        if self.can_assign_content_type() {
            self.set_header("Content-Type", "application/json; charset=utf-8");
        }

        let spaces = self.app.as_ref().map_or(0, |app| app.settings().json_spaces());
        let payload = if spaces > 0 {
            let indent = vec![b' '; spaces];
            let mut buf = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
            value.serialize(&mut serializer)?;
            buf
        } else {
            serde_json::to_vec(value)?
        };

        self.write(payload)?;
        self.end()
    }

    /// Render a template through the active application
    pub fn render(&mut self, template: &str, options: Option<Value>) -> Result<()> {
        let app = self.app.clone().ok_or(Error::NoApplicationActive)?;
        app.render(template, options, self)
    }

    /// Convert into a hyper response, dropping headers hyper cannot carry
    pub fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or_else(|_| {
            logger::log_warning(&format!("Invalid status code {}, sending 500", self.status));
            StatusCode::INTERNAL_SERVER_ERROR
        });

        let mut builder = hyper::Response::builder().status(status);
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => builder = builder.header(name, value),
                _ => logger::log_warning(&format!("Dropping invalid header '{name}'")),
            }
        }

        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|e| {
                logger::log_error(&format!("Failed to build {status} response: {e}"));
                let mut fallback = hyper::Response::new(Full::new(Bytes::new()));
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }
}
