//! Incoming request abstraction
//!
//! Carries the request line, headers and the already collected body, plus the
//! typed [`RequestContext`] that routes and applications push and pop while a
//! request travels through the chain.

use hyper::body::Bytes;
use hyper::Method;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

use crate::app::AppHandle;
use crate::error::{Error, Result};

/// Per-request dispatch state
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Variables bound by matching route patterns
    pub params: HashMap<String, String>,
    /// Path prefix consumed by enclosing routes and mounts
    pub base_url: Option<String>,
    /// Signature of the route currently walking its handlers
    pub route: Option<Arc<str>>,
    /// Innermost application the request is dispatched through
    pub app: Option<AppHandle>,
}

/// Method and URL snapshot attached to a response during dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Path plus optional query string
    pub url: String,
    pub http_version: String,
    headers: Vec<(String, String)>,
    pub body: Bytes,
    pub context: RequestContext,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            http_version: "1.1".to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
            context: RequestContext::default(),
        }
    }

    /// Build from hyper request parts and a collected body
    pub fn from_parts(parts: &hyper::http::request::Parts, body: Bytes) -> Self {
        let url = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());

        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let http_version = match parts.version {
            hyper::Version::HTTP_10 => "1.0",
            hyper::Version::HTTP_2 => "2",
            hyper::Version::HTTP_3 => "3",
            _ => "1.1",
        };

        Self {
            method: parts.method.clone(),
            url,
            http_version: http_version.to_string(),
            headers,
            body,
            context: RequestContext::default(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Replace (or add) a header, names compare case-insensitively
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// URL without the query string
    pub fn path(&self) -> &str {
        self.url.split_once('?').map_or(self.url.as_str(), |(p, _)| p)
    }

    pub fn query_string(&self) -> Option<&str> {
        self.url.split_once('?').map(|(_, q)| q)
    }

    /// Decoded query parameters, last occurrence of a key wins
    pub fn query(&self) -> HashMap<String, String> {
        self.query_string().map(parse_urlencoded).unwrap_or_default()
    }

    /// Route variable bound for this request
    pub fn param(&self, name: &str) -> Option<&str> {
        self.context.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.context.params
    }

    pub fn base_url(&self) -> Option<&str> {
        self.context.base_url.as_deref()
    }

    pub fn app(&self) -> Option<&AppHandle> {
        self.context.app.as_ref()
    }

    pub fn head(&self) -> RequestHead {
        RequestHead {
            method: self.method.clone(),
            url: self.url.clone(),
        }
    }

    /// Body as UTF-8 text
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.body).map_err(|e| Error::Body(e.to_string()))
    }

    /// Body deserialized from JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Body(e.to_string()))
    }

    /// Body decoded as `application/x-www-form-urlencoded`
    pub fn form(&self) -> Result<HashMap<String, String>> {
        Ok(parse_urlencoded(self.text()?))
    }

    /// Whether the request content type contains `pattern`.
    ///
    /// A trailing `*` turns the pattern into a prefix check (`text/*`).
    pub fn is(&self, pattern: &str) -> bool {
        let Some(content_type) = self.header("content-type") else {
            return false;
        };
        let content_type = content_type.to_ascii_lowercase();
        let pattern = pattern.to_ascii_lowercase();

        if let Some(prefix) = pattern.strip_suffix('*') {
            return content_type.starts_with(prefix);
        }
        content_type.contains(&pattern)
    }

    /// First entry of the Accept header that mentions `content_type`
    pub fn accepts(&self, content_type: &str) -> Option<&str> {
        let accept = self.header("accept")?;
        let wanted = content_type.to_ascii_lowercase();
        accept
            .split(',')
            .map(str::trim)
            .find(|candidate| candidate.to_ascii_lowercase().contains(&wanted))
    }

    /// True for requests sent by `XMLHttpRequest`
    pub fn xhr(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.contains("XMLHttpRequest"))
    }
}

/// Decode `a=1&b=two+words` style strings
pub fn parse_urlencoded(input: &str) -> HashMap<String, String> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(key);
            if key.is_empty() {
                return None;
            }
            Some((key, decode_component(value)))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).map_or_else(|_| spaced.clone(), std::borrow::Cow::into_owned)
}
