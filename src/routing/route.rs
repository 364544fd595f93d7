//! Route execution
//!
//! A route gates an ordered list of [`HandlerUnit`]s behind an optional
//! method filter and an optional [`RoutePattern`], and walks that list with
//! a single pending-error slot.

use hyper::Method;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::pattern::{consumed_prefix, decode_segments, raw_segments, RoutePattern};
use super::unit::{run_unit, HandlerUnit, MiddlewareObject, Next, Step};
use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::logger;

/// How a walk over the unit list ended
#[derive(Debug)]
pub(crate) enum Walk {
    /// The last unit called its continuation and no new error was raised
    Completed,
    /// The list ran out with an error raised inside this walk
    Failed(Error),
    /// A unit did not call its continuation
    Halted,
}

pub struct Route {
    methods: Option<Vec<Method>>,
    pattern: Option<RoutePattern>,
    units: Vec<HandlerUnit>,
    id: Option<String>,
    signature: Arc<str>,
}

impl Route {
    /// Build a route. `methods` of `None` accepts any method, a pattern of
    /// `*` matches every path.
    pub fn new(methods: Option<Vec<Method>>, pattern: &str, units: Vec<HandlerUnit>) -> Self {
        let pattern = RoutePattern::compile(pattern);
        let signature = signature(methods.as_deref(), pattern.as_ref());
        Self {
            methods,
            pattern,
            units,
            id: None,
            signature: signature.into(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn methods(&self) -> Option<&[Method]> {
        self.methods.as_deref()
    }

    pub fn pattern(&self) -> Option<&RoutePattern> {
        self.pattern.as_ref()
    }

    pub fn units(&self) -> &[HandlerUnit] {
        &self.units
    }

    pub fn push(&mut self, unit: HandlerUnit) {
        self.units.push(unit);
    }

    /// Method plus pattern, e.g. `GET /users/:id`
    pub fn signature(&self) -> &str {
        &self.signature
    }

    fn accepts_method(&self, method: &Method) -> bool {
        self.methods
            .as_ref()
            .map_or(true, |methods| methods.contains(method))
    }

    /// Match the part of the request path below the current base.
    /// Returns the bindings and the new base on success.
    fn match_request(pattern: &RoutePattern, req: &Request) -> Option<(HashMap<String, String>, String)> {
        let path = req.path();
        let base = req.context.base_url.as_deref().unwrap_or("");
        let rest = path.strip_prefix(base).unwrap_or(path);
        let rest = if rest.is_empty() { "/" } else { rest };

        let raw = raw_segments(rest);
        let matched = pattern.match_segments(&decode_segments(&raw))?;
        let new_base = format!("{base}{}", consumed_prefix(&raw, matched.consumed));
        Some((matched.params, new_base))
    }

    /// Walk the unit list in order. `error_in` is the error pending in the
    /// enclosing walk; errors raised here take precedence over it.
    pub(crate) fn walk(
        &self,
        error_in: Option<&Error>,
        req: &mut Request,
        res: &mut Response,
    ) -> Walk {
        let mut raised: Option<Error> = None;

        for unit in &self.units {
            let pending = raised.as_ref().or(error_in);
            match run_unit(|next| unit.invoke(pending, req, res, next)) {
                Step::Proceed => {}
                Step::Failed(err) => {
                    logger::log_debug(&format!("[{}] {unit:?} raised: {err}", self.signature));
                    raised = Some(err);
                }
                Step::Halted => return Walk::Halted,
            }
        }

        raised.map_or(Walk::Completed, Walk::Failed)
    }
}

impl MiddlewareObject for Route {
    fn handle(
        &self,
        error: Option<&Error>,
        req: &mut Request,
        res: &mut Response,
        next: Next<'_>,
    ) -> Result<()> {
        if !self.accepts_method(&req.method) {
            next.call();
            return Ok(());
        }

        let matched = match &self.pattern {
            Some(pattern) => match Self::match_request(pattern, req) {
                Some(found) => Some(found),
                None => {
                    next.call();
                    return Ok(());
                }
            },
            None => None,
        };

        if self.units.is_empty() {
            next.call();
            return Ok(());
        }

        let saved_params = req.context.params.clone();
        let saved_route = req.context.route.replace(Arc::clone(&self.signature));
        let saved_base = req.context.base_url.clone();

        if let Some((params, base)) = matched {
            req.context.params.extend(params);
            req.context.base_url = Some(base);
        }

        let outcome = self.walk(error, req, res);

        req.context.params = saved_params;
        req.context.route = saved_route;
        req.context.base_url = saved_base;

        match outcome {
            Walk::Completed => {
                next.call();
                Ok(())
            }
            Walk::Failed(err) => Err(err),
            Walk::Halted => Ok(()),
        }
    }

    fn describe(&self) -> String {
        match &self.id {
            Some(id) => format!("{id} ({})", self.signature),
            None => self.signature.to_string(),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("signature", &self.signature)
            .field("id", &self.id)
            .field("units", &self.units)
            .finish()
    }
}

fn signature(methods: Option<&[Method]>, pattern: Option<&RoutePattern>) -> String {
    let methods = methods.map_or_else(
        || "*".to_string(),
        |list| {
            list.iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(",")
        },
    );
    let pattern = pattern.map_or_else(|| "*".to_string(), ToString::to_string);
    format!("{methods} {pattern}")
}
