//! Handler units and the continuation protocol
//!
//! Every step of a dispatch chain receives a [`Next`] by value. Calling it
//! proceeds (optionally with an error), dropping it means the step finalized
//! the response and the walk stops there.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::http::{Request, Response};

/// Outcome recorded by a [`Next`] when it is used
#[derive(Debug)]
pub(crate) enum Signal {
    Proceed,
    Fail(Error),
}

/// Continuation handed to a handler for exactly one visit
#[must_use = "dropping `Next` halts the chain; call `next.call()` to continue"]
pub struct Next<'a> {
    slot: &'a mut Option<Signal>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(slot: &'a mut Option<Signal>) -> Self {
        Self { slot }
    }

    /// Hand control to the following unit
    pub fn call(self) {
        *self.slot = Some(Signal::Proceed);
    }

    /// Continue in error mode with `err` as the pending error
    pub fn fail(self, err: impl Into<Error>) {
        *self.slot = Some(Signal::Fail(err.into()));
    }

    /// Continue in error mode with an arbitrary value wrapped in [`Error::Value`]
    pub fn fail_with_value<T: fmt::Debug>(self, value: T) {
        *self.slot = Some(Signal::Fail(Error::Value(format!("{value:?}"))));
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("used", &self.slot.is_some()).finish()
    }
}

/// How a single visit ended
#[derive(Debug)]
pub(crate) enum Step {
    /// `next.call()`
    Proceed,
    /// `next.fail(..)` or an `Err` return; a returned error wins over a
    /// continuation that was already called
    Failed(Error),
    /// `Next` was dropped unused
    Halted,
}

/// Run one visit, translating the continuation slot and the return value
pub(crate) fn run_unit<F>(visit: F) -> Step
where
    F: FnOnce(Next<'_>) -> Result<()>,
{
    let mut slot = None;
    let outcome = visit(Next::new(&mut slot));
    match (outcome, slot) {
        (Err(err), _) | (Ok(()), Some(Signal::Fail(err))) => Step::Failed(err),
        (Ok(()), Some(Signal::Proceed)) => Step::Proceed,
        (Ok(()), None) => Step::Halted,
    }
}

/// Plain middleware: `(request, response, next)`
pub type Middleware =
    Arc<dyn Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync>;

/// Error middleware: `(error, request, response, next)`
pub type ErrorMiddleware =
    Arc<dyn Fn(&Error, &mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync>;

/// Something that takes part in dispatch with the full error-aware contract.
///
/// Routes, routers and applications implement this, which is what lets one
/// be nested inside another.
pub trait MiddlewareObject: Send + Sync {
    fn handle(
        &self,
        error: Option<&Error>,
        req: &mut Request,
        res: &mut Response,
        next: Next<'_>,
    ) -> Result<()>;

    /// Short label for diagnostics
    fn describe(&self) -> String {
        "object".to_string()
    }
}

/// One step of a route
#[derive(Clone)]
pub enum HandlerUnit {
    /// Runs only while no error is pending
    Plain(Middleware),
    /// Runs only while an error is pending
    Error(ErrorMiddleware),
    /// Always runs and decides for itself
    Object(Arc<dyn MiddlewareObject>),
}

impl HandlerUnit {
    pub fn plain<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self::Plain(Arc::new(f))
    }

    pub fn error<F>(f: F) -> Self
    where
        F: Fn(&Error, &mut Request, &mut Response, Next<'_>) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        Self::Error(Arc::new(f))
    }

    pub fn object<O: MiddlewareObject + 'static>(object: O) -> Self {
        Self::Object(Arc::new(object))
    }

    pub fn shared(object: Arc<dyn MiddlewareObject>) -> Self {
        Self::Object(object)
    }

    /// Visit this unit. Units whose variant does not fit the pending error
    /// state pass straight through.
    pub(crate) fn invoke(
        &self,
        error: Option<&Error>,
        req: &mut Request,
        res: &mut Response,
        next: Next<'_>,
    ) -> Result<()> {
        match (self, error) {
            (Self::Plain(f), None) => f(req, res, next),
            (Self::Error(f), Some(err)) => f(err, req, res, next),
            (Self::Object(object), error) => object.handle(error, req, res, next),
            (Self::Plain(_), Some(_)) | (Self::Error(_), None) => {
                next.call();
                Ok(())
            }
        }
    }
}

impl fmt::Debug for HandlerUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Plain"),
            Self::Error(_) => f.write_str("Error"),
            Self::Object(object) => write!(f, "Object({})", object.describe()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;

    fn visit(unit: &HandlerUnit, error: Option<&Error>) -> Step {
        let mut req = Request::new(Method::GET, "/");
        let mut res = Response::new();
        run_unit(|next| unit.invoke(error, &mut req, &mut res, next))
    }

    #[test]
    fn test_run_unit_outcomes() {
        assert!(matches!(run_unit(|next| { next.call(); Ok(()) }), Step::Proceed));
        assert!(matches!(run_unit(|_next| Ok(())), Step::Halted));
        assert!(matches!(
            run_unit(|next| { next.fail("bad"); Ok(()) }),
            Step::Failed(Error::Value(ref m)) if m == "bad"
        ));
    }

    #[test]
    fn test_error_return_wins_over_call() {
        let step = run_unit(|next| {
            next.call();
            Err(Error::http(418, "teapot"))
        });
        assert!(matches!(step, Step::Failed(Error::Http { status: 418, .. })));
    }

    #[test]
    fn test_fail_with_value_wraps_debug() {
        let step = run_unit(|next| {
            next.fail_with_value(42_u32);
            Ok(())
        });
        assert!(matches!(step, Step::Failed(Error::Value(ref m)) if m == "42"));
    }

    #[test]
    fn test_plain_skipped_while_error_pending() {
        let unit = HandlerUnit::plain(|_, res, _next| {
            res.status(201);
            Ok(())
        });
        let pending = Error::from("earlier");
        assert!(matches!(visit(&unit, Some(&pending)), Step::Proceed));
        assert!(matches!(visit(&unit, None), Step::Halted));
    }

    #[test]
    fn test_error_unit_skipped_without_error() {
        let unit = HandlerUnit::error(|err, _, res, _next| {
            res.status(err.status());
            Ok(())
        });
        assert!(matches!(visit(&unit, None), Step::Proceed));
        let pending = Error::from("boom");
        assert!(matches!(visit(&unit, Some(&pending)), Step::Halted));
    }

    struct Echo;

    impl MiddlewareObject for Echo {
        fn handle(
            &self,
            error: Option<&Error>,
            _req: &mut Request,
            _res: &mut Response,
            next: Next<'_>,
        ) -> Result<()> {
            match error {
                Some(err) => next.fail(format!("seen: {err}")),
                None => next.call(),
            }
            Ok(())
        }

        fn describe(&self) -> String {
            "echo".to_string()
        }
    }

    #[test]
    fn test_object_always_invoked() {
        let unit = HandlerUnit::object(Echo);
        assert_eq!(format!("{unit:?}"), "Object(echo)");
        assert!(matches!(visit(&unit, None), Step::Proceed));
        let pending = Error::from("x");
        assert!(matches!(
            visit(&unit, Some(&pending)),
            Step::Failed(Error::Value(ref m)) if m == "seen: x"
        ));
    }
}
