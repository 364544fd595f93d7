//! Ordered route collection
//!
//! Routes are tried strictly in registration order. The first route that
//! does not hand control back ends the dispatch; a route error aborts it.

use super::route::Route;
use super::unit::{run_unit, MiddlewareObject, Next, Step};
use crate::error::{Error, Result};
use crate::http::{Request, Response};

#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn push(&mut self, route: Route) {
        self.routes.push(route);
    }
}

impl MiddlewareObject for Router {
    fn handle(
        &self,
        error: Option<&Error>,
        req: &mut Request,
        res: &mut Response,
        next: Next<'_>,
    ) -> Result<()> {
        for route in &self.routes {
            match run_unit(|next| route.handle(error, req, res, next)) {
                Step::Proceed => {}
                Step::Failed(err) => return Err(err),
                Step::Halted => return Ok(()),
            }
        }
        next.call();
        Ok(())
    }

    fn describe(&self) -> String {
        format!("router ({} routes)", self.routes.len())
    }
}
