//! Route registration helpers
//!
//! Anything that can take a [`Route`] gets the familiar `use_middleware`,
//! `get`, `post`, ... shortcuts for free.

use hyper::Method;
use std::sync::Arc;

use super::route::Route;
use super::router::Router;
use super::unit::{HandlerUnit, MiddlewareObject, Next};
use crate::error::{Error, Result};
use crate::http::{Request, Response};

pub trait RouteKeeper {
    fn add_route(&mut self, route: Route);

    /// Run `f` for every request
    fn use_middleware<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.add_route(Route::new(None, "*", vec![HandlerUnit::plain(f)]));
        self
    }

    /// Run `f` for every request whose path matches `pattern`
    fn use_at<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.add_route(Route::new(None, pattern, vec![HandlerUnit::plain(f)]));
        self
    }

    /// Run `f` whenever an error is pending
    fn use_error<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Error, &mut Request, &mut Response, Next<'_>) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.add_route(Route::new(None, "*", vec![HandlerUnit::error(f)]));
        self
    }

    /// Attach a route, router or application below `pattern`
    fn use_object<O>(&mut self, pattern: &str, object: O) -> &mut Self
    where
        O: MiddlewareObject + 'static,
    {
        self.add_route(Route::new(None, pattern, vec![HandlerUnit::object(object)]));
        self
    }

    fn use_shared(&mut self, pattern: &str, object: Arc<dyn MiddlewareObject>) -> &mut Self {
        self.add_route(Route::new(None, pattern, vec![HandlerUnit::shared(object)]));
        self
    }

    /// Any method
    fn all<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.use_at(pattern, f)
    }

    fn on<F>(&mut self, method: Method, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.add_route(Route::new(Some(vec![method]), pattern, vec![HandlerUnit::plain(f)]));
        self
    }

    fn get<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.on(Method::GET, pattern, f)
    }

    fn post<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.on(Method::POST, pattern, f)
    }

    fn put<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.on(Method::PUT, pattern, f)
    }

    fn patch<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.on(Method::PATCH, pattern, f)
    }

    fn delete<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.on(Method::DELETE, pattern, f)
    }

    fn head<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.on(Method::HEAD, pattern, f)
    }

    fn options<F>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.on(Method::OPTIONS, pattern, f)
    }

    /// Register several units at once under one method filter.
    /// An empty `methods` slice accepts any method.
    fn route(&mut self, methods: &[Method], pattern: &str, units: Vec<HandlerUnit>) -> &mut Self {
        let methods = (!methods.is_empty()).then(|| methods.to_vec());
        self.add_route(Route::new(methods, pattern, units));
        self
    }
}

impl RouteKeeper for Router {
    fn add_route(&mut self, route: Route) {
        self.push(route);
    }
}

/// Routes nest: a route added to a route becomes one of its units
impl RouteKeeper for Route {
    fn add_route(&mut self, route: Route) {
        self.push(HandlerUnit::object(route));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::unit::{run_unit, Step};

    fn run(router: &Router, method: Method, path: &str) -> (Step, Response) {
        let mut req = Request::new(method, path);
        let mut res = Response::new();
        let step = run_unit(|next| router.handle(None, &mut req, &mut res, next));
        (step, res)
    }

    #[test]
    fn test_verb_shortcuts_filter_methods() {
        let mut router = Router::new();
        router
            .get("/item", |_, res, _next| res.send("get"))
            .post("/item", |_, res, _next| res.send("post"))
            .delete("/item", |_, res, _next| res.send("delete"));

        assert_eq!(router.len(), 3);
        assert_eq!(run(&router, Method::GET, "/item").1.body_text(), "get");
        assert_eq!(run(&router, Method::POST, "/item").1.body_text(), "post");
        assert_eq!(run(&router, Method::DELETE, "/item").1.body_text(), "delete");
        assert!(matches!(run(&router, Method::PUT, "/item").0, Step::Proceed));
    }

    #[test]
    fn test_use_middleware_then_handler() {
        let mut router = Router::new();
        router
            .use_middleware(|_, res, next| {
                res.set_header("X-Stage", "pre");
                next.call();
                Ok(())
            })
            .get("/", |_, res, _next| res.send("home"));

        let (_, res) = run(&router, Method::GET, "/");
        assert_eq!(res.get_header("x-stage"), Some("pre"));
        assert_eq!(res.body_text(), "home");
    }

    #[test]
    fn test_router_stops_at_failing_route() {
        let mut router = Router::new();
        router
            .get("/fail", |_, _, _next| Err(Error::http(503, "down")))
            .use_error(|_, _, res, _next| res.send("handled"));

        let (step, res) = run(&router, Method::GET, "/fail");
        assert!(matches!(step, Step::Failed(Error::Http { status: 503, .. })));
        assert!(res.body().is_empty());
    }

    #[test]
    fn test_use_error_catches_route_failures() {
        let mut root = Route::new(None, "*", Vec::new());
        root.get("/fail", |_, _, _next| Err(Error::http(503, "down")))
            .get("/fail", |_, res, _next| res.send("unreachable"))
            .use_error(|err, _, res, _next| {
                res.status(err.status());
                res.send("handled")
            });

        let mut req = Request::new(Method::GET, "/fail");
        let mut res = Response::new();
        let step = run_unit(|next| root.handle(None, &mut req, &mut res, next));

        assert!(matches!(step, Step::Halted));
        assert_eq!(res.status_code(), 503);
        assert_eq!(res.body_text(), "handled");
    }

    #[test]
    fn test_multi_unit_route_with_error_handler() {
        let mut router = Router::new();
        router.route(
            &[Method::GET],
            "/fail",
            vec![
                HandlerUnit::plain(|_, _, _next| Err(Error::http(503, "down"))),
                HandlerUnit::error(|err, _, res, _next| {
                    res.status(err.status());
                    res.send("handled")
                }),
            ],
        );

        let (step, res) = run(&router, Method::GET, "/fail");
        assert!(matches!(step, Step::Halted));
        assert_eq!(res.status_code(), 503);
        assert_eq!(res.body_text(), "handled");
    }

    #[test]
    fn test_nested_route_keeper() {
        let mut api = Route::new(None, "/api/*", Vec::new());
        api.get("/users/:id", |req, res, _next| {
            let id = req.param("id").unwrap_or_default().to_string();
            res.send(&id)
        });

        let mut router = Router::new();
        router.add_route(api);

        let (_, res) = run(&router, Method::GET, "/api/users/7");
        assert_eq!(res.body_text(), "7");
    }
}
