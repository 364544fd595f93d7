//! Application facade
//!
//! An [`Application`] owns a root [`Route`], a settings map and the template
//! engine registry. Every registered route is a unit of the root route, so an
//! error raised by one route stays pending for the routes after it and
//! `use_error` handlers registered later can take it. The application
//! installs itself as the active application on the request and response
//! while the root route runs and puts the previous values back afterwards,
//! which is what makes applications mountable inside each other.

mod mustache;
mod render;
pub mod settings;

pub use mustache::render_template;
pub use render::{EngineRegistry, TemplateEngine, DEFAULT_ENGINE, VIEWS_ENV};
pub use settings::{truthy, Settings};

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::logger;
use crate::routing::{run_unit, HandlerUnit, MiddlewareObject, Next, Route, RouteKeeper, Step};

/// Value of the `X-Powered-By` header
pub const POWERED_BY: &str = "trellis";

/// Observer fired with the parent each time an application is mounted
pub type MountListener = Box<dyn Fn(&Application) + Send + Sync>;

/// Configuration shared between an application and its handles
#[derive(Debug, Clone, Default)]
pub(crate) struct AppCore {
    id: Option<String>,
    settings: Settings,
    engines: EngineRegistry,
}

/// Cheap, read-only view of an application, attached to requests and
/// responses during dispatch
#[derive(Debug, Clone)]
pub struct AppHandle(Arc<AppCore>);

impl AppHandle {
    pub(crate) fn core(&self) -> &AppCore {
        &self.0
    }

    pub fn id(&self) -> Option<&str> {
        self.0.id.as_deref()
    }

    pub fn settings(&self) -> &Settings {
        &self.0.settings
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.0.settings.get(key)
    }

    /// True when both handles were taken from the same configuration
    pub fn same_app(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

pub struct Application {
    core: Arc<AppCore>,
    root: Route,
    mount_paths: Vec<String>,
    mount_listeners: Vec<MountListener>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    /// New application with the `mustache` engine registered for the
    /// `mustache` and `html` extensions
    pub fn new() -> Self {
        let mut app = Self {
            core: Arc::new(AppCore::default()),
            root: Route::new(None, "*", Vec::new()),
            mount_paths: Vec::new(),
            mount_listeners: Vec::new(),
        };
        app.set(settings::VIEW_ENGINE, DEFAULT_ENGINE);
        app.engine("mustache", mustache::engine());
        app.engine("html", mustache::engine());
        app
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.core).id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.core.id.as_deref()
    }

    /// Route holding every registered route as one of its units
    pub fn root(&self) -> &Route {
        &self.root
    }

    pub fn route_count(&self) -> usize {
        self.root.units().len()
    }

    /// Handle to attach to requests; reflects the settings at call time
    pub fn app_handle(&self) -> AppHandle {
        AppHandle(Arc::clone(&self.core))
    }

    // Settings

    pub fn settings(&self) -> &Settings {
        &self.core.settings
    }

    /// Set `key`; `Value::Null` removes it
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        Arc::make_mut(&mut self.core).settings.set(key, value);
        self
    }

    pub fn unset(&mut self, key: &str) -> &mut Self {
        Arc::make_mut(&mut self.core).settings.unset(key);
        self
    }

    /// Read a setting of this application only, never of a parent.
    /// (`get` registers a GET route, see [`RouteKeeper`].)
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.core.settings.get(key)
    }

    pub fn enable(&mut self, key: &str) -> &mut Self {
        Arc::make_mut(&mut self.core).settings.enable(key);
        self
    }

    pub fn disable(&mut self, key: &str) -> &mut Self {
        Arc::make_mut(&mut self.core).settings.disable(key);
        self
    }

    pub fn enabled(&self, key: &str) -> bool {
        self.core.settings.enabled(key)
    }

    /// Copy loaded configuration into the settings map
    pub fn configure(&mut self, config: &Config) -> &mut Self {
        self.set(settings::ENV, config.app.env.as_str())
            .set(settings::X_POWERED_BY, config.app.x_powered_by)
            .set(settings::JSON_SPACES, config.app.json_spaces)
            .set(settings::VIEW_ENGINE, config.views.engine.as_str());
        if let Some(dir) = &config.views.dir {
            self.set(settings::VIEWS, dir.as_str());
        }
        if let Some(options) = &config.views.options {
            self.set(settings::VIEW_OPTIONS, options.clone());
        }
        for (key, value) in &config.settings {
            self.set(key, value.clone());
        }
        self
    }

    // Engines

    /// Register a template engine for a file extension
    pub fn engine(&mut self, extension: &str, engine: TemplateEngine) -> &mut Self {
        Arc::make_mut(&mut self.core).engines.register(extension, engine);
        self
    }

    pub fn engines(&self) -> &EngineRegistry {
        &self.core.engines
    }

    /// Render a template into `res` with this application's settings
    pub fn render(&self, template: &str, options: Option<Value>, res: &mut Response) -> Result<()> {
        render::render_view(&self.core.settings, &self.core.engines, template, options, res)
    }

    // Mounting

    pub fn on_mount<F>(&mut self, listener: F) -> &mut Self
    where
        F: Fn(&Self) + Send + Sync + 'static,
    {
        self.mount_listeners.push(Box::new(listener));
        self
    }

    /// Record that this application was mounted at `prefix` below `parent`
    /// and notify the listeners
    pub fn mount_at(&mut self, prefix: &str, parent: &Self) {
        self.mount_paths.push(prefix.to_string());
        for listener in &self.mount_listeners {
            listener(parent);
        }
    }

    /// Prefixes this application was mounted at, in mount order
    pub fn mount_path(&self) -> &[String] {
        &self.mount_paths
    }

    /// Mount `child` below `prefix`. The child matches its own routes
    /// against the path remaining after the prefix.
    pub fn mount(&mut self, prefix: &str, mut child: Self) -> &mut Self {
        child.mount_at(prefix, self);
        logger::log_debug(&format!("Mounted {child} at {prefix}"));
        self.add_route(Route::new(None, &mount_pattern(prefix), vec![HandlerUnit::object(child)]));
        self
    }

    /// Mount one child at several prefixes, sharing a single instance
    pub fn mount_many(&mut self, prefixes: &[&str], mut child: Self) -> &mut Self {
        for prefix in prefixes {
            child.mount_at(prefix, self);
        }
        let child: Arc<dyn MiddlewareObject> = Arc::new(child);
        for prefix in prefixes {
            self.add_route(Route::new(
                None,
                &mount_pattern(prefix),
                vec![HandlerUnit::shared(Arc::clone(&child))],
            ));
        }
        self
    }

    // Entry point

    /// Dispatch a request from the transport layer. The response is always
    /// finished afterwards: escaped errors become their status code and an
    /// unhandled request becomes 404.
    pub fn handle_request(&self, req: &mut Request, res: &mut Response) {
        if self.core.settings.x_powered_by() {
            res.set_header("X-Powered-By", POWERED_BY);
        }

        match run_unit(|next| self.handle(None, req, res, next)) {
            Step::Proceed if !res.is_finished() => {
                let message = format!("Cannot {} {}", req.method, req.path());
                logger::log_debug(&format!("[{self}] {message}"));
                self.write_failure(res, 404, &message);
            }
            Step::Failed(err) => {
                logger::log_error(&format!("Unhandled error for {} {}: {err}", req.method, req.url));
                let status = err.status();
                let message = if self.core.settings.env() == "production" {
                    reason(status)
                } else {
                    format!("{}: {err}", reason(status))
                };
                self.write_failure(res, status, &message);
            }
            Step::Proceed | Step::Halted => {}
        }

        res.terminate();
    }

    fn write_failure(&self, res: &mut Response, status: u16, message: &str) {
        if res.headers_sent() {
            logger::log_warning(&format!(
                "[{self}] Headers already sent, cannot answer {status}"
            ));
            return;
        }
        res.status(status);
        res.set_header("Content-Type", "text/plain; charset=utf-8");
        if let Err(err) = res.write(message) {
            logger::log_warning(&format!("Failed to write {status} body: {err}"));
        }
    }
}

impl RouteKeeper for Application {
    fn add_route(&mut self, route: Route) {
        self.root.push(HandlerUnit::object(route));
    }
}

impl MiddlewareObject for Application {
    fn handle(
        &self,
        error: Option<&Error>,
        req: &mut Request,
        res: &mut Response,
        next: Next<'_>,
    ) -> Result<()> {
        let handle = self.app_handle();
        let saved_req_app = req.context.app.replace(handle.clone());
        let saved_res_app = res.app.replace(handle);
        let saved_request = res.request.replace(req.head());
        let saved_route = req.context.route.clone();

        let step = run_unit(|inner| self.root.handle(error, req, res, inner));

        req.context.app = saved_req_app;
        req.context.route = saved_route;
        res.app = saved_res_app;
        res.request = saved_request;

        match step {
            Step::Proceed => {
                next.call();
                Ok(())
            }
            Step::Failed(err) => Err(err),
            Step::Halted => Ok(()),
        }
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<Application:")?;
        if let Some(id) = &self.core.id {
            write!(f, " id={id}")?;
        }
        match self.route_count() {
            0 => f.write_str(" no-routes")?,
            1 => f.write_str(" route")?,
            n => write!(f, " #routes={n}")?,
        }
        match self.mount_paths.as_slice() {
            [] => {}
            [single] => write!(f, " mounted={single}")?,
            many => write!(f, " mounted=[{}]", many.join(","))?,
        }
        if !self.core.engines.is_empty() {
            let engines: Vec<_> = self.core.engines.extensions().collect();
            write!(f, " engines={}", engines.join(","))?;
        }
        for (key, value) in self.core.settings.iter() {
            write!(f, " '{key}'={value}")?;
        }
        f.write_str(">")
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("core", &self.core)
            .field("root", &self.root)
            .field("mount_paths", &self.mount_paths)
            .field("mount_listeners", &self.mount_listeners.len())
            .finish()
    }
}

/// `/admin` and `/admin/` both mount as `/admin/*`
fn mount_pattern(prefix: &str) -> String {
    format!("{}/*", prefix.trim_end_matches('/'))
}

fn reason(status: u16) -> String {
    hyper::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;
    use std::sync::Mutex;

    fn dispatch(app: &Application, method: Method, url: &str) -> Response {
        let mut req = Request::new(method, url);
        let mut res = Response::new();
        app.handle_request(&mut req, &mut res);
        res
    }

    #[test]
    fn test_unhandled_request_is_404() {
        let app = Application::new();
        let res = dispatch(&app, Method::GET, "/missing");
        assert_eq!(res.status_code(), 404);
        assert_eq!(res.body_text(), "Cannot GET /missing");
        assert_eq!(res.get_header("x-powered-by"), Some(POWERED_BY));
        assert!(res.is_finished());
    }

    #[test]
    fn test_x_powered_by_can_be_disabled() {
        let mut app = Application::new();
        app.disable(settings::X_POWERED_BY);
        let res = dispatch(&app, Method::GET, "/");
        assert!(res.get_header("x-powered-by").is_none());
    }

    #[test]
    fn test_escaped_error_becomes_500() {
        let mut app = Application::new();
        app.get("/boom", |_, _, _next| Err(Error::from("kaboom")));

        let res = dispatch(&app, Method::GET, "/boom");
        assert_eq!(res.status_code(), 500);
        assert_eq!(res.body_text(), "Internal Server Error: kaboom");
        assert!(res.is_finished());

        app.set(settings::ENV, "production");
        let res = dispatch(&app, Method::GET, "/boom");
        assert_eq!(res.body_text(), "Internal Server Error");
    }

    #[test]
    fn test_http_error_keeps_status() {
        let mut app = Application::new();
        app.use_middleware(|_, _, next| {
            next.fail(Error::http(403, "no entry"));
            Ok(())
        });
        let res = dispatch(&app, Method::GET, "/");
        assert_eq!(res.status_code(), 403);
    }

    #[test]
    fn test_use_error_catches_earlier_route_failure() {
        let mut app = Application::new();
        app.get("/boom", |_, _, _next| Err(Error::http(503, "down")))
            .use_error(|err, _, res, _next| res.send(&format!("handled {err}")));

        let res = dispatch(&app, Method::GET, "/boom");
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.body_text(), "handled HTTP 503: down");
        assert!(res.is_finished());
    }

    #[test]
    fn test_plain_routes_skipped_while_error_pending() {
        let mut app = Application::new();
        app.get("/boom", |_, _, _next| Err(Error::from("first")))
            .use_middleware(|_, res, _next| res.send("should not run"))
            .use_error(|err, _, res, next| {
                res.set_header("X-Seen", &err.to_string());
                next.call();
                Ok(())
            });

        let res = dispatch(&app, Method::GET, "/boom");
        assert_eq!(res.get_header("x-seen"), Some("first"));
        assert_eq!(res.status_code(), 500);
        assert_eq!(res.body_text(), "Internal Server Error: first");
    }

    #[test]
    fn test_error_routes_not_run_without_error() {
        let mut app = Application::new();
        app.use_error(|_, _, res, _next| res.send("error"))
            .get("/", |_, res, _next| res.send("home"));
        assert_eq!(dispatch(&app, Method::GET, "/").body_text(), "home");
    }

    #[test]
    fn test_active_route_restored_after_app() {
        let mut app = Application::new();
        app.get("/x", |req, res, _next| {
            let route = req.context.route.as_deref().unwrap_or_default().to_string();
            res.send(&route)
        });

        let mut req = Request::new(Method::GET, "/x");
        req.context.route = Some(Arc::from("outer"));
        let mut res = Response::new();
        let step = run_unit(|next| app.handle(None, &mut req, &mut res, next));

        assert!(matches!(step, Step::Halted));
        assert_eq!(res.body_text(), "GET /x");
        assert_eq!(req.context.route.as_deref(), Some("outer"));
        assert!(req.context.app.is_none());
        assert!(res.request.is_none());
    }

    #[test]
    fn test_halting_handler_is_terminated() {
        let mut app = Application::new();
        app.get("/partial", |_, res, _next| res.write("started"));
        let res = dispatch(&app, Method::GET, "/partial");
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.body_text(), "started");
        assert!(res.is_finished());
    }

    #[test]
    fn test_mounted_app_sees_base_and_suffix() {
        let mut admin = Application::new().with_id("admin");
        admin.get("/index", |req, res, _next| {
            let base = req.base_url().unwrap_or_default().to_string();
            let app_id = req.app().and_then(AppHandle::id).unwrap_or_default().to_string();
            res.send(&format!("{app_id} {base}"))
        });

        let mut main = Application::new().with_id("main");
        main.mount("/admin", admin);

        let res = dispatch(&main, Method::GET, "/admin/index");
        assert_eq!(res.body_text(), "admin /admin/index");

        let res = dispatch(&main, Method::GET, "/index");
        assert_eq!(res.status_code(), 404);
    }

    #[test]
    fn test_mount_fires_listeners_and_records_paths() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        let mut child = Application::new();
        child.on_mount(move |parent| {
            log.lock()
                .expect("lock")
                .push(parent.id().unwrap_or_default().to_string());
        });

        let parent = Application::new().with_id("parent");
        child.mount_at("/a", &parent);
        child.mount_at("/b", &parent);
        assert_eq!(child.mount_path(), ["/a".to_string(), "/b".to_string()]);
        assert_eq!(*seen.lock().expect("lock"), vec!["parent", "parent"]);
        assert!(child.to_string().contains("mounted=[/a,/b]"));
    }

    #[test]
    fn test_mount_many_shares_one_child() {
        let mut child = Application::new();
        child.get("/ping", |req, res, _next| {
            let base = req.base_url().unwrap_or_default().to_string();
            res.send(&base)
        });

        let mut main = Application::new();
        main.mount_many(&["/v1", "/v2"], child);
        assert_eq!(main.route_count(), 2);
        assert_eq!(dispatch(&main, Method::GET, "/v1/ping").body_text(), "/v1/ping");
        assert_eq!(dispatch(&main, Method::GET, "/v2/ping").body_text(), "/v2/ping");
    }

    #[test]
    fn test_unmatched_child_returns_to_parent_context() {
        let mut child = Application::new().with_id("child");
        child.get("/known", |_, res, _next| res.send("child"));

        let mut main = Application::new().with_id("main");
        main.mount("/sub", child);
        main.use_middleware(|req, res, _next| {
            let app_id = req.app().and_then(AppHandle::id).unwrap_or_default().to_string();
            let base = req.base_url().map(ToString::to_string).unwrap_or_default();
            let active = res.app().and_then(AppHandle::id).unwrap_or_default().to_string();
            res.send(&format!("{app_id}|{base}|{active}"))
        });

        let res = dispatch(&main, Method::GET, "/sub/unknown");
        assert_eq!(res.body_text(), "main||main");
    }

    #[test]
    fn test_error_in_child_caught_by_parent_route() {
        let mut child = Application::new();
        child.get("/fail", |_, _, _next| Err(Error::http(418, "teapot")));

        let mut main = Application::new();
        main.route(
            &[],
            "/child/*",
            vec![
                HandlerUnit::object(child),
                HandlerUnit::error(|err, _, res, _next| {
                    res.status(err.status());
                    res.send("recovered")
                }),
            ],
        );

        let res = dispatch(&main, Method::GET, "/child/fail");
        assert_eq!(res.status_code(), 418);
        assert_eq!(res.body_text(), "recovered");
    }

    #[test]
    fn test_settings_are_not_inherited() {
        let mut child = Application::new();
        child.get("/", |req, res, _next| {
            let title = req
                .app()
                .and_then(|app| app.setting("title"))
                .and_then(Value::as_str)
                .unwrap_or("none")
                .to_string();
            res.send(&title)
        });

        let mut main = Application::new();
        main.set("title", "Main");
        main.mount("/c", child);
        assert_eq!(dispatch(&main, Method::GET, "/c").body_text(), "none");
    }

    #[test]
    fn test_configure_copies_settings() {
        let mut config = Config::default();
        config.app.env = "production".to_string();
        config.app.json_spaces = 2;
        config.views.dir = Some("/srv/views".to_string());
        config.settings.insert("title".to_string(), Value::from("Site"));

        let mut app = Application::new();
        app.configure(&config);
        assert_eq!(app.settings().env(), "production");
        assert_eq!(app.settings().json_spaces(), 2);
        assert_eq!(app.settings().get_str(settings::VIEWS), Some("/srv/views"));
        assert_eq!(app.setting("title"), Some(&Value::from("Site")));
    }

    #[test]
    fn test_display() {
        let mut app = Application::new().with_id("shop");
        app.get("/", |_, res, _next| res.send("home"));
        let text = app.to_string();
        assert!(text.starts_with("<Application: id=shop route"));
        assert!(text.contains("engines=mustache,html"));
    }
}
