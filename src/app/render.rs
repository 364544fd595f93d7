//! View rendering
//!
//! Resolves a template name to a file in the views directory, runs the
//! matching engine and writes the result to the response.

use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::settings::{Settings, VIEWS, VIEW_ENGINE, VIEW_OPTIONS};
use super::AppHandle;
use crate::error::{Error, Result};
use crate::http::{mime, Response};
use crate::logger;

/// Engine used when `view engine` is not set
pub const DEFAULT_ENGINE: &str = "mustache";

/// Environment variable consulted when `views` is not set
pub const VIEWS_ENV: &str = "TRELLIS_VIEWS";

/// Content type some hosts put on directory responses; rendering replaces it
const DIRECTORY_CONTENT_TYPE: &str = "httpd/unix-directory";

/// Renders the file at a path with the given options.
/// `Ok(None)` means the engine produced no content.
pub type TemplateEngine = Arc<dyn Fn(&Path, &Value) -> Result<Option<Value>> + Send + Sync>;

/// Engines keyed by file extension, in registration order
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: Vec<(String, TemplateEngine)>,
}

impl EngineRegistry {
    /// Register `engine` for `extension`, replacing an earlier registration
    /// in place
    pub fn register(&mut self, extension: &str, engine: TemplateEngine) {
        let extension = extension.trim_start_matches('.');
        match self.engines.iter_mut().find(|(ext, _)| ext == extension) {
            Some(slot) => slot.1 = engine,
            None => self.engines.push((extension.to_string(), engine)),
        }
    }

    pub fn get(&self, extension: &str) -> Option<&TemplateEngine> {
        self.engines
            .iter()
            .find(|(ext, _)| ext == extension)
            .map(|(_, engine)| engine)
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.engines.iter().map(|(ext, _)| ext.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.extensions()).finish()
    }
}

impl AppHandle {
    /// Render `template` into `res`.
    ///
    /// Lookup failures answer 404, engine failures 500 and an engine without
    /// output 204; only an unknown `view engine` is returned as an error.
    pub fn render(&self, template: &str, options: Option<Value>, res: &mut Response) -> Result<()> {
        let core = self.core();
        render_view(&core.settings, &core.engines, template, options, res)
    }
}

pub(crate) fn render_view(
    settings: &Settings,
    engines: &EngineRegistry,
    template: &str,
    options: Option<Value>,
    res: &mut Response,
) -> Result<()> {
    let preferred = settings.get_str(VIEW_ENGINE).unwrap_or(DEFAULT_ENGINE);
    if engines.get(preferred).is_none() {
        return Err(Error::UnsupportedViewEngine(preferred.to_string()));
    }

    let views = views_dir(settings);
    let Some((path, engine)) = lookup_template(&views, template, preferred, engines) else {
        logger::log_warning(&format!(
            "Did not find template '{template}' in {}",
            views.display()
        ));
        res.write_head(404);
        return res.end();
    };

    let options = options
        .or_else(|| settings.get(VIEW_OPTIONS).cloned())
        .unwrap_or_else(|| Value::Object(Map::new()));

    let rendered = match engine(&path, &options) {
        Ok(Some(Value::String(text))) => text,
        Ok(Some(other)) => {
            logger::log_warning(&format!(
                "Template '{template}' produced a non-string value, stringifying"
            ));
            other.to_string()
        }
        Ok(None) => {
            logger::log_warning(&format!("Template '{template}' returned no content"));
            res.write_head(204);
            return res.end();
        }
        Err(err) => {
            logger::log_error(&format!("Template error in {}: {err}", path.display()));
            res.write_head(500);
            return res.end();
        }
    };

    let assign_type = res
        .get_header("content-type")
        .map_or(true, |current| current == DIRECTORY_CONTENT_TYPE);
    if assign_type {
        res.set_header("Content-Type", mime::detect_content_type(&rendered));
    }

    res.write_head(200);
    res.write(rendered)?;
    res.end()
}

/// `views` setting, then `TRELLIS_VIEWS`, then the working directory
fn views_dir(settings: &Settings) -> PathBuf {
    settings
        .get_str(VIEWS)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(VIEWS_ENV).map(PathBuf::from))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Probe `{dir}/{template}.{ext}` for the preferred extension first, then for
/// every registered one. The engine registered for the matching extension
/// renders the file.
fn lookup_template<'a>(
    dir: &Path,
    template: &str,
    preferred: &'a str,
    engines: &'a EngineRegistry,
) -> Option<(PathBuf, &'a TemplateEngine)> {
    std::iter::once(preferred)
        .chain(engines.extensions().filter(|ext| *ext != preferred))
        .find_map(|ext| {
            let candidate = dir.join(format!("{template}.{ext}"));
            if candidate.is_file() {
                engines.get(ext).map(|engine| (candidate, engine))
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Application;
    use serde_json::json;

    fn app_with_views(dir: &Path) -> Application {
        let mut app = Application::new();
        app.set(VIEWS, dir.to_string_lossy().to_string());
        app
    }

    #[test]
    fn test_render_detects_html() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("index.mustache"), "<html>{{title}}</html>").expect("write");

        let app = app_with_views(dir.path());
        let mut res = Response::new();
        app.app_handle()
            .render("index", Some(json!({"title": "Hi"})), &mut res)
            .expect("render");

        assert_eq!(res.status_code(), 200);
        assert_eq!(res.body_text(), "<html>Hi</html>");
        assert_eq!(res.get_header("content-type"), Some("text/html; charset=utf-8"));
        assert!(res.is_finished());
    }

    #[test]
    fn test_render_falls_back_to_other_extensions() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("card.html"), "BEGIN:VCARD\nFN:{{name}}").expect("write");

        let app = app_with_views(dir.path());
        let mut res = Response::new();
        app.app_handle()
            .render("card", Some(json!({"name": "Ann"})), &mut res)
            .expect("render");

        assert_eq!(res.get_header("content-type"), Some("text/vcard; charset=utf-8"));
        assert_eq!(res.body_text(), "BEGIN:VCARD\nFN:Ann");
    }

    #[test]
    fn test_render_uses_view_options_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("plain.mustache"), "site={{site}}").expect("write");

        let mut app = app_with_views(dir.path());
        app.set(VIEW_OPTIONS, json!({"site": "trellis"}));
        let mut res = Response::new();
        res.set_header("Content-Type", "text/plain");
        app.app_handle().render("plain", None, &mut res).expect("render");

        assert_eq!(res.body_text(), "site=trellis");
        assert_eq!(res.get_header("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_missing_template_is_404() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_with_views(dir.path());
        let mut res = Response::new();
        app.app_handle().render("nope", None, &mut res).expect("render");
        assert_eq!(res.status_code(), 404);
        assert!(res.is_finished());
    }

    #[test]
    fn test_unknown_engine_is_error() {
        let mut app = Application::new();
        app.set(VIEW_ENGINE, "jade");
        let mut res = Response::new();
        let err = app.app_handle().render("index", None, &mut res).unwrap_err();
        assert!(matches!(err, Error::UnsupportedViewEngine(ref name) if name == "jade"));
    }

    #[test]
    fn test_engine_outcomes_map_to_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["empty", "broken", "number"] {
            std::fs::write(dir.path().join(format!("{name}.txt")), name).expect("write");
        }

        let mut app = app_with_views(dir.path());
        app.engine(
            "txt",
            Arc::new(|path: &Path, _options: &Value| {
                match path.file_stem().and_then(|s| s.to_str()) {
                    Some("empty") => Ok(None),
                    Some("broken") => Err(Error::Template("bad".into())),
                    _ => Ok(Some(json!(42))),
                }
            }),
        );
        app.set(VIEW_ENGINE, "txt");
        let handle = app.app_handle();

        let mut res = Response::new();
        handle.render("empty", None, &mut res).expect("render");
        assert_eq!(res.status_code(), 204);

        let mut res = Response::new();
        handle.render("broken", None, &mut res).expect("render");
        assert_eq!(res.status_code(), 500);

        let mut res = Response::new();
        handle.render("number", None, &mut res).expect("render");
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.body_text(), "42");
    }

    #[test]
    fn test_registry_keeps_order_and_replaces() {
        let mut registry = EngineRegistry::default();
        registry.register("mustache", crate::app::mustache::engine());
        registry.register(".html", crate::app::mustache::engine());
        registry.register("mustache", crate::app::mustache::engine());
        assert_eq!(registry.extensions().collect::<Vec<_>>(), vec!["mustache", "html"]);
        assert_eq!(format!("{registry:?}"), r#"["mustache", "html"]"#);
    }
}
