//! Built-in template engine
//!
//! Logic-less mustache: `{{name}}` (HTML escaped), `{{{name}}}` and
//! `{{& name}}` (raw), dotted lookups through the context stack, sections
//! (`{{#list}}..{{/list}}`), inverted sections (`{{^list}}..{{/list}}`),
//! `{{! comments }}` and `{{> partial}}` loaded from the directory of the
//! including template. Delimiter changes are not supported.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use super::render::TemplateEngine;
use crate::error::{Error, Result};
use crate::logger;

const PARTIAL_EXTENSION: &str = "mustache";
const MAX_PARTIAL_DEPTH: usize = 8;

/// Parsed template
#[derive(Debug, PartialEq)]
enum Node {
    Text(String),
    Variable { name: String, escape: bool },
    Section { name: String, inverted: bool, children: Vec<Node> },
    Partial(String),
}

/// Engine rendering the file at `path` with `options` as the root context
pub fn engine() -> TemplateEngine {
    Arc::new(|path: &Path, options: &Value| {
        render_file(path, &[options], 0).map(|text| Some(Value::String(text)))
    })
}

fn render_file(path: &Path, stack: &[&Value], depth: usize) -> Result<String> {
    let source = std::fs::read_to_string(path)?;
    let nodes = parse(&source)?;
    let mut out = String::with_capacity(source.len());
    render_nodes(&nodes, stack, path.parent(), depth, &mut out)?;
    Ok(out)
}

/// Render `source` against `context`. Partials resolve relative to `dir`.
pub fn render_template(
    source: &str,
    context: &Value,
    dir: Option<&Path>,
    depth: usize,
) -> Result<String> {
    let nodes = parse(source)?;
    let mut out = String::with_capacity(source.len());
    render_nodes(&nodes, &[context], dir, depth, &mut out)?;
    Ok(out)
}

fn parse(source: &str) -> Result<Vec<Node>> {
    // Open sections: (name, inverted, nodes collected before the section)
    let mut open: Vec<(String, bool, Vec<Node>)> = Vec::new();
    let mut nodes = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            nodes.push(Node::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];

        if let Some(inner) = after.strip_prefix('{') {
            let close = inner
                .find("}}}")
                .ok_or_else(|| Error::Template("unclosed '{{{' tag".to_string()))?;
            nodes.push(Node::Variable { name: inner[..close].trim().to_string(), escape: false });
            rest = &inner[close + 3..];
            continue;
        }

        let close = after
            .find("}}")
            .ok_or_else(|| Error::Template("unclosed '{{' tag".to_string()))?;
        let tag = after[..close].trim();
        rest = &after[close + 2..];

        let (sigil, name) = match tag.chars().next() {
            Some(c @ ('!' | '&' | '>' | '#' | '^' | '/' | '=')) => (Some(c), tag[1..].trim()),
            _ => (None, tag),
        };

        match sigil {
            Some('!') => {}
            Some('&') => nodes.push(Node::Variable { name: name.to_string(), escape: false }),
            Some('>') => nodes.push(Node::Partial(name.to_string())),
            Some(c @ ('#' | '^')) => {
                let outer = std::mem::take(&mut nodes);
                open.push((name.to_string(), c == '^', outer));
            }
            Some('/') => {
                let (opened, inverted, outer) = open
                    .pop()
                    .ok_or_else(|| Error::Template(format!("unopened section '{name}'")))?;
                if opened != name {
                    return Err(Error::Template(format!(
                        "section '{opened}' closed by '{name}'"
                    )));
                }
                let children = std::mem::replace(&mut nodes, outer);
                nodes.push(Node::Section { name: opened, inverted, children });
            }
            Some(_) => return Err(Error::Template(format!("unsupported tag '{tag}'"))),
            None => nodes.push(Node::Variable { name: name.to_string(), escape: true }),
        }
    }

    if let Some((name, _, _)) = open.last() {
        return Err(Error::Template(format!("unclosed section '{name}'")));
    }
    if !rest.is_empty() {
        nodes.push(Node::Text(rest.to_string()));
    }
    Ok(nodes)
}

fn render_nodes(
    nodes: &[Node],
    stack: &[&Value],
    dir: Option<&Path>,
    depth: usize,
    out: &mut String,
) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable { name, escape: true } => out.push_str(&escape_html(&lookup_text(stack, name))),
            Node::Variable { name, escape: false } => out.push_str(&lookup_text(stack, name)),
            Node::Partial(name) => render_partial(name, stack, dir, depth, out)?,
            Node::Section { name, inverted, children } => {
                let value = lookup(stack, name);
                if *inverted {
                    if !is_truthy(value) {
                        render_nodes(children, stack, dir, depth, out)?;
                    }
                    continue;
                }
                match value {
                    Some(Value::Array(items)) => {
                        for item in items {
                            let mut inner = stack.to_vec();
                            inner.push(item);
                            render_nodes(children, &inner, dir, depth, out)?;
                        }
                    }
                    Some(value) if is_truthy(Some(value)) => {
                        let mut inner = stack.to_vec();
                        inner.push(value);
                        render_nodes(children, &inner, dir, depth, out)?;
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

fn render_partial(
    name: &str,
    stack: &[&Value],
    dir: Option<&Path>,
    depth: usize,
    out: &mut String,
) -> Result<()> {
    if depth >= MAX_PARTIAL_DEPTH {
        return Err(Error::Template(format!(
            "partial '{name}' nested deeper than {MAX_PARTIAL_DEPTH} levels"
        )));
    }

    let file_name = if Path::new(name).extension().is_some() {
        name.to_string()
    } else {
        format!("{name}.{PARTIAL_EXTENSION}")
    };
    let path = dir.unwrap_or_else(|| Path::new(".")).join(file_name);

    if !path.is_file() {
        logger::log_warning(&format!("Could not locate partial '{name}' at {}", path.display()));
        return Ok(());
    }
    out.push_str(&render_file(&path, stack, depth + 1)?);
    Ok(())
}

/// `null`, `false`, `""` and `[]` skip a section
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null | Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

/// Resolve a dotted name. The first key is searched from the innermost
/// context outwards; `.` is the innermost context itself.
fn lookup<'a>(stack: &[&'a Value], name: &str) -> Option<&'a Value> {
    let (&top, _) = stack.split_last()?;
    if name == "." {
        return Some(top);
    }
    let mut keys = name.split('.');
    let first = keys.next()?;
    let found = stack.iter().rev().find_map(|&context| child(context, first))?;
    keys.try_fold(found, child)
}

fn child<'a>(current: &'a Value, key: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    }
}

fn lookup_text(stack: &[&Value], name: &str) -> String {
    match lookup(stack, name) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
