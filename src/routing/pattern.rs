//! Route pattern compilation and matching
//!
//! A pattern string such as `/users/:id/*` is compiled once into an ordered
//! list of [`Segment`]s. Matching walks the pattern and the request path
//! segments pairwise, left to right, without backtracking.

use std::collections::HashMap;
use std::fmt;

/// A single compiled path component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Leading empty component of an absolute pattern
    Root,
    /// Matched as is
    Literal(String),
    /// `:name`, binds the actual segment to `name`
    Variable(String),
    /// `*`, matches exactly one segment (or every remaining one when last)
    Wildcard,
    /// `text*`
    Prefix(String),
    /// `*text`
    Suffix(String),
    /// `*text*`
    Contains(String),
}

impl Segment {
    fn parse(component: &str) -> Self {
        if component == "*" {
            return Self::Wildcard;
        }
        if let Some(name) = component.strip_prefix(':') {
            return Self::Variable(name.to_string());
        }

        let leading = component.starts_with('*');
        let trailing = component.len() > 1 && component.ends_with('*');
        match (leading, trailing) {
            (true, true) => Self::Contains(component[1..component.len() - 1].to_string()),
            (true, false) => Self::Suffix(component[1..].to_string()),
            (false, true) => Self::Prefix(component[..component.len() - 1].to_string()),
            (false, false) => Self::Literal(component.to_string()),
        }
    }

    fn matches(&self, actual: &str) -> bool {
        match self {
            Self::Root => actual.is_empty(),
            Self::Literal(text) => actual == text,
            Self::Variable(_) | Self::Wildcard => true,
            Self::Prefix(text) => actual.starts_with(text.as_str()),
            Self::Suffix(text) => actual.ends_with(text.as_str()),
            Self::Contains(text) => actual.contains(text.as_str()),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => Ok(()),
            Self::Literal(text) => f.write_str(text),
            Self::Variable(name) => write!(f, ":{name}"),
            Self::Wildcard => f.write_str("*"),
            Self::Prefix(text) => write!(f, "{text}*"),
            Self::Suffix(text) => write!(f, "*{text}"),
            Self::Contains(text) => write!(f, "*{text}*"),
        }
    }
}

/// Successful match of a pattern against path segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Number of actual segments consumed, not counting the ones absorbed
    /// by a trailing wildcard
    pub consumed: usize,
    /// Variable bindings
    pub params: HashMap<String, String>,
}

/// Compiled path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Compile a pattern string. `*` alone means "match anything" and
    /// compiles to `None`.
    pub fn compile(pattern: &str) -> Option<Self> {
        if pattern == "*" {
            return None;
        }

        let segments = components(pattern)
            .enumerate()
            .map(|(idx, component)| {
                if idx == 0 && component.is_empty() {
                    Segment::Root
                } else {
                    Segment::parse(component)
                }
            })
            .collect();

        Some(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True when the last segment is a wildcard absorbing any remaining path
    pub fn has_trailing_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard))
    }

    /// Match against already split (and decoded) path segments
    pub fn match_segments<S: AsRef<str>>(&self, actual: &[S]) -> Option<PatternMatch> {
        let mut pattern = self.segments.as_slice();

        // `/foo/*` also matches a bare `/foo`
        if actual.len() + 1 == pattern.len() && self.has_trailing_wildcard() {
            pattern = &pattern[..pattern.len() - 1];
        }

        if actual.len() < pattern.len() {
            return None;
        }

        let mut params = HashMap::new();
        let mut last_consumed = None;
        for (segment, value) in pattern.iter().zip(actual) {
            let value = value.as_ref();
            if !segment.matches(value) {
                return None;
            }
            if let Segment::Variable(name) = segment {
                params.insert(name.clone(), value.to_string());
            }
            last_consumed = Some(segment);
        }

        let absorbs_rest = matches!(last_consumed, Some(Segment::Wildcard));
        if actual.len() > pattern.len() && !absorbs_rest {
            return None;
        }

        let consumed = if absorbs_rest && pattern.len() == self.segments.len() {
            pattern.len() - 1
        } else {
            pattern.len()
        };

        Some(PatternMatch { consumed, params })
    }

    /// Convenience wrapper splitting and decoding `path` first
    pub fn match_path(&self, path: &str) -> Option<PatternMatch> {
        self.match_segments(&split_path(path))
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments == [Segment::Root] {
            return f.write_str("/");
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Split a path into raw (still percent-encoded) components.
///
/// The query string is ignored and one trailing slash is dropped, so `/` is
/// `[""]` and `/a/` is `["", "a"]`.
pub fn raw_segments(path: &str) -> Vec<&str> {
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    components(path).collect()
}

/// Split a path into percent-decoded components
pub fn split_path(path: &str) -> Vec<String> {
    decode_segments(&raw_segments(path))
}

/// Percent-decode raw components; undecodable ones are kept as is
pub(crate) fn decode_segments(raw: &[&str]) -> Vec<String> {
    raw.iter()
        .map(|segment| {
            urlencoding::decode(segment)
                .map_or_else(|_| (*segment).to_string(), std::borrow::Cow::into_owned)
        })
        .collect()
}

/// Join the first `consumed` raw components back into a path prefix
pub fn consumed_prefix(raw: &[&str], consumed: usize) -> String {
    raw[..consumed.min(raw.len())].join("/")
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.strip_suffix('/').unwrap_or(path).split('/')
}
