//! Path template compilation and matching.
//!
//! # Responsibilities
//! - Compile a path template into an immutable sequence of parts
//! - Match a concrete path against the compiled parts
//! - Extract named captures and the wildcard remainder
//!
//! # Template Syntax
//! ```text
//! /api/session          literal segments
//! /:id                  named capture (one or more of a-z A-Z 0-9 - _ ~ space %)
//! (/:id)                optional group, tried present-first
//! /*                    remainder, captured with its leading '/' under `_`
//! *                     bare wildcard, captured under `_`
//! ```
//!
//! # Design Decisions
//! - Whole-path matches only; no partial matches
//! - Captures are greedy, wildcards are lazy
//! - First structurally compatible interpretation wins
//! - A single trailing '/' on the path is tolerated

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use thiserror::Error;

/// Reserved capture key for the wildcard remainder.
pub const WILDCARD_KEY: &str = "_";

/// Errors raised while compiling a path template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// A `(` was never closed.
    #[error("unclosed group opened at byte {0}")]
    UnclosedGroup(usize),

    /// A `)` had no matching `(`.
    #[error("unexpected ')' at byte {0}")]
    UnexpectedClose(usize),

    /// A `:` was not followed by a name.
    #[error("capture at byte {0} has no name")]
    EmptyName(usize),

    /// The same capture name appears twice.
    #[error("capture name {0:?} is used more than once")]
    DuplicateName(String),
}

/// One compiled element of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Slash,
    Literal(String),
    Capture(String),
    Wildcard,
    /// A `/` fused with the `*` that follows it.
    Remainder,
    Optional(Vec<Part>),
}

/// Named values extracted from a matched path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    /// Value captured under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// The wildcard remainder, if the template had one and it matched.
    pub fn wildcard(&self) -> Option<&str> {
        self.get(WILDCARD_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A compiled path template.
///
/// Immutable once compiled and safe to share across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    template: String,
    parts: Vec<Part>,
}

impl PathPattern {
    /// Compile a template.
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        let parts = Parser::new(template).parse()?;
        Ok(Self {
            template: template.to_string(),
            parts,
        })
    }

    /// The source template.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Match `path` and return its captures.
    pub fn matches(&self, path: &str) -> Option<Params> {
        self.match_exact(path).or_else(|| {
            path.strip_suffix('/')
                .and_then(|trimmed| self.match_exact(trimmed))
        })
    }

    fn match_exact(&self, path: &str) -> Option<Params> {
        let parts: Vec<&Part> = self.parts.iter().collect();
        let mut captures = Vec::new();
        walk(&parts, path, &mut captures).then(|| captures.into_iter().collect())
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// Characters a named capture may span.
fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '~' | ' ' | '%')
}

type Captures<'p, 'i> = Vec<(&'p str, &'i str)>;

/// Match `parts` against the whole of `input`.
///
/// Leaves `captures` untouched when it returns false.
fn walk<'p, 'i>(parts: &[&'p Part], input: &'i str, captures: &mut Captures<'p, 'i>) -> bool {
    let Some((&first, rest)) = parts.split_first() else {
        return input.is_empty();
    };

    match first {
        Part::Slash => input
            .strip_prefix('/')
            .is_some_and(|tail| walk(rest, tail, captures)),
        Part::Literal(text) => input
            .strip_prefix(text.as_str())
            .is_some_and(|tail| walk(rest, tail, captures)),
        Part::Capture(name) => {
            let limit = input
                .find(|c: char| !is_segment_char(c))
                .unwrap_or(input.len());
            for end in (1..=limit).rev() {
                captures.push((name.as_str(), &input[..end]));
                if walk(rest, &input[end..], captures) {
                    return true;
                }
                captures.pop();
            }
            false
        }
        Part::Wildcard => lazy_capture(rest, input, 0, captures),
        Part::Remainder => input.starts_with('/') && lazy_capture(rest, input, 1, captures),
        Part::Optional(inner) => {
            let mut expanded: Vec<&Part> = inner.iter().collect();
            expanded.extend_from_slice(rest);
            walk(&expanded, input, captures) || walk(rest, input, captures)
        }
    }
}

/// Capture the shortest prefix of `input` (at least `min` bytes) that lets
/// `rest` match what follows.
fn lazy_capture<'p, 'i>(
    rest: &[&'p Part],
    input: &'i str,
    min: usize,
    captures: &mut Captures<'p, 'i>,
) -> bool {
    // Nothing left to match, so only the whole input can work.
    if rest.is_empty() {
        if input.len() < min {
            return false;
        }
        captures.push((WILDCARD_KEY, input));
        return true;
    }

    for end in (min..=input.len()).filter(|&i| input.is_char_boundary(i)) {
        captures.push((WILDCARD_KEY, &input[..end]));
        if walk(rest, &input[end..], captures) {
            return true;
        }
        captures.pop();
    }
    false
}

struct Parser<'a> {
    template: &'a str,
    names: HashSet<String>,
}

impl<'a> Parser<'a> {
    fn new(template: &'a str) -> Self {
        Self {
            template,
            names: HashSet::new(),
        }
    }

    fn parse(mut self) -> Result<Vec<Part>, PatternError> {
        // Each open group keeps its byte offset and the parts collected so far.
        let mut stack: Vec<(usize, Vec<Part>)> = Vec::new();
        let mut current: Vec<Part> = Vec::new();
        let mut literal = String::new();
        let mut chars = self.template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            if !matches!(c, '/' | '(' | ')' | '*' | ':') {
                literal.push(c);
                continue;
            }
            flush_literal(&mut current, &mut literal);

            match c {
                '/' => current.push(Part::Slash),
                '*' => {
                    if current.last() == Some(&Part::Slash) {
                        current.pop();
                        current.push(Part::Remainder);
                    } else {
                        current.push(Part::Wildcard);
                    }
                }
                '(' => stack.push((pos, std::mem::take(&mut current))),
                ')' => {
                    let (_, mut outer) = stack.pop().ok_or(PatternError::UnexpectedClose(pos))?;
                    outer.push(Part::Optional(std::mem::take(&mut current)));
                    current = outer;
                }
                _ => {
                    let mut name = String::new();
                    while let Some(&(_, next)) = chars.peek() {
                        if !(next.is_ascii_alphanumeric() || next == '_') {
                            break;
                        }
                        name.push(next);
                        chars.next();
                    }
                    if name.is_empty() {
                        return Err(PatternError::EmptyName(pos));
                    }
                    if !self.names.insert(name.clone()) {
                        return Err(PatternError::DuplicateName(name));
                    }
                    current.push(Part::Capture(name));
                }
            }
        }
        flush_literal(&mut current, &mut literal);

        if let Some((pos, _)) = stack.pop() {
            return Err(PatternError::UnclosedGroup(pos));
        }
        Ok(current)
    }
}

fn flush_literal(parts: &mut Vec<Part>, literal: &mut String) {
    if !literal.is_empty() {
        parts.push(Part::Literal(std::mem::take(literal)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_literal_paths() {
        let pattern = PathPattern::compile("/api/session").unwrap();
        assert_eq!(pattern.matches("/api/session"), Some(Params::default()));
        assert_eq!(pattern.matches("/api/session/"), Some(Params::default()));
        assert_eq!(pattern.matches("/api/sessions"), None);
        assert_eq!(pattern.matches("/api"), None);

        let root = PathPattern::compile("/").unwrap();
        assert_eq!(root.matches("/"), Some(Params::default()));
        assert_eq!(root.matches("/x"), None);
    }

    #[test]
    fn test_optional_capture() {
        let pattern = PathPattern::compile("(/:id)").unwrap();
        assert_eq!(pattern.matches("/abc"), Some(params(&[("id", "abc")])));
        assert_eq!(pattern.matches(""), Some(Params::default()));
        assert_eq!(pattern.matches("/"), Some(Params::default()));
        assert_eq!(pattern.matches("/abc/def"), None);
    }

    #[test]
    fn test_remainder_capture() {
        let pattern = PathPattern::compile("/api/session/:id(/*)").unwrap();

        let found = pattern.matches("/api/session/XYZ/foo/bar").unwrap();
        assert_eq!(found, params(&[("id", "XYZ"), ("_", "/foo/bar")]));
        assert_eq!(found.wildcard(), Some("/foo/bar"));

        let found = pattern.matches("/api/session/XYZ/").unwrap();
        assert_eq!(found, params(&[("id", "XYZ"), ("_", "/")]));

        let found = pattern.matches("/api/session/XYZ").unwrap();
        assert_eq!(found, params(&[("id", "XYZ")]));
        assert_eq!(found.wildcard(), None);

        assert_eq!(pattern.matches("/api/session"), None);
        assert_eq!(pattern.matches("/api/session/"), None);
    }

    #[test]
    fn test_bare_wildcard() {
        let pattern = PathPattern::compile("/static*").unwrap();
        assert_eq!(
            pattern.matches("/static/css/app.css"),
            Some(params(&[("_", "/css/app.css")]))
        );
        assert_eq!(pattern.matches("/static"), Some(params(&[("_", "")])));
    }

    #[test]
    fn test_capture_inside_segment() {
        let pattern = PathPattern::compile("/files/:name.json").unwrap();
        assert_eq!(
            pattern.matches("/files/report.json"),
            Some(params(&[("name", "report")]))
        );
        assert_eq!(pattern.matches("/files/.json"), None);
    }

    #[test]
    fn test_multiple_captures() {
        let pattern = PathPattern::compile("/users/:user/posts/:post").unwrap();
        assert_eq!(
            pattern.matches("/users/7/posts/42"),
            Some(params(&[("user", "7"), ("post", "42")]))
        );
        assert_eq!(pattern.matches("/users/7/posts"), None);
    }

    #[test]
    fn test_capture_charset() {
        let pattern = PathPattern::compile("/e/:id").unwrap();
        assert_eq!(
            pattern.matches("/e/a-B_9~%20x"),
            Some(params(&[("id", "a-B_9~%20x")]))
        );
        assert_eq!(pattern.matches("/e/a b"), Some(params(&[("id", "a b")])));
        assert_eq!(pattern.matches("/e/a.b"), None);
        assert_eq!(pattern.matches("/e/caf\u{e9}"), None);
        assert_eq!(pattern.matches("/e/a@b"), None);
    }

    #[test]
    fn test_long_remainder_matches_quickly() {
        let pattern = PathPattern::compile("/api/session/:id(/*)").unwrap();
        let tail = "/x".repeat(128 * 1024);
        let path = format!("/api/session/abc{tail}");

        let started = std::time::Instant::now();
        let found = pattern.matches(&path).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert_eq!(found.get("id"), Some("abc"));
        assert_eq!(found.wildcard(), Some(tail.as_str()));

        let long_id = "a".repeat(64 * 1024);
        let found = pattern.matches(&format!("/api/session/{long_id}")).unwrap();
        assert_eq!(found.get("id"), Some(long_id.as_str()));
    }

    #[test]
    fn test_compile_errors() {
        assert_eq!(
            PathPattern::compile("/a(/:b").unwrap_err(),
            PatternError::UnclosedGroup(2)
        );
        assert_eq!(
            PathPattern::compile("/a)").unwrap_err(),
            PatternError::UnexpectedClose(2)
        );
        assert_eq!(
            PathPattern::compile("/:/x").unwrap_err(),
            PatternError::EmptyName(1)
        );
        assert_eq!(
            PathPattern::compile("/:id/:id").unwrap_err(),
            PatternError::DuplicateName("id".into())
        );
    }

    #[test]
    fn test_template_display() {
        let pattern = PathPattern::compile("/api/session/:id(/*)").unwrap();
        assert_eq!(pattern.to_string(), "/api/session/:id(/*)");
        assert_eq!(pattern.template(), "/api/session/:id(/*)");
    }
}
