//! Math-likelihood heuristic for parenthesized prose.
//!
//! Writers often emit math in plain parentheses instead of `\(...\)`. A
//! parenthesized span is promoted to math when it contains any arithmetic or
//! LaTeX-ish character. This is deliberately permissive: parenthetical asides
//! with a stray hyphen or slash are promoted too.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters whose presence marks a span as probably mathematical
pub const MATH_TRIGGERS: [char; 10] = ['+', '-', '*', '/', '=', '^', '_', '{', '}', '\\'];

/// Innermost `(...)` spans
static PAREN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^()]*)\)").expect("paren regex pattern is valid"));

/// True if `span` contains at least one math trigger character.
pub fn looks_like_math(span: &str) -> bool {
    span.contains(&MATH_TRIGGERS[..])
}

/// A piece of prose after parenthesized spans have been classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Plain(&'a str),
    /// A promoted span: `inner` is the expression, `original` includes the parentheses
    Math { inner: &'a str, original: &'a str },
}

/// Split `text` into plain runs and parenthesized spans that look like math.
pub fn split_parenthesized(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in PAREN_RE.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if !looks_like_math(inner.as_str()) {
            continue;
        }
        if whole.start() > last {
            segments.push(Segment::Plain(&text[last..whole.start()]));
        }
        segments.push(Segment::Math {
            inner: inner.as_str(),
            original: whole.as_str(),
        });
        last = whole.end();
    }

    if last < text.len() {
        segments.push(Segment::Plain(&text[last..]));
    }
    segments
}
