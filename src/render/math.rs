//! Math typesetting with a literal-text fallback.
//!
//! `MathRenderer` never fails: a malformed expression comes back as
//! [`RenderedMath::Raw`] holding the original string, and the caller decides
//! how to display it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use latex2mathml::{latex_to_mathml, DisplayStyle};
use thiserror::Error;
use tracing::warn;

use super::html::escape;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathMode {
    /// Embedded in surrounding text
    Inline,
    /// Its own display-style container
    Block,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesetError {
    #[error("Empty expression")]
    Empty,
    #[error("Unbalanced braces")]
    UnbalancedBraces,
    #[error("Typesetting failed: {0}")]
    Primitive(String),
    #[error("Typesetter panicked")]
    Panicked,
}

/// The typesetting primitive behind [`MathRenderer`]
pub trait Typesetter: Send + Sync {
    fn typeset(&self, expr: &str, mode: MathMode) -> Result<String, TypesetError>;
}

/// LaTeX to MathML via `latex2mathml`
#[derive(Debug, Default, Clone, Copy)]
pub struct MathMlTypesetter;

impl Typesetter for MathMlTypesetter {
    fn typeset(&self, expr: &str, mode: MathMode) -> Result<String, TypesetError> {
        let prepared = prepare(expr)?;
        let style = match mode {
            MathMode::Inline => DisplayStyle::Inline,
            MathMode::Block => DisplayStyle::Block,
        };
        match panic::catch_unwind(AssertUnwindSafe(|| latex_to_mathml(&prepared, style))) {
            // Parse failures come back inline instead of as `Err`
            Ok(Ok(markup)) if markup.contains(PARSE_ERROR_MARKER) => {
                Err(TypesetError::Primitive(parse_error_detail(&markup)))
            }
            Ok(Ok(markup)) => Ok(escape_operator_text(&markup)),
            Ok(Err(e)) => Err(TypesetError::Primitive(format!("{:?}", e))),
            Err(_) => Err(TypesetError::Panicked),
        }
    }
}

/// Text `latex2mathml` embeds in its output when it cannot parse the input
const PARSE_ERROR_MARKER: &str = "[PARSE ERROR";

fn parse_error_detail(markup: &str) -> String {
    markup
        .find(PARSE_ERROR_MARKER)
        .map(|start| &markup[start..])
        .and_then(|rest| rest.find(']').map(|end| rest[1..end].to_string()))
        .unwrap_or_else(|| "PARSE ERROR".to_string())
}

/// `\lt` / `\gt` come out as bare `<` / `>` inside `<mo>`; escape any angle
/// bracket that is not part of a tag.
fn escape_operator_text(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut in_tag = false;
    let mut chars = markup.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '<' if !in_tag && chars.peek().is_some_and(|c| c.is_ascii_alphabetic() || *c == '/') => {
                in_tag = true;
                out.push(ch);
            }
            '<' => out.push_str("&lt;"),
            '>' if in_tag => {
                in_tag = false;
                out.push(ch);
            }
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Reject what the primitive mishandles and spell angle brackets as
/// commands so they cannot be read as markup by the primitive.
fn prepare(expr: &str) -> Result<String, TypesetError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(TypesetError::Empty);
    }
    if !braces_balanced(expr) {
        return Err(TypesetError::UnbalancedBraces);
    }
    Ok(expr.replace('<', r"\lt ").replace('>', r"\gt "))
}

/// Unescaped `{` / `}` must pair up and never close before opening.
fn braces_balanced(expr: &str) -> bool {
    let mut depth: usize = 0;
    let mut chars = expr.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    depth == 0
}

/// Result of rendering one expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedMath {
    /// Typeset markup, safe to embed as is
    Typeset(String),
    /// Typesetting failed; the original expression, unescaped
    Raw(String),
}

impl RenderedMath {
    pub fn is_typeset(&self) -> bool {
        matches!(self, RenderedMath::Typeset(_))
    }

    /// Markup for embedding: typeset output, or the escaped original.
    pub fn into_markup(self) -> String {
        match self {
            RenderedMath::Typeset(markup) => markup,
            RenderedMath::Raw(original) => escape(&original),
        }
    }
}

#[derive(Clone)]
pub struct MathRenderer {
    typesetter: Arc<dyn Typesetter>,
}

impl Default for MathRenderer {
    fn default() -> Self {
        Self::new(Arc::new(MathMlTypesetter))
    }
}

impl MathRenderer {
    pub fn new(typesetter: Arc<dyn Typesetter>) -> Self {
        Self { typesetter }
    }

    pub fn render(&self, expr: &str, mode: MathMode) -> RenderedMath {
        match self.typesetter.typeset(expr, mode) {
            Ok(markup) => RenderedMath::Typeset(markup),
            Err(e) => {
                warn!(error = %e, expr, "math fallback to raw text");
                RenderedMath::Raw(expr.to_string())
            }
        }
    }
}
