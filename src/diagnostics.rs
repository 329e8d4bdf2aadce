// ABOUTME: Structured diagnostic records shared by every phase

use crate::token::Span;
use std::fmt;

/// Which of the three error categories a diagnostic belongs to. This tag
/// exists so callers (and tests) can group/filter without string-matching
/// the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Lexical,
    Semantic,
    Runtime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub category: Category,
    pub message: String,
    pub span: Option<Span>,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Diagnostic { category, message: message.into(), span: None, hint: None }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn lexical(message: impl Into<String>, span: Span) -> Self {
        Diagnostic::new(Category::Lexical, message).at(span)
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Diagnostic::new(Category::Semantic, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Diagnostic::new(Category::Runtime, message)
    }
}

/// `file:line:col: error: message` followed by a `help:`-indented hint.
/// Rendering to an actual terminal (colors, etc.) is out of scope; this is
/// the plain-text baseline callers may use directly or build on.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some(span) => write!(f, "{}: error: {}", span, self.message)?,
            None => write!(f, "error: {}", self.message)?,
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  help: {}", hint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn renders_with_span_and_hint() {
        let span = Span::point(Rc::from("a.ell"), 3, 7);
        let d = Diagnostic::semantic("unknown identifier `x`")
            .at(span)
            .with_hint("define it earlier, import it, or check for typos");
        let rendered = format!("{}", d);
        assert!(rendered.starts_with("a.ell:3:7: error: unknown identifier `x`"));
        assert!(rendered.contains("help: define it earlier"));
    }

    #[test]
    fn renders_without_span() {
        let d = Diagnostic::semantic("import cycle detected at util");
        assert_eq!(format!("{}", d), "error: import cycle detected at util");
    }
}
