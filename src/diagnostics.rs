//! Diagnostics reported by the transformer.
//!
//! Reflection metadata is best-effort decoration: most failures degrade the
//! emitted type to `any` and are silent. The diagnostics collected here are
//! the exceptions, namely malformed project configuration (warning) and
//! compiler-program invariant violations that abort a file (error).

use crate::span::Span;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticCategory {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub file: String,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn error(file: impl Into<String>, span: Span, message: impl Into<String>) -> Self {
        Self {
            category: DiagnosticCategory::Error,
            file: file.into(),
            span,
            message: message.into(),
        }
    }

    pub fn warning(file: impl Into<String>, span: Span, message: impl Into<String>) -> Self {
        Self {
            category: DiagnosticCategory::Warning,
            file: file.into(),
            span,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let category = match self.category {
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Error => "error",
        };
        if self.span.is_dummy() {
            write!(f, "{}: {}: {}", self.file, category, self.message)
        } else {
            write!(f, "{}:{}: {}: {}", self.file, self.span, category, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_file_and_category() {
        let d = Diagnostic::warning("a.ts", Span::dummy(), "bad config");
        assert_eq!(d.to_string(), "a.ts: warning: bad config");
    }

    #[test]
    fn display_includes_the_span_when_present() {
        let d = Diagnostic::error("a.ts", Span::new(4, 9), "broken");
        assert_eq!(d.to_string(), "a.ts:4..9: error: broken");
    }
}
