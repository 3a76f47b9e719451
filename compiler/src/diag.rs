// diag.rs — Diagnostics shared by the notation front end and the core
//
// Arity checks, propagation and type inference report through the same
// `Diagnostic` value; the driver renders it with `Display`.

use std::fmt;

use crate::ast::Span;

/// Stable identifier of a failure class, e.g. `E0303`. Constants live in
/// [`codes`] and keep their meaning forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registered diagnostic codes.
///
/// `E01xx` type algebra, `E02xx` box structure and propagation,
/// `E03xx` type inference, `E04xx` driver front end and configuration.
pub mod codes {
    use super::DiagCode;

    pub const E0100: DiagCode = DiagCode("E0100"); // incompatible type shapes in join
    pub const E0101: DiagCode = DiagCode("E0101"); // tuplet arity mismatch in join
    pub const E0102: DiagCode = DiagCode("E0102"); // integer type required
    pub const E0103: DiagCode = DiagCode("E0103"); // constant type required
    pub const E0104: DiagCode = DiagCode("E0104"); // init-time computable type required

    pub const E0200: DiagCode = DiagCode("E0200"); // wrong number of input signals for a box
    pub const E0201: DiagCode = DiagCode("E0201"); // malformed route arguments
    pub const E0202: DiagCode = DiagCode("E0202"); // foreign function arity mismatch
    pub const E0203: DiagCode = DiagCode("E0203"); // box cannot be propagated
    pub const E0204: DiagCode = DiagCode("E0204"); // invalid composition arity
    pub const E0205: DiagCode = DiagCode("E0205"); // unknown extended primitive
    pub const E0206: DiagCode = DiagCode("E0206"); // domain error in constant folding

    pub const E0300: DiagCode = DiagCode("E0300"); // unrecognized signal
    pub const E0301: DiagCode = DiagCode("E0301"); // projection of a non-tuplet
    pub const E0302: DiagCode = DiagCode("E0302"); // projection index out of range
    pub const E0303: DiagCode = DiagCode("E0303"); // unbounded delay amount
    pub const E0304: DiagCode = DiagCode("E0304"); // possibly negative delay amount
    pub const E0305: DiagCode = DiagCode("E0305"); // soundfile part out of range
    pub const E0306: DiagCode = DiagCode("E0306"); // table operand is not a table
    pub const E0307: DiagCode = DiagCode("E0307"); // table index is not an integer
    pub const E0308: DiagCode = DiagCode("E0308"); // empty waveform
    pub const E0309: DiagCode = DiagCode("E0309"); // signal was never typed
    pub const E0310: DiagCode = DiagCode("E0310"); // compile-time constant required
    pub const E0311: DiagCode = DiagCode("E0311"); // recursive group without hypothesis
    pub const E0312: DiagCode = DiagCode("E0312"); // extended primitive arity mismatch

    pub const E0400: DiagCode = DiagCode("E0400"); // unknown identifier
    pub const E0401: DiagCode = DiagCode("E0401"); // invalid arguments in notation
    pub const E0402: DiagCode = DiagCode("E0402"); // invalid compiler options
    pub const E0403: DiagCode = DiagCode("E0403"); // duplicate primitive registration
    pub const E0404: DiagCode = DiagCode("E0404"); // syntax error in notation
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

/// One link in a cause chain explaining a propagated failure.
#[derive(Debug, Clone)]
pub struct CauseRecord {
    pub message: String,
    pub span: Option<Span>,
}

/// One reported problem.
///
/// Core phases work on hash-consed terms that carry no source location, so
/// `span` is only set by the notation front end. `context` holds a rendering
/// of the offending term instead.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Option<Span>,
    pub message: String,
    pub hint: Option<String>,
    pub context: Option<String>,
    pub cause_chain: Vec<CauseRecord>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, span, hint, context, or causes.
    pub fn new(level: DiagLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span: None,
            message: message.into(),
            hint: None,
            context: None,
            cause_chain: Vec::new(),
        }
    }

    /// Shorthand for an error-level diagnostic carrying `code`.
    pub fn error(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, message).with_code(code)
    }

    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Suggest a fix.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a rendering of the term the diagnostic is about.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Record an underlying failure this one was derived from.
    pub fn with_cause(mut self, message: impl Into<String>, span: Option<Span>) -> Self {
        self.cause_chain.push(CauseRecord {
            message: message.into(),
            span,
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_error() { "error" } else { "warning" })?;
        match self.code {
            Some(code) => write!(f, "[{code}]: {}", self.message)?,
            None => write!(f, ": {}", self.message)?,
        }
        if let Some(span) = &self.span {
            write!(f, " (at {}..{})", span.start, span.end)?;
        }
        if let Some(context) = &self.context {
            write!(f, "\n  in: {context}")?;
        }
        for cause in &self.cause_chain {
            write!(f, "\n  caused by: {}", cause.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {hint}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize) -> Span {
        use chumsky::span::Span as _;
        Span::new((), start..end)
    }

    #[test]
    fn plain_error_renders_level_and_message() {
        let d = Diagnostic::new(DiagLevel::Error, "no definition named process");
        assert_eq!(d.to_string(), "error: no definition named process");
    }

    #[test]
    fn code_is_bracketed_after_level() {
        let d = Diagnostic::new(DiagLevel::Warning, "unbound slot").with_code(DiagCode("W0001"));
        assert_eq!(d.to_string(), "warning[W0001]: unbound slot");
        assert!(!d.is_error());
    }

    #[test]
    fn display_with_context_and_hint() {
        let d = Diagnostic::error(codes::E0303, "can't compute the bounds of the delay")
            .with_context("x@y")
            .with_hint("bound the delay amount with min/max");
        assert_eq!(
            format!("{d}"),
            "error[E0303]: can't compute the bounds of the delay\n  in: x@y\n  hint: bound the delay amount with min/max"
        );
    }

    #[test]
    fn span_and_causes_are_rendered() {
        let d = Diagnostic::error(codes::E0100, "incompatible types")
            .with_span(span(4, 9))
            .with_cause("joined from a table type", None);
        assert_eq!(
            d.to_string(),
            "error[E0100]: incompatible types (at 4..9)\n  caused by: joined from a table type"
        );
        assert_eq!(d.cause_chain.len(), 1);
    }
}
