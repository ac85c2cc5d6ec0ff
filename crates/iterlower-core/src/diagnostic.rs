//! Diagnostic messages emitted during lowering.

use crate::Span;

/// A diagnostic message with source location.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[salsa::accumulator]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
    pub severity: DiagnosticSeverity,
    pub phase: CompilationPhase,
}

impl Diagnostic {
    /// An internal-consistency failure: the input should never have reached this pass.
    pub fn internal_error(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            severity: DiagnosticSeverity::Error,
            phase: CompilationPhase::Lowering,
        }
    }
}

/// Severity level of a diagnostic.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    Error,
}

/// Compilation phase where a diagnostic was emitted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompilationPhase {
    /// Rewriting an iterator body into a state machine.
    Lowering,
}

impl std::fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "ERROR"),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{:?}] {}: {}",
            self.severity, self.phase, self.span, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_is_lowering_error() {
        let diag = Diagnostic::internal_error("bad", Span::new(3, 7));
        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.phase, CompilationPhase::Lowering);
        assert_eq!(diag.to_string(), "ERROR [Lowering] 3..7: bad");
    }
}
