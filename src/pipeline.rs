//! Iterator lowering as a Salsa query.
//!
//! ```text
//! IteratorSource (method, platform, options)
//!     │
//!     ▼
//! lower_iterator ─► LoweringOutcome
//!                     ├─ Lowered    state machine + kick-off body
//!                     ├─ Unchanged  platform lacks a required member
//!                     └─ Failed     internal-consistency error, diagnostic accumulated
//! ```
//!
//! ## Diagnostics
//!
//! Structural failures are reported through the [`Diagnostic`] accumulator
//! and collected with [`lowering_diagnostics`]. A missing platform member is
//! not reported here: the binder has already complained about it, so the
//! method is returned unchanged and only a `debug` event is logged.

use iterlower_core::{Diagnostic, LowerOptions, NameGen, PlatformTable};
use iterlower_ir::printer::print_lowered;
use iterlower_ir::{LoweredMethod, SourceMethod};
use iterlower_passes::lower_iterator_method;
use salsa::Accumulator;

/// One iterator method together with everything lowering depends on.
#[salsa::input(debug)]
pub struct IteratorSource {
    #[returns(ref)]
    pub method: SourceMethod,
    #[returns(ref)]
    pub platform: PlatformTable,
    #[returns(ref)]
    pub options: LowerOptions,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LoweringOutcome {
    Lowered(LoweredMethod),
    /// A required platform member is missing; the method is left as written.
    Unchanged(SourceMethod),
    /// The input violated an invariant; see [`lowering_diagnostics`].
    Failed(SourceMethod),
}

impl LoweringOutcome {
    pub fn lowered(&self) -> Option<&LoweredMethod> {
        match self {
            LoweringOutcome::Lowered(lowered) => Some(lowered),
            _ => None,
        }
    }

    /// The method as it should be handed to code generation.
    pub fn original(&self) -> &SourceMethod {
        match self {
            LoweringOutcome::Lowered(lowered) => &lowered.original,
            LoweringOutcome::Unchanged(method) | LoweringOutcome::Failed(method) => method,
        }
    }

    /// Textual dump of the result, stable across runs.
    pub fn print(&self) -> String {
        match self {
            LoweringOutcome::Lowered(lowered) => print_lowered(lowered),
            LoweringOutcome::Unchanged(method) => format!("unchanged {}\n", method.name),
            LoweringOutcome::Failed(method) => format!("failed {}\n", method.name),
        }
    }
}

#[salsa::tracked(returns(ref))]
pub fn lower_iterator(db: &dyn salsa::Database, source: IteratorSource) -> LoweringOutcome {
    let method = source.method(db);
    let mut names = NameGen::new();
    match lower_iterator_method(method, source.platform(db), source.options(db), &mut names) {
        Ok(lowered) => LoweringOutcome::Lowered(lowered),
        Err(err) if err.is_precondition() => {
            tracing::debug!(method = %method.name, %err, "iterator left unlowered");
            LoweringOutcome::Unchanged(method.clone())
        }
        Err(err) => {
            Diagnostic::internal_error(err.to_string(), method.span).accumulate(db);
            LoweringOutcome::Failed(method.clone())
        }
    }
}

/// Diagnostics reported while lowering `source`.
pub fn lowering_diagnostics(db: &dyn salsa::Database, source: IteratorSource) -> Vec<Diagnostic> {
    lower_iterator::accumulated::<Diagnostic>(db, source)
        .into_iter()
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use iterlower_core::{DiagnosticSeverity, Span, WellKnownMember};
    use iterlower_ir::Type;
    use iterlower_ir::builder::*;
    use salsa::Setter as _;

    fn counter() -> SourceMethod {
        let mut b = MethodBuilder::new("count", Type::enumerable_of(Type::Int32));
        let n = b.param("n", Type::Int32);
        let i = b.local("i", Type::Int32);
        b.body(vec![for_(
            vec![let_(i, int(0))],
            Some(lt(local(i), var(n))),
            vec![assign(iterlower_ir::Var::Local(i), add(local(i), int(1)))],
            vec![yield_(local(i))],
        )])
    }

    #[test]
    fn test_lowering_succeeds_without_diagnostics() {
        let db = salsa::DatabaseImpl::default();
        let source = IteratorSource::new(
            &db,
            counter(),
            PlatformTable::standard(),
            LowerOptions::default(),
        );

        let outcome = lower_iterator(&db, source);
        assert!(outcome.lowered().is_some());
        assert!(lowering_diagnostics(&db, source).is_empty());
    }

    #[test]
    fn test_missing_member_leaves_method_unchanged() {
        let db = salsa::DatabaseImpl::default();
        let platform = PlatformTable::standard().without(WellKnownMember::EnumeratorReset);
        let source = IteratorSource::new(&db, counter(), platform, LowerOptions::default());

        let outcome = lower_iterator(&db, source);
        assert_eq!(outcome, &LoweringOutcome::Unchanged(counter()));
        assert!(lowering_diagnostics(&db, source).is_empty());
    }

    #[test]
    fn test_structural_failure_accumulates_internal_error() {
        let db = salsa::DatabaseImpl::default();
        let mut b = MethodBuilder::new("bad", Type::enumerator_of(Type::Int32));
        b.span(Span::new(10, 42));
        let method = b.body(vec![try_finally(vec![], vec![yield_(int(1))])]);
        let source = IteratorSource::new(
            &db,
            method.clone(),
            PlatformTable::standard(),
            LowerOptions::default(),
        );

        assert_eq!(lower_iterator(&db, source), &LoweringOutcome::Failed(method));
        let diagnostics = lowering_diagnostics(&db, source);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Error);
        assert_eq!(diagnostics[0].span, Span::new(10, 42));
        assert!(diagnostics[0].message.contains("cleanup block"));
    }

    #[test]
    fn test_restoring_platform_member_relowers() {
        let mut db = salsa::DatabaseImpl::default();
        let platform = PlatformTable::standard().without(WellKnownMember::DisposableDispose);
        let source = IteratorSource::new(&db, counter(), platform, LowerOptions::default());
        assert!(lower_iterator(&db, source).lowered().is_none());

        source.set_platform(&mut db).to(PlatformTable::standard());
        assert!(lower_iterator(&db, source).lowered().is_some());
    }
}
