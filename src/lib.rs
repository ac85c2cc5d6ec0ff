//! Rewrite iterator methods into enumerator state machines.
//!
//! The entry point is the [`lower_iterator`] query over an [`IteratorSource`]
//! input. The stages themselves live in `iterlower-passes` and can be used
//! without a database through [`lower_iterator_method`].

pub mod pipeline;

pub use iterlower_core::{
    CompilationPhase, Diagnostic, DiagnosticSeverity, HoistPolicy, LowerOptions, MemberRef,
    NameGen, PlatformTable, Span, Visibility, VisibilityPolicy, WellKnownMember,
    WellKnownMembers,
};
pub use iterlower_ir::printer::{print_lowered, print_state_machine};
pub use iterlower_ir::{IteratorKind, LoweredMethod, SourceMethod, SynthesizedType, Type};
pub use iterlower_passes::{LowerError, LowerErrorKind, LowerResult, lower_iterator_method};
pub use pipeline::{IteratorSource, LoweringOutcome, lower_iterator, lowering_diagnostics};
