//! Shared infrastructure for the iterator lowering passes.
pub mod diagnostic;
pub mod names;
pub mod options;
pub mod span;
pub mod well_known;

pub use diagnostic::{CompilationPhase, Diagnostic, DiagnosticSeverity};
pub use names::{NameGen, Visibility, VisibilityPolicy};
pub use options::{HoistPolicy, LowerOptions};
pub use span::Span;
pub use well_known::{MemberRef, PlatformTable, WellKnownMember, WellKnownMembers};
