//! Error types for iterator lowering

use derive_more::Display;
use iterlower_core::WellKnownMember;

pub type LowerResult<T> = Result<T, LowerError>;

#[derive(Display, Debug, Clone, PartialEq, Eq)]
#[display("{kind}")]
pub struct LowerError {
    kind: Box<LowerErrorKind>,
}

impl From<LowerErrorKind> for LowerError {
    fn from(kind: LowerErrorKind) -> Self {
        LowerError {
            kind: Box::new(kind),
        }
    }
}

impl std::error::Error for LowerError {}

impl LowerError {
    pub(crate) fn missing_member(member: WellKnownMember) -> Self {
        LowerErrorKind::MissingMember(member).into()
    }

    pub(crate) fn internal(msg: impl std::fmt::Display) -> Self {
        LowerErrorKind::Internal(msg.to_string()).into()
    }

    pub fn kind(&self) -> &LowerErrorKind {
        &self.kind
    }

    /// A missing platform member: the binder has already reported it, so the
    /// method is left untouched without a diagnostic of our own.
    pub fn is_precondition(&self) -> bool {
        matches!(*self.kind, LowerErrorKind::MissingMember(_))
    }
}

#[derive(Display, Debug, Clone, PartialEq, Eq)]
pub enum LowerErrorKind {
    #[display("Missing required platform member: {_0}")]
    MissingMember(WellKnownMember),

    #[display("Internal error in iterator lowering: {_0}")]
    Internal(String),
}
