use derive_more::Display;

pub type EvalResult<T> = Result<T, EvalError>;

/// Failure while running a method body.
#[derive(Display, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The program threw the platform's not-supported exception.
    #[display("operation not supported ({_0})")]
    NotSupported(String),

    #[display("exception thrown by {_0}")]
    Thrown(String),

    #[display("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },

    #[display("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[display("division by zero")]
    DivisionByZero,

    #[display("no method `{_0}` on the state machine")]
    UnknownMethod(String),

    #[display("malformed program: {_0}")]
    Malformed(String),

    #[display("ran out of fuel")]
    OutOfFuel,
}

impl std::error::Error for EvalError {}
