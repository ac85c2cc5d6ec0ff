//! Test tooling for iterator lowering.
//!
//! [`Runtime`] drives a lowered state machine through its protocol methods
//! the way a consumer would, with a controllable thread identity and a log
//! of host calls. [`run_reference`] runs the original structured body
//! directly so the two can be compared.

mod error;
mod reference;
mod runtime;
mod value;

pub use error::{EvalError, EvalResult};
pub use reference::{ReferenceRun, run_reference, run_reference_prefix};
pub use runtime::{Runtime, ThreadRead};
pub use value::{HostCall, Instance, Value};
