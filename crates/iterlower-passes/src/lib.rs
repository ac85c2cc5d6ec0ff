//! Lowering of iterator methods into state-machine types.
//!
//! The stages run in order:
//!
//! 1. [`desugar`] rewrites `foreach` into an indexed `for`.
//! 2. [`capture`] decides which variables become fields.
//! 3. [`type_builder`] declares the state-machine type and checks that the
//!    platform provides everything the generated code refers to.
//! 4. [`linearize`] flattens the body into a resumable dispatch.
//! 5. [`protocol`] and [`constructor`] emit the remaining members and the
//!    replacement body of the original method.
//!
//! All validation happens before anything is synthesized, so a failed
//! lowering never leaves partial output behind.

pub mod capture;
pub mod check;
pub mod constructor;
pub mod desugar;
pub mod error;
pub mod linearize;
pub mod protocol;
pub mod type_builder;

pub use capture::{CaptureAnalysis, analyze_captures};
pub use check::check_structure;
pub use constructor::{emit_constructor, emit_kickoff};
pub use desugar::desugar_foreach;
pub use error::{LowerError, LowerErrorKind, LowerResult};
pub use linearize::{LinearBody, Linearized, linearize};
pub use protocol::emit_protocol_methods;
pub use type_builder::{
    PlatformMembers, StateMachineShape, build_shape, element_type, validate_platform,
};

use iterlower_core::{LowerOptions, NameGen, WellKnownMembers};
use iterlower_ir::{LoweredMethod, SourceMethod, StmtWalk, SynthesizedType};

/// Lower one iterator method.
///
/// Returns [`LowerErrorKind::MissingMember`] when the platform lacks a member
/// the generated code needs, and [`LowerErrorKind::Internal`] when the bound
/// tree violates an invariant the binder is expected to uphold.
pub fn lower_iterator_method(
    method: &SourceMethod,
    platform: &dyn WellKnownMembers,
    options: &LowerOptions,
    names: &mut NameGen,
) -> LowerResult<LoweredMethod> {
    let kind = match method.classification() {
        Some(kind) => kind,
        None if method.body.contains_suspension() => {
            return Err(LowerError::internal(format!(
                "`{}` suspends but does not return an enumerator or enumerable",
                method.name
            )));
        }
        None => {
            return Err(LowerError::internal(format!(
                "`{}` is not an iterator method",
                method.name
            )));
        }
    };

    let members = {
        let _span = tracing::info_span!("validate", method = %method.name).entered();
        let members = validate_platform(kind, platform)?;
        element_type(method)?;
        check_structure(method)?;
        members
    };

    let desugared = desugar_foreach(method)?;
    let capture = analyze_captures(&desugared, options.hoist_policy);

    let shape = {
        let _span = tracing::info_span!("build_shape").entered();
        build_shape(&desugared, kind, &capture, members, names, options)?
    };
    let linearized = {
        let _span = tracing::info_span!("linearize").entered();
        linearize(&desugared, &shape, names)?
    };
    let states = linearized.states.clone();

    let constructor = emit_constructor(&shape, options)?;
    let kickoff = emit_kickoff(&desugared, &shape)?;
    let methods = emit_protocol_methods(&shape, linearized, options)?;

    tracing::debug!(
        method = %method.name,
        state_machine = %shape.name,
        states = states.len(),
        "lowered iterator method"
    );

    Ok(LoweredMethod {
        original: method.clone(),
        kickoff,
        state_machine: SynthesizedType {
            name: shape.name,
            type_params: shape.type_params,
            kind,
            element_type: shape.element_type,
            interfaces: shape.interfaces,
            visibility: options.visibility.state_machine_type,
            fields: shape.fields,
            constructor,
            methods,
            states,
        },
    })
}
