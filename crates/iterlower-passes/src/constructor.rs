//! The state machine's constructor and the replacement body of the iterator method.

use iterlower_core::LowerOptions;
use iterlower_ir::{
    IteratorKind, LExpr, LStmt, LocalId, MethodDef, MethodKind, MethodLocal, Place, SourceMethod,
    Type, Var, states,
};

use crate::error::{LowerError, LowerResult};
use crate::type_builder::StateMachineShape;

pub const CONSTRUCTOR: &str = ".ctor";

/// `.ctor($initial_state: int)`; enumerables also remember the creating thread.
pub fn emit_constructor(
    shape: &StateMachineShape,
    options: &LowerOptions,
) -> LowerResult<MethodDef> {
    let mut body = vec![LStmt::Assign {
        place: Place::Field(shape.state),
        value: LExpr::Param(0),
    }];
    if let Some(field) = shape.initial_thread_id {
        let source = shape.members.thread_id.clone().ok_or_else(|| {
            LowerError::internal("thread identity field without a way to read it")
        })?;
        body.push(LStmt::Assign {
            place: Place::Field(field),
            value: LExpr::ThreadId(source),
        });
    }
    body.push(LStmt::Return(None));

    Ok(MethodDef {
        name: CONSTRUCTOR.to_owned(),
        kind: MethodKind::Constructor,
        params: vec![("$initial_state".to_owned(), Type::Int32)],
        return_type: None,
        implements: None,
        visibility: options.visibility.constructor,
        locals: Vec::new(),
        body,
    })
}

const STATE_MACHINE: LocalId = LocalId(0);

/// Body that replaces the iterator method: build the state machine, hand it
/// the arguments and return it without running any of the original body.
pub fn emit_kickoff(method: &SourceMethod, shape: &StateMachineShape) -> LowerResult<MethodDef> {
    let initial = match shape.kind {
        IteratorKind::Enumerable => states::NOT_STARTED,
        IteratorKind::Enumerator => states::FRESH,
    };
    let mut body = vec![LStmt::Assign {
        place: Place::Local(STATE_MACHINE),
        value: LExpr::New {
            args: vec![LExpr::Int(initial)],
        },
    }];

    if method.receiver.is_some() {
        let slot = shape
            .slot(Var::Receiver)
            .ok_or_else(|| LowerError::internal("receiver was not hoisted"))?;
        body.push(LStmt::Assign {
            place: Place::FieldOf(STATE_MACHINE, slot),
            value: LExpr::This,
        });
    }
    for index in 0..method.params.len() {
        let slot = shape
            .slot(Var::Param(index))
            .ok_or_else(|| LowerError::internal(format!("parameter {index} was not hoisted")))?;
        body.push(LStmt::Assign {
            place: Place::FieldOf(STATE_MACHINE, slot),
            value: LExpr::Param(index),
        });
        if let Some(&(_, proxy)) = shape.proxies.iter().find(|(param, _)| *param == index) {
            body.push(LStmt::Assign {
                place: Place::FieldOf(STATE_MACHINE, proxy),
                value: LExpr::Param(index),
            });
        }
    }
    body.push(LStmt::Return(Some(LExpr::Load(Place::Local(STATE_MACHINE)))));

    Ok(MethodDef {
        name: method.name.clone(),
        kind: MethodKind::Kickoff,
        params: method
            .params
            .iter()
            .map(|param| (param.name.clone(), param.ty.clone()))
            .collect(),
        return_type: Some(method.return_type.clone()),
        implements: None,
        visibility: method.visibility,
        locals: vec![MethodLocal {
            id: STATE_MACHINE,
            name: "$sm".to_owned(),
            ty: shape.type_in_method(),
        }],
        body,
    })
}
