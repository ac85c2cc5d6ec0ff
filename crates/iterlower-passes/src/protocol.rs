//! Emit the iteration protocol methods of the state machine.

use iterlower_core::LowerOptions;
use iterlower_ir::{
    BinOp, InterfaceKind, LExpr, LStmt, LabelId, LocalId, MethodDef, MethodKind, MethodLocal,
    Place, StateInfo, Type, TypeParamOwner, Var, states,
};

use crate::error::{LowerError, LowerResult};
use crate::linearize::{LinearBody, Linearized};
use crate::type_builder::StateMachineShape;

pub const MOVE_NEXT: &str = "move_next";
pub const CURRENT: &str = "current";
pub const OBJECT_CURRENT: &str = "object_current";
pub const DISPOSE: &str = "dispose";
pub const RESET: &str = "reset";
pub const GET_ENUMERATOR: &str = "get_enumerator";
pub const OBJECT_GET_ENUMERATOR: &str = "object_get_enumerator";

/// All methods of the state machine apart from its constructor.
pub fn emit_protocol_methods(
    shape: &StateMachineShape,
    linearized: Linearized,
    options: &LowerOptions,
) -> LowerResult<Vec<MethodDef>> {
    let protocol = options.visibility.protocol_methods;
    let members = &shape.members;
    let mut methods = vec![
        MethodDef {
            name: MOVE_NEXT.to_owned(),
            kind: MethodKind::MoveNext,
            params: Vec::new(),
            return_type: Some(Type::Boolean),
            implements: Some(members.move_next.clone()),
            visibility: protocol,
            locals: linearized.move_next.locals,
            body: linearized.move_next.body,
        },
        MethodDef {
            name: CURRENT.to_owned(),
            kind: MethodKind::CurrentGeneric,
            params: Vec::new(),
            return_type: Some(shape.element_type.clone()),
            implements: Some(members.current_generic.clone()),
            visibility: protocol,
            locals: Vec::new(),
            body: vec![LStmt::Return(Some(LExpr::load_field(shape.current)))],
        },
        MethodDef {
            name: OBJECT_CURRENT.to_owned(),
            kind: MethodKind::CurrentObject,
            params: Vec::new(),
            return_type: Some(Type::Object),
            implements: Some(members.current_object.clone()),
            visibility: protocol,
            locals: Vec::new(),
            body: vec![LStmt::Return(Some(LExpr::load_field(shape.current)))],
        },
        MethodDef {
            name: DISPOSE.to_owned(),
            kind: MethodKind::Dispose,
            params: Vec::new(),
            return_type: None,
            implements: Some(members.dispose.clone()),
            visibility: protocol,
            locals: Vec::new(),
            body: dispose_body(shape, &linearized.states),
        },
        MethodDef {
            name: RESET.to_owned(),
            kind: MethodKind::Reset,
            params: Vec::new(),
            return_type: None,
            implements: Some(members.reset.clone()),
            visibility: protocol,
            locals: Vec::new(),
            body: vec![LStmt::Throw(members.not_supported_ctor.clone())],
        },
    ];

    if let (Some(generic), Some(object)) = (
        &members.get_enumerator_generic,
        &members.get_enumerator_object,
    ) {
        methods.push(MethodDef {
            name: GET_ENUMERATOR.to_owned(),
            kind: MethodKind::GetEnumeratorGeneric,
            params: Vec::new(),
            return_type: Some(Type::enumerator_of(shape.element_type.clone())),
            implements: Some(generic.clone()),
            visibility: protocol,
            locals: vec![MethodLocal {
                id: RESULT,
                name: "$result".to_owned(),
                ty: Type::generic_instance(
                    &shape.name,
                    TypeParamOwner::StateMachine,
                    &shape.type_params,
                ),
            }],
            body: get_enumerator_body(shape, options)?,
        });
        methods.push(MethodDef {
            name: OBJECT_GET_ENUMERATOR.to_owned(),
            kind: MethodKind::GetEnumeratorObject,
            params: Vec::new(),
            return_type: Some(Type::interface(InterfaceKind::Enumerator, vec![])),
            implements: Some(object.clone()),
            visibility: protocol,
            locals: Vec::new(),
            body: vec![LStmt::Return(Some(LExpr::CallSelf(GET_ENUMERATOR.to_owned())))],
        });
    }

    methods.extend(
        linearized
            .finally_methods
            .into_iter()
            .map(|(name, LinearBody { locals, body })| MethodDef {
                name,
                kind: MethodKind::Finally,
                params: Vec::new(),
                return_type: None,
                implements: None,
                visibility: options.visibility.helper_methods,
                locals,
                body,
            }),
    );

    Ok(methods)
}

/// Run the cleanup chain of the current suspension state, then finish.
fn dispose_body(shape: &StateMachineShape, infos: &[StateInfo]) -> Vec<LStmt> {
    let finish = LabelId(0);
    let done = LabelId(1);
    let mut next_label = 2;

    let mut cases = vec![(states::FRESH, finish)];
    let mut chains = Vec::new();
    for info in infos {
        if info.cleanup.is_empty() {
            cases.push((info.state, finish));
        } else {
            let label = LabelId(next_label);
            next_label += 1;
            cases.push((info.state, label));
            chains.push((label, &info.cleanup));
        }
    }

    let mut body = vec![LStmt::Switch {
        value: LExpr::load_field(shape.state),
        cases,
        default: done,
    }];
    for (label, chain) in chains {
        body.push(LStmt::Label(label));
        body.extend(
            chain
                .iter()
                .map(|name| LStmt::Eval(LExpr::CallSelf(name.clone()))),
        );
        body.push(LStmt::Goto(finish));
    }
    body.extend([
        LStmt::Label(finish),
        LStmt::Assign {
            place: Place::Field(shape.state),
            value: LExpr::Int(states::FINISHED),
        },
        LStmt::Label(done),
        LStmt::Return(None),
    ]);
    body
}

const RESULT: LocalId = LocalId(0);

/// Hand out `this` when it is an untouched template on its creating thread,
/// otherwise a fresh copy; then restore parameters from their proxies.
fn get_enumerator_body(
    shape: &StateMachineShape,
    options: &LowerOptions,
) -> LowerResult<Vec<LStmt>> {
    let clone = LabelId(0);
    let wire = LabelId(1);
    let mut body = Vec::new();

    if options.reuse_template_instance {
        let (Some(thread_field), Some(thread_id)) =
            (shape.initial_thread_id, shape.members.thread_id.clone())
        else {
            return Err(LowerError::internal(
                "enumerable state machine without a thread identity",
            ));
        };
        let untouched = LExpr::Binary(
            BinOp::Eq,
            Box::new(LExpr::load_field(shape.state)),
            Box::new(LExpr::Int(states::NOT_STARTED)),
        );
        let same_thread = LExpr::Binary(
            BinOp::Eq,
            Box::new(LExpr::load_field(thread_field)),
            Box::new(LExpr::ThreadId(thread_id)),
        );
        body.extend([
            LStmt::GotoUnless {
                cond: LExpr::Binary(BinOp::And, Box::new(untouched), Box::new(same_thread)),
                target: clone,
            },
            LStmt::Assign {
                place: Place::Field(shape.state),
                value: LExpr::Int(states::FRESH),
            },
            LStmt::Assign {
                place: Place::Local(RESULT),
                value: LExpr::This,
            },
            LStmt::Goto(wire),
        ]);
    }

    body.push(LStmt::Label(clone));
    body.push(LStmt::Assign {
        place: Place::Local(RESULT),
        value: LExpr::New {
            args: vec![LExpr::Int(states::FRESH)],
        },
    });
    body.extend(
        shape
            .fields
            .iter()
            .filter(|field| field.role.is_captured_slot())
            .map(|field| LStmt::Assign {
                place: Place::FieldOf(RESULT, field.id),
                value: LExpr::load_field(field.id),
            }),
    );

    body.push(LStmt::Label(wire));
    for &(index, proxy) in &shape.proxies {
        let slot = shape.slot(Var::Param(index)).ok_or_else(|| {
            LowerError::internal(format!("parameter {index} has a proxy but no slot"))
        })?;
        body.push(LStmt::Assign {
            place: Place::FieldOf(RESULT, slot),
            value: LExpr::load_field(proxy),
        });
    }
    body.push(LStmt::Return(Some(LExpr::Load(Place::Local(RESULT)))));
    Ok(body)
}
