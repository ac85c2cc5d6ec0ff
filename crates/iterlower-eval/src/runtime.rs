//! Interpreter for lowered state machines.
//!
//! A [`Runtime`] plays the part of the platform: it constructs instances,
//! dispatches protocol calls, answers thread-identity queries and records
//! every host call the generated code makes.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use iterlower_core::WellKnownMember;
use iterlower_ir::{
    BinOp, LExpr, LStmt, LabelId, LocalId, LoweredMethod, MethodDef, MethodKind, Place,
    ThreadIdSource, Type,
};

use crate::error::{EvalError, EvalResult};
use crate::value::{self, HostCall, Instance, Value};

const DEFAULT_FUEL: u64 = 100_000;

/// Which route generated code took to learn the current thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadRead {
    Accessor,
    ViaThread,
}

pub struct Runtime<'a> {
    lowered: &'a LoweredMethod,
    thread: i64,
    fuel: u64,
    calls: Vec<HostCall>,
    thread_reads: Vec<ThreadRead>,
}

struct Frame<'v> {
    this: Value,
    args: &'v [Value],
    locals: HashMap<LocalId, Value>,
}

impl<'a> Runtime<'a> {
    pub fn new(lowered: &'a LoweredMethod) -> Self {
        Self {
            lowered,
            thread: 1,
            fuel: DEFAULT_FUEL,
            calls: Vec::new(),
            thread_reads: Vec::new(),
        }
    }

    /// Limit the number of statements executed before giving up.
    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = fuel;
        self
    }

    /// Switch the managed thread id seen by subsequent calls.
    pub fn set_thread(&mut self, thread: i64) {
        self.thread = thread;
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<HostCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn thread_reads(&self) -> &[ThreadRead] {
        &self.thread_reads
    }

    /// Call the rewritten iterator method.
    pub fn invoke(&mut self, receiver: Option<Value>, args: Vec<Value>) -> EvalResult<Value> {
        let lowered = self.lowered;
        let this = receiver.unwrap_or(Value::Null);
        let result = self.run(&lowered.kickoff, this, &args)?;
        result.ok_or_else(|| EvalError::Malformed("kick-off returned nothing".to_owned()))
    }

    pub fn move_next(&mut self, sm: &Value) -> EvalResult<bool> {
        self.call_protocol(sm, MethodKind::MoveNext)?.as_bool()
    }

    pub fn current(&mut self, sm: &Value) -> EvalResult<Value> {
        self.call_protocol(sm, MethodKind::CurrentGeneric)
    }

    pub fn object_current(&mut self, sm: &Value) -> EvalResult<Value> {
        self.call_protocol(sm, MethodKind::CurrentObject)
    }

    pub fn dispose(&mut self, sm: &Value) -> EvalResult<()> {
        self.call_protocol(sm, MethodKind::Dispose).map(drop)
    }

    pub fn reset(&mut self, sm: &Value) -> EvalResult<()> {
        self.call_protocol(sm, MethodKind::Reset).map(drop)
    }

    pub fn get_enumerator(&mut self, sm: &Value) -> EvalResult<Value> {
        self.call_protocol(sm, MethodKind::GetEnumeratorGeneric)
    }

    pub fn object_get_enumerator(&mut self, sm: &Value) -> EvalResult<Value> {
        self.call_protocol(sm, MethodKind::GetEnumeratorObject)
    }

    /// Current value of the state field.
    pub fn state(&self, sm: &Value) -> EvalResult<i64> {
        let state = self
            .lowered
            .state_machine
            .field_by_role(iterlower_ir::FieldRole::State)
            .ok_or_else(|| EvalError::Malformed("no state field".to_owned()))?;
        let object = sm.as_object()?.borrow();
        object
            .fields
            .get(&state.id)
            .ok_or_else(|| EvalError::Malformed("state field missing".to_owned()))?
            .as_int()
    }

    /// Advance until exhausted, collecting every produced value.
    pub fn drain(&mut self, sm: &Value) -> EvalResult<Vec<Value>> {
        let mut values = Vec::new();
        while self.move_next(sm)? {
            values.push(self.current(sm)?);
        }
        Ok(values)
    }

    fn call_protocol(&mut self, sm: &Value, kind: MethodKind) -> EvalResult<Value> {
        let lowered = self.lowered;
        let method = lowered
            .state_machine
            .method(kind)
            .ok_or_else(|| EvalError::UnknownMethod(format!("{kind:?}")))?;
        sm.as_object()?;
        Ok(self.run(method, sm.clone(), &[])?.unwrap_or(Value::Null))
    }

    fn run(
        &mut self,
        method: &'a MethodDef,
        this: Value,
        args: &[Value],
    ) -> EvalResult<Option<Value>> {
        tracing::trace!(method = %method.name, "enter");
        let labels: HashMap<LabelId, usize> = method
            .body
            .iter()
            .enumerate()
            .filter_map(|(pc, stmt)| match stmt {
                LStmt::Label(label) => Some((*label, pc)),
                _ => None,
            })
            .collect();
        let jump = |label: &LabelId| {
            labels
                .get(label)
                .copied()
                .ok_or_else(|| EvalError::Malformed(format!("undefined label {label}")))
        };

        let mut frame = Frame {
            this,
            args,
            locals: HashMap::new(),
        };
        let mut pc = 0;
        while let Some(stmt) = method.body.get(pc) {
            self.burn()?;
            pc += 1;
            match stmt {
                LStmt::Label(_) => {}
                LStmt::Goto(label) => pc = jump(label)?,
                LStmt::GotoUnless { cond, target } => {
                    if !self.eval(&mut frame, cond)?.as_bool()? {
                        pc = jump(target)?;
                    }
                }
                LStmt::Switch {
                    value,
                    cases,
                    default,
                } => {
                    let value = self.eval(&mut frame, value)?.as_int()?;
                    let target = cases
                        .iter()
                        .find(|(case, _)| *case == value)
                        .map_or(default, |(_, label)| label);
                    pc = jump(target)?;
                }
                LStmt::Assign { place, value } => {
                    let value = self.eval(&mut frame, value)?;
                    self.store(&mut frame, place, value)?;
                }
                LStmt::Eval(expr) => {
                    self.eval(&mut frame, expr)?;
                }
                LStmt::Return(value) => {
                    return value
                        .as_ref()
                        .map(|value| self.eval(&mut frame, value))
                        .transpose();
                }
                LStmt::Throw(ctor) => {
                    return Err(if ctor.member == WellKnownMember::NotSupportedExceptionCtor {
                        EvalError::NotSupported(ctor.path.clone())
                    } else {
                        EvalError::Thrown(ctor.path.clone())
                    });
                }
            }
        }
        Ok(None)
    }

    fn burn(&mut self) -> EvalResult<()> {
        self.fuel = self.fuel.checked_sub(1).ok_or(EvalError::OutOfFuel)?;
        Ok(())
    }

    fn eval(&mut self, frame: &mut Frame<'_>, expr: &LExpr) -> EvalResult<Value> {
        Ok(match expr {
            LExpr::Int(value) => Value::Int(*value),
            LExpr::Bool(value) => Value::Bool(*value),
            LExpr::Str(value) => Value::str(value),
            LExpr::Null => Value::Null,
            LExpr::Load(place) => self.load(frame, place)?,
            LExpr::This => frame.this.clone(),
            LExpr::Param(index) => frame
                .args
                .get(*index)
                .cloned()
                .ok_or_else(|| EvalError::Malformed(format!("no argument {index}")))?,
            LExpr::Assign(place, value) => {
                let value = self.eval(frame, value)?;
                self.store(frame, place, value.clone())?;
                value
            }
            LExpr::Unary(op, operand) => {
                let operand = self.eval(frame, operand)?;
                value::unary(*op, operand)?
            }
            LExpr::Binary(BinOp::And, lhs, rhs) => {
                Value::Bool(self.eval(frame, lhs)?.as_bool()? && self.eval(frame, rhs)?.as_bool()?)
            }
            LExpr::Binary(BinOp::Or, lhs, rhs) => {
                Value::Bool(self.eval(frame, lhs)?.as_bool()? || self.eval(frame, rhs)?.as_bool()?)
            }
            LExpr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(frame, lhs)?;
                let rhs = self.eval(frame, rhs)?;
                value::binary(*op, lhs, rhs)?
            }
            LExpr::Array(items) => Value::array(
                items
                    .iter()
                    .map(|item| self.eval(frame, item))
                    .collect::<EvalResult<Vec<_>>>()?,
            ),
            LExpr::Index(array, index) => {
                let array = self.eval(frame, array)?;
                let index = self.eval(frame, index)?;
                value::index(&array, &index)?
            }
            LExpr::Len(array) => value::len(&self.eval(frame, array)?)?,
            LExpr::Call { callee, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(frame, arg))
                    .collect::<EvalResult<Vec<_>>>()?;
                self.calls.push(HostCall {
                    callee: callee.clone(),
                    args,
                });
                Value::Null
            }
            LExpr::CallSelf(name) => {
                let lowered = self.lowered;
                let method = lowered
                    .state_machine
                    .method_named(name)
                    .ok_or_else(|| EvalError::UnknownMethod(name.clone()))?;
                self.run(method, frame.this.clone(), &[])?
                    .unwrap_or(Value::Null)
            }
            LExpr::New { args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(frame, arg))
                    .collect::<EvalResult<Vec<_>>>()?;
                self.construct(&args)?
            }
            LExpr::ThreadId(source) => {
                self.thread_reads.push(match source {
                    ThreadIdSource::Accessor(_) => ThreadRead::Accessor,
                    ThreadIdSource::ViaThread { .. } => ThreadRead::ViaThread,
                });
                Value::Int(self.thread)
            }
        })
    }

    fn construct(&mut self, args: &[Value]) -> EvalResult<Value> {
        let lowered = self.lowered;
        let sm = &lowered.state_machine;
        let fields: BTreeMap<_, _> = sm
            .fields
            .iter()
            .map(|field| (field.id, default_of(&field.ty)))
            .collect();
        let object = Value::Object(Rc::new(RefCell::new(Instance { fields })));
        self.run(&sm.constructor, object.clone(), args)?;
        Ok(object)
    }

    fn load(&self, frame: &Frame<'_>, place: &Place) -> EvalResult<Value> {
        match place {
            Place::Field(field) => read_field(&frame.this, *field),
            Place::FieldOf(local, field) => read_field(local_of(frame, *local)?, *field),
            Place::Local(local) => local_of(frame, *local).cloned(),
        }
    }

    fn store(&self, frame: &mut Frame<'_>, place: &Place, value: Value) -> EvalResult<()> {
        match place {
            Place::Field(field) => write_field(&frame.this, *field, value),
            Place::FieldOf(local, field) => write_field(local_of(frame, *local)?, *field, value),
            Place::Local(local) => {
                frame.locals.insert(*local, value);
                Ok(())
            }
        }
    }
}

fn local_of<'f>(frame: &'f Frame<'_>, local: LocalId) -> EvalResult<&'f Value> {
    frame
        .locals
        .get(&local)
        .ok_or_else(|| EvalError::Malformed(format!("read of unassigned local {local}")))
}

fn read_field(object: &Value, field: iterlower_ir::FieldId) -> EvalResult<Value> {
    object
        .as_object()?
        .borrow()
        .fields
        .get(&field)
        .cloned()
        .ok_or_else(|| EvalError::Malformed(format!("no field {}", field.0)))
}

fn write_field(object: &Value, field: iterlower_ir::FieldId, value: Value) -> EvalResult<()> {
    let mut object = object.as_object()?.borrow_mut();
    let slot = object
        .fields
        .get_mut(&field)
        .ok_or_else(|| EvalError::Malformed(format!("no field {}", field.0)))?;
    *slot = value;
    Ok(())
}

fn default_of(ty: &Type) -> Value {
    match ty {
        Type::Int32 => Value::Int(0),
        Type::Boolean => Value::Bool(false),
        _ => Value::Null,
    }
}
