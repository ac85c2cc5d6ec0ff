//! Runtime values shared by both interpreters.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use iterlower_ir::{BinOp, FieldId, UnOp};

use crate::error::{EvalError, EvalResult};

/// A state-machine instance: one slot per field.
#[derive(Debug, Default)]
pub struct Instance {
    pub fields: BTreeMap<FieldId, Value>,
}

#[derive(Clone, Debug)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(Rc<str>),
    Null,
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Instance>>),
}

impl Value {
    pub fn str(value: &str) -> Self {
        Value::Str(value.into())
    }

    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    pub fn ints(items: impl IntoIterator<Item = i64>) -> Self {
        Value::array(items.into_iter().map(Value::Int))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Null => "null",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn as_int(&self) -> EvalResult<i64> {
        match self {
            Value::Int(value) => Ok(*value),
            other => Err(mismatch("int", other)),
        }
    }

    pub fn as_bool(&self) -> EvalResult<bool> {
        match self {
            Value::Bool(value) => Ok(*value),
            other => Err(mismatch("bool", other)),
        }
    }

    pub fn as_object(&self) -> EvalResult<&Rc<RefCell<Instance>>> {
        match self {
            Value::Object(object) => Ok(object),
            other => Err(mismatch("object", other)),
        }
    }

    /// Whether both values denote the same state-machine instance.
    pub fn same_instance(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Scalars compare by value, arrays and objects by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Str(value) => write!(f, "{value:?}"),
            Value::Null => write!(f, "null"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(_) => write!(f, "<object>"),
        }
    }
}

fn mismatch(expected: &'static str, found: &Value) -> EvalError {
    EvalError::TypeMismatch {
        expected,
        found: found.type_name().to_owned(),
    }
}

/// A call to a host function, as observed by the runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct HostCall {
    pub callee: String,
    pub args: Vec<Value>,
}

impl fmt::Display for HostCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.callee)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

pub(crate) fn unary(op: UnOp, operand: Value) -> EvalResult<Value> {
    match op {
        UnOp::Neg => Ok(Value::Int(operand.as_int()?.wrapping_neg())),
        UnOp::Not => Ok(Value::Bool(!operand.as_bool()?)),
    }
}

/// Strict binary operators; `&&` and `||` are short-circuited by the callers.
pub(crate) fn binary(op: BinOp, lhs: Value, rhs: Value) -> EvalResult<Value> {
    let value = match op {
        BinOp::Eq => Value::Bool(lhs == rhs),
        BinOp::Ne => Value::Bool(lhs != rhs),
        BinOp::And => Value::Bool(lhs.as_bool()? && rhs.as_bool()?),
        BinOp::Or => Value::Bool(lhs.as_bool()? || rhs.as_bool()?),
        BinOp::Add => match (&lhs, &rhs) {
            (Value::Str(a), Value::Str(b)) => Value::Str(format!("{a}{b}").into()),
            _ => Value::Int(lhs.as_int()?.wrapping_add(rhs.as_int()?)),
        },
        BinOp::Sub => Value::Int(lhs.as_int()?.wrapping_sub(rhs.as_int()?)),
        BinOp::Mul => Value::Int(lhs.as_int()?.wrapping_mul(rhs.as_int()?)),
        BinOp::Div | BinOp::Rem => {
            let (a, b) = (lhs.as_int()?, rhs.as_int()?);
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Value::Int(if op == BinOp::Div {
                a.wrapping_div(b)
            } else {
                a.wrapping_rem(b)
            })
        }
        BinOp::Lt => Value::Bool(lhs.as_int()? < rhs.as_int()?),
        BinOp::Le => Value::Bool(lhs.as_int()? <= rhs.as_int()?),
        BinOp::Gt => Value::Bool(lhs.as_int()? > rhs.as_int()?),
        BinOp::Ge => Value::Bool(lhs.as_int()? >= rhs.as_int()?),
    };
    Ok(value)
}

pub(crate) fn index(array: &Value, index: &Value) -> EvalResult<Value> {
    let Value::Array(items) = array else {
        return Err(mismatch("array", array));
    };
    let index = index.as_int()?;
    let items = items.borrow();
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i).cloned())
        .ok_or(EvalError::IndexOutOfBounds {
            index,
            len: items.len(),
        })
}

pub(crate) fn len(array: &Value) -> EvalResult<Value> {
    match array {
        Value::Array(items) => Ok(Value::Int(items.borrow().len() as i64)),
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(mismatch("array", other)),
    }
}
