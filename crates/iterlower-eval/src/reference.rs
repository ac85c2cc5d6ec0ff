//! Direct interpreter for bound iterator bodies.
//!
//! Runs the structured body eagerly and records what a consumer would see.
//! Lowered output is checked against this.

use std::collections::HashMap;

use iterlower_ir::{BinOp, Block, Expr, SourceMethod, Stmt, Type, Var};

use crate::error::{EvalError, EvalResult};
use crate::value::{self, HostCall, Value};

const DEFAULT_FUEL: u64 = 100_000;

/// Everything observable from one run of a body.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceRun {
    pub values: Vec<Value>,
    pub calls: Vec<HostCall>,
    /// False when the run was cut short after a requested number of values.
    pub completed: bool,
}

/// Run the whole body.
pub fn run_reference(
    method: &SourceMethod,
    receiver: Option<Value>,
    args: Vec<Value>,
) -> EvalResult<ReferenceRun> {
    Reference::new(method, receiver, args, None).run()
}

/// Run until `take` values have been produced, then leave the body the way
/// disposing an enumerator does: every enclosing cleanup block runs.
pub fn run_reference_prefix(
    method: &SourceMethod,
    receiver: Option<Value>,
    args: Vec<Value>,
    take: usize,
) -> EvalResult<ReferenceRun> {
    Reference::new(method, receiver, args, Some(take)).run()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
    /// Leave the whole body, running cleanups on the way out.
    Stop,
}

struct Reference<'m> {
    method: &'m SourceMethod,
    vars: HashMap<Var, Value>,
    values: Vec<Value>,
    calls: Vec<HostCall>,
    limit: Option<usize>,
    fuel: u64,
}

impl<'m> Reference<'m> {
    fn new(
        method: &'m SourceMethod,
        receiver: Option<Value>,
        args: Vec<Value>,
        limit: Option<usize>,
    ) -> Self {
        let mut vars: HashMap<Var, Value> = args
            .into_iter()
            .enumerate()
            .map(|(index, arg)| (Var::Param(index), arg))
            .collect();
        if let Some(receiver) = receiver {
            vars.insert(Var::Receiver, receiver);
        }
        Self {
            method,
            vars,
            values: Vec::new(),
            calls: Vec::new(),
            limit,
            fuel: DEFAULT_FUEL,
        }
    }

    fn run(mut self) -> EvalResult<ReferenceRun> {
        let method = self.method;
        if self.limit == Some(0) {
            return Ok(ReferenceRun {
                values: Vec::new(),
                calls: Vec::new(),
                completed: false,
            });
        }
        let flow = self.block(&method.body)?;
        if matches!(flow, Flow::Break | Flow::Continue) {
            return Err(EvalError::Malformed(format!(
                "{flow:?} escaped the body of `{}`",
                method.name
            )));
        }
        let completed = match self.limit {
            Some(limit) => self.values.len() < limit,
            None => true,
        };
        Ok(ReferenceRun {
            values: self.values,
            calls: self.calls,
            completed,
        })
    }

    fn burn(&mut self) -> EvalResult<()> {
        self.fuel = self.fuel.checked_sub(1).ok_or(EvalError::OutOfFuel)?;
        Ok(())
    }

    fn block(&mut self, block: &Block) -> EvalResult<Flow> {
        for stmt in &block.stmts {
            let flow = self.stmt(stmt)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    /// Run a loop body; `None` means leave the loop with `Normal`.
    fn loop_body(&mut self, body: &Block) -> EvalResult<Option<Flow>> {
        match self.block(body)? {
            Flow::Normal | Flow::Continue => Ok(Some(Flow::Normal)),
            Flow::Break => Ok(None),
            Flow::Stop => Ok(Some(Flow::Stop)),
        }
    }

    fn stmt(&mut self, stmt: &Stmt) -> EvalResult<Flow> {
        self.burn()?;
        match stmt {
            Stmt::Block(block) => return self.block(block),
            Stmt::Local { local, init } => {
                let value = match init {
                    Some(init) => self.expr(init)?,
                    None => {
                        let ty = self
                            .method
                            .var_type(Var::Local(*local))
                            .ok_or_else(|| EvalError::Malformed(format!("undeclared {local}")))?;
                        default_of(ty)
                    }
                };
                self.vars.insert(Var::Local(*local), value);
            }
            Stmt::Expr(expr) => {
                self.expr(expr)?;
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.expr(cond)?.as_bool()? {
                    return self.block(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.block(else_branch);
                }
            }
            Stmt::While { cond, body } => {
                while self.expr(cond)?.as_bool()? {
                    self.burn()?;
                    match self.loop_body(body)? {
                        Some(Flow::Stop) => return Ok(Flow::Stop),
                        Some(_) => {}
                        None => break,
                    }
                }
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                for stmt in init {
                    self.stmt(stmt)?;
                }
                loop {
                    self.burn()?;
                    if let Some(cond) = cond
                        && !self.expr(cond)?.as_bool()?
                    {
                        break;
                    }
                    match self.loop_body(body)? {
                        Some(Flow::Stop) => return Ok(Flow::Stop),
                        Some(_) => {}
                        None => break,
                    }
                    for step in step {
                        self.expr(step)?;
                    }
                }
            }
            Stmt::ForEach {
                var,
                collection,
                body,
            } => {
                let array = self.expr(collection)?;
                let mut index = 0;
                while index < value::len(&array)?.as_int()? {
                    self.burn()?;
                    let item = value::index(&array, &Value::Int(index))?;
                    self.vars.insert(Var::Local(*var), item);
                    match self.loop_body(body)? {
                        Some(Flow::Stop) => return Ok(Flow::Stop),
                        Some(_) => {}
                        None => break,
                    }
                    index += 1;
                }
            }
            Stmt::Switch {
                scrutinee,
                cases,
                default,
            } => {
                let value = self.expr(scrutinee)?.as_int()?;
                let arm = cases
                    .iter()
                    .find(|case| case.values.contains(&value))
                    .map(|case| &case.body)
                    .or(default.as_ref());
                if let Some(arm) = arm {
                    return Ok(match self.block(arm)? {
                        Flow::Break => Flow::Normal,
                        flow => flow,
                    });
                }
            }
            Stmt::Try { body, finally } => {
                let flow = self.block(body)?;
                if self.block(finally)? != Flow::Normal {
                    return Err(EvalError::Malformed(
                        "control left a cleanup block".to_owned(),
                    ));
                }
                return Ok(flow);
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Yield(value) => {
                let value = self.expr(value)?;
                self.values.push(value);
                if self.limit == Some(self.values.len()) {
                    return Ok(Flow::Stop);
                }
            }
            Stmt::YieldBreak => return Ok(Flow::Stop),
        }
        Ok(Flow::Normal)
    }

    fn expr(&mut self, expr: &Expr) -> EvalResult<Value> {
        Ok(match expr {
            Expr::Int(value) => Value::Int(*value),
            Expr::Bool(value) => Value::Bool(*value),
            Expr::Str(value) => Value::str(value),
            Expr::Null => Value::Null,
            Expr::Var(var) => self
                .vars
                .get(var)
                .cloned()
                .ok_or_else(|| EvalError::Malformed(format!("read of unassigned {var:?}")))?,
            Expr::Assign(var, value) => {
                let value = self.expr(value)?;
                self.vars.insert(*var, value.clone());
                value
            }
            Expr::Unary(op, operand) => {
                let operand = self.expr(operand)?;
                value::unary(*op, operand)?
            }
            Expr::Binary(BinOp::And, lhs, rhs) => {
                Value::Bool(self.expr(lhs)?.as_bool()? && self.expr(rhs)?.as_bool()?)
            }
            Expr::Binary(BinOp::Or, lhs, rhs) => {
                Value::Bool(self.expr(lhs)?.as_bool()? || self.expr(rhs)?.as_bool()?)
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                value::binary(*op, lhs, rhs)?
            }
            Expr::Array(items) => Value::array(
                items
                    .iter()
                    .map(|item| self.expr(item))
                    .collect::<EvalResult<Vec<_>>>()?,
            ),
            Expr::Index(array, index) => {
                let array = self.expr(array)?;
                let index = self.expr(index)?;
                value::index(&array, &index)?
            }
            Expr::Len(array) => value::len(&self.expr(array)?)?,
            Expr::Call { callee, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<EvalResult<Vec<_>>>()?;
                self.calls.push(HostCall {
                    callee: callee.clone(),
                    args,
                });
                Value::Null
            }
        })
    }
}

fn default_of(ty: &Type) -> Value {
    match ty {
        Type::Int32 => Value::Int(0),
        Type::Boolean => Value::Bool(false),
        _ => Value::Null,
    }
}
