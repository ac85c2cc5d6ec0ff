//! Flatten a structured iterator body into a resumable dispatch body.
//!
//! Every suspension point becomes
//!
//! ```text
//! this.$current = v
//! this.$state = k + 1
//! return true
//! Lk:
//! this.$state = RUNNING
//! ```
//!
//! and the body is prefixed with a jump table on the state field that
//! routes `FRESH` to the top of the body and `k + 1` to `Lk`. Structured
//! control flow is rewritten into labels and jumps. Cleanup blocks of try
//! regions that contain suspension points are moved into helper methods so
//! that dispose can run them; the others are expanded inline at each exit.

use std::collections::BTreeSet;

use iterlower_core::NameGen;
use iterlower_ir::{
    Block, Expr, LExpr, LStmt, LabelId, LocalId, MethodLocal, Place, SourceMethod, StateInfo,
    Stmt, StmtWalk, Type, Var, states,
};
use smallvec::SmallVec;

use crate::error::{LowerError, LowerResult};
use crate::type_builder::StateMachineShape;

/// A flat method body together with the method locals it uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearBody {
    pub locals: Vec<MethodLocal>,
    pub body: Vec<LStmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linearized {
    pub move_next: LinearBody,
    /// Extracted cleanup methods, in the order their try regions appear.
    pub finally_methods: Vec<(String, LinearBody)>,
    /// One entry per suspension point, in state order.
    pub states: Vec<StateInfo>,
}

pub fn linearize(
    method: &SourceMethod,
    shape: &StateMachineShape,
    names: &mut NameGen,
) -> LowerResult<Linearized> {
    let mut lin = Linearizer {
        method,
        shape,
        names,
        next_label: 0,
        states: Vec::new(),
        finally_methods: Vec::new(),
        frame: Frame::default(),
    };

    let start = lin.fresh_label();
    let fail = lin.fresh_label();
    lin.emit(LStmt::Label(start));
    lin.set_state(states::RUNNING);
    lin.block(&method.body)?;
    lin.finish_body();

    let mut cases = vec![(states::FRESH, start)];
    cases.extend(lin.states.iter().map(|info| (info.state, info.resume)));
    let mut body = vec![
        LStmt::Switch {
            value: LExpr::load_field(shape.state),
            cases,
            default: fail,
        },
        LStmt::Label(fail),
        LStmt::Return(Some(LExpr::Bool(false))),
    ];
    let frame = std::mem::take(&mut lin.frame);
    body.extend(frame.body);
    let move_next = LinearBody {
        locals: lin.method_locals(&frame.locals)?,
        body,
    };

    tracing::debug!(
        method = %method.name,
        states = lin.states.len(),
        finally_methods = lin.finally_methods.len(),
        "linearized iterator body"
    );

    Ok(Linearized {
        move_next,
        finally_methods: lin.finally_methods,
        states: lin.states,
    })
}

enum Cleanup {
    /// Call the named helper method.
    Extracted(String),
    /// Expand the block at every exit.
    Inline(Block),
}

enum Scope {
    Loop { break_to: LabelId, continue_to: LabelId },
    Switch { break_to: LabelId },
    Try(Cleanup),
    /// Jumps may not cross this.
    FinallyBoundary,
}

#[derive(Default)]
struct Frame {
    body: Vec<LStmt>,
    locals: BTreeSet<LocalId>,
    scopes: Vec<Scope>,
}

struct Linearizer<'a> {
    method: &'a SourceMethod,
    shape: &'a StateMachineShape,
    names: &'a mut NameGen,
    next_label: u32,
    states: Vec<StateInfo>,
    finally_methods: Vec<(String, LinearBody)>,
    frame: Frame,
}

/// Which scope a jump leaves to.
#[derive(Clone, Copy)]
enum JumpKind {
    Break,
    Continue,
    Exit,
}

impl Linearizer<'_> {
    fn fresh_label(&mut self) -> LabelId {
        let label = LabelId(self.next_label);
        self.next_label += 1;
        label
    }

    fn emit(&mut self, stmt: LStmt) {
        self.frame.body.push(stmt);
    }

    fn set_state(&mut self, state: i64) {
        self.emit(LStmt::Assign {
            place: Place::Field(self.shape.state),
            value: LExpr::Int(state),
        });
    }

    fn finish_body(&mut self) {
        self.set_state(states::FINISHED);
        self.emit(LStmt::Return(Some(LExpr::Bool(false))));
    }

    fn method_locals(&self, ids: &BTreeSet<LocalId>) -> LowerResult<Vec<MethodLocal>> {
        ids.iter()
            .map(|&id| {
                let symbol = self
                    .method
                    .local(id)
                    .ok_or_else(|| LowerError::internal(format!("undeclared local {id}")))?;
                Ok(MethodLocal {
                    id,
                    name: symbol.name.clone(),
                    ty: self.shape.rebind(&symbol.ty)?,
                })
            })
            .collect()
    }

    fn block(&mut self, block: &Block) -> LowerResult<()> {
        block.stmts.iter().try_for_each(|stmt| self.stmt(stmt))
    }

    fn stmt(&mut self, stmt: &Stmt) -> LowerResult<()> {
        match stmt {
            Stmt::Block(block) => self.block(block)?,
            Stmt::Local { local, init } => {
                let value = match init {
                    Some(init) => self.expr(init)?,
                    None => self.default_value(*local)?,
                };
                let place = self.place(Var::Local(*local))?;
                self.emit(LStmt::Assign { place, value });
            }
            Stmt::Expr(Expr::Assign(var, value)) => {
                let place = self.place(*var)?;
                let value = self.expr(value)?;
                self.emit(LStmt::Assign { place, value });
            }
            Stmt::Expr(expr) => {
                let expr = self.expr(expr)?;
                self.emit(LStmt::Eval(expr));
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.expr(cond)?;
                let else_label = self.fresh_label();
                let end = self.fresh_label();
                self.emit(LStmt::GotoUnless {
                    cond,
                    target: else_label,
                });
                self.block(then_branch)?;
                self.emit(LStmt::Goto(end));
                self.emit(LStmt::Label(else_label));
                if let Some(else_branch) = else_branch {
                    self.block(else_branch)?;
                }
                self.emit(LStmt::Label(end));
            }
            Stmt::While { cond, body } => {
                let continue_to = self.fresh_label();
                let break_to = self.fresh_label();
                self.emit(LStmt::Label(continue_to));
                let cond = self.expr(cond)?;
                self.emit(LStmt::GotoUnless {
                    cond,
                    target: break_to,
                });
                self.scoped(
                    Scope::Loop {
                        break_to,
                        continue_to,
                    },
                    |lin| lin.block(body),
                )?;
                self.emit(LStmt::Goto(continue_to));
                self.emit(LStmt::Label(break_to));
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                init.iter().try_for_each(|stmt| self.stmt(stmt))?;
                let top = self.fresh_label();
                let continue_to = self.fresh_label();
                let break_to = self.fresh_label();
                self.emit(LStmt::Label(top));
                if let Some(cond) = cond {
                    let cond = self.expr(cond)?;
                    self.emit(LStmt::GotoUnless {
                        cond,
                        target: break_to,
                    });
                }
                self.scoped(
                    Scope::Loop {
                        break_to,
                        continue_to,
                    },
                    |lin| lin.block(body),
                )?;
                self.emit(LStmt::Label(continue_to));
                for step in step {
                    self.stmt(&Stmt::Expr(step.clone()))?;
                }
                self.emit(LStmt::Goto(top));
                self.emit(LStmt::Label(break_to));
            }
            Stmt::ForEach { .. } => {
                return Err(LowerError::internal(
                    "`foreach` must be desugared before linearization",
                ));
            }
            Stmt::Switch {
                scrutinee,
                cases,
                default,
            } => {
                let value = self.expr(scrutinee)?;
                let break_to = self.fresh_label();
                let case_labels: Vec<LabelId> =
                    cases.iter().map(|_| self.fresh_label()).collect();
                let default_label = match default {
                    Some(_) => self.fresh_label(),
                    None => break_to,
                };
                let table = cases
                    .iter()
                    .zip(&case_labels)
                    .flat_map(|(case, &label)| case.values.iter().map(move |&v| (v, label)))
                    .collect();
                self.emit(LStmt::Switch {
                    value,
                    cases: table,
                    default: default_label,
                });
                self.scoped(Scope::Switch { break_to }, |lin| {
                    for (case, label) in cases.iter().zip(case_labels) {
                        lin.emit(LStmt::Label(label));
                        lin.block(&case.body)?;
                        lin.emit(LStmt::Goto(break_to));
                    }
                    if let Some(default) = default {
                        lin.emit(LStmt::Label(default_label));
                        lin.block(default)?;
                    }
                    Ok(())
                })?;
                self.emit(LStmt::Label(break_to));
            }
            Stmt::Try { body, finally } => self.try_finally(body, finally)?,
            Stmt::Break => self.jump(JumpKind::Break)?,
            Stmt::Continue => self.jump(JumpKind::Continue)?,
            Stmt::Yield(value) => self.suspend(value)?,
            Stmt::YieldBreak => {
                self.jump(JumpKind::Exit)?;
            }
        }
        Ok(())
    }

    fn scoped(
        &mut self,
        scope: Scope,
        f: impl FnOnce(&mut Self) -> LowerResult<()>,
    ) -> LowerResult<()> {
        self.frame.scopes.push(scope);
        let result = f(self);
        self.frame.scopes.pop();
        result
    }

    fn try_finally(&mut self, body: &Block, finally: &Block) -> LowerResult<()> {
        if body.contains_suspension() {
            let name = self.names.finally_method();
            let helper = self.extract(finally)?;
            self.finally_methods.push((name.clone(), helper));
            self.scoped(Scope::Try(Cleanup::Extracted(name.clone())), |lin| {
                lin.block(body)
            })?;
            self.emit(LStmt::Eval(LExpr::CallSelf(name)));
        } else {
            self.scoped(Scope::Try(Cleanup::Inline(finally.clone())), |lin| {
                lin.block(body)
            })?;
            self.scoped(Scope::FinallyBoundary, |lin| lin.block(finally))?;
        }
        Ok(())
    }

    /// Lower a cleanup block into the body of its own helper method.
    fn extract(&mut self, finally: &Block) -> LowerResult<LinearBody> {
        let saved = std::mem::replace(
            &mut self.frame,
            Frame {
                scopes: vec![Scope::FinallyBoundary],
                ..Frame::default()
            },
        );
        let result = self.block(finally);
        let frame = std::mem::replace(&mut self.frame, saved);
        result?;

        let mut body = frame.body;
        body.push(LStmt::Return(None));
        Ok(LinearBody {
            locals: self.method_locals(&frame.locals)?,
            body,
        })
    }

    /// Leave enclosing scopes, running every cleanup on the way out.
    fn jump(&mut self, kind: JumpKind) -> LowerResult<()> {
        let mut cleanups = Vec::new();
        let mut target = None;
        for (depth, scope) in self.frame.scopes.iter().enumerate().rev() {
            match (scope, kind) {
                (Scope::Loop { break_to, .. }, JumpKind::Break)
                | (Scope::Switch { break_to }, JumpKind::Break) => {
                    target = Some(*break_to);
                    break;
                }
                (Scope::Loop { continue_to, .. }, JumpKind::Continue) => {
                    target = Some(*continue_to);
                    break;
                }
                (Scope::Try(_), _) => cleanups.push(depth),
                (Scope::FinallyBoundary, _) => {
                    return Err(LowerError::internal(format!(
                        "jump escapes a cleanup block of `{}`",
                        self.method.name
                    )));
                }
                _ => {}
            }
        }
        if target.is_none() && !matches!(kind, JumpKind::Exit) {
            return Err(LowerError::internal(format!(
                "jump without an enclosing target in `{}`",
                self.method.name
            )));
        }

        for depth in cleanups {
            self.run_cleanup(depth)?;
        }
        match target {
            Some(label) => self.emit(LStmt::Goto(label)),
            None => self.finish_body(),
        }
        Ok(())
    }

    /// Expand the cleanup of the try scope at `depth`, as seen from outside it.
    fn run_cleanup(&mut self, depth: usize) -> LowerResult<()> {
        match &self.frame.scopes[depth] {
            Scope::Try(Cleanup::Extracted(name)) => {
                let call = LExpr::CallSelf(name.clone());
                self.emit(LStmt::Eval(call));
                Ok(())
            }
            Scope::Try(Cleanup::Inline(block)) => {
                let block = block.clone();
                let inner = self.frame.scopes.split_off(depth);
                self.frame.scopes.push(Scope::FinallyBoundary);
                let result = self.block(&block);
                self.frame.scopes.pop();
                self.frame.scopes.extend(inner);
                result
            }
            _ => Err(LowerError::internal("cleanup requested for a non-try scope")),
        }
    }

    fn suspend(&mut self, value: &Expr) -> LowerResult<()> {
        let value = self.expr(value)?;
        let state = states::suspended_at(self.states.len());
        let resume = self.fresh_label();
        let cleanup: SmallVec<[String; 2]> = self
            .frame
            .scopes
            .iter()
            .rev()
            .filter_map(|scope| match scope {
                Scope::Try(Cleanup::Extracted(name)) => Some(name.clone()),
                _ => None,
            })
            .collect();
        tracing::trace!(state, %resume, cleanup = cleanup.len(), "suspension point");

        self.emit(LStmt::Assign {
            place: Place::Field(self.shape.current),
            value,
        });
        self.set_state(state);
        self.emit(LStmt::Return(Some(LExpr::Bool(true))));
        self.emit(LStmt::Label(resume));
        self.set_state(states::RUNNING);

        self.states.push(StateInfo {
            state,
            resume,
            cleanup,
        });
        Ok(())
    }

    fn place(&mut self, var: Var) -> LowerResult<Place> {
        if let Some(field) = self.shape.slot(var) {
            return Ok(Place::Field(field));
        }
        match var {
            Var::Local(id) => {
                self.frame.locals.insert(id);
                Ok(Place::Local(id))
            }
            other => Err(LowerError::internal(format!(
                "{other:?} must live in a field of the state machine"
            ))),
        }
    }

    fn default_value(&self, local: LocalId) -> LowerResult<LExpr> {
        let symbol = self
            .method
            .local(local)
            .ok_or_else(|| LowerError::internal(format!("undeclared local {local}")))?;
        Ok(match symbol.ty {
            Type::Int32 => LExpr::Int(0),
            Type::Boolean => LExpr::Bool(false),
            _ => LExpr::Null,
        })
    }

    fn expr(&mut self, expr: &Expr) -> LowerResult<LExpr> {
        Ok(match expr {
            Expr::Int(value) => LExpr::Int(*value),
            Expr::Bool(value) => LExpr::Bool(*value),
            Expr::Str(value) => LExpr::Str(value.clone()),
            Expr::Null => LExpr::Null,
            Expr::Var(var) => LExpr::Load(self.place(*var)?),
            Expr::Assign(var, value) => {
                LExpr::Assign(self.place(*var)?, Box::new(self.expr(value)?))
            }
            Expr::Unary(op, operand) => LExpr::Unary(*op, Box::new(self.expr(operand)?)),
            Expr::Binary(op, lhs, rhs) => {
                LExpr::Binary(*op, Box::new(self.expr(lhs)?), Box::new(self.expr(rhs)?))
            }
            Expr::Array(items) => LExpr::Array(
                items
                    .iter()
                    .map(|item| self.expr(item))
                    .collect::<LowerResult<_>>()?,
            ),
            Expr::Index(array, index) => {
                LExpr::Index(Box::new(self.expr(array)?), Box::new(self.expr(index)?))
            }
            Expr::Len(array) => LExpr::Len(Box::new(self.expr(array)?)),
            Expr::Call { callee, args } => LExpr::Call {
                callee: callee.clone(),
                args: args
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<LowerResult<_>>()?,
            },
        })
    }
}
