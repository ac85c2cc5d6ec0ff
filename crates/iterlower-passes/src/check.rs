//! Structural checks run before anything is synthesized.
//!
//! The binder guarantees these already, so every failure here is an
//! internal-consistency error rather than a user-facing one.

use iterlower_ir::{Block, Expr, SourceMethod, Stmt, Var};

use crate::error::{LowerError, LowerResult};

#[derive(Clone, Copy, Default)]
struct Context {
    /// Enclosing loops inside the innermost cleanup block (or the body).
    loops: u32,
    /// Enclosing loops and switches, likewise.
    breakable: u32,
    in_finally: bool,
}

pub fn check_structure(method: &SourceMethod) -> LowerResult<()> {
    let checker = Checker { method };
    checker.block(&method.body, Context::default())
}

struct Checker<'a> {
    method: &'a SourceMethod,
}

impl Checker<'_> {
    fn block(&self, block: &Block, cx: Context) -> LowerResult<()> {
        block.stmts.iter().try_for_each(|stmt| self.stmt(stmt, cx))
    }

    fn stmt(&self, stmt: &Stmt, cx: Context) -> LowerResult<()> {
        let in_loop = Context {
            loops: cx.loops + 1,
            breakable: cx.breakable + 1,
            ..cx
        };
        match stmt {
            Stmt::Block(block) => self.block(block, cx),
            Stmt::Local { local, init } => {
                self.var(Var::Local(*local))?;
                init.iter().try_for_each(|init| self.expr(init))
            }
            Stmt::Expr(expr) => self.expr(expr),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(cond)?;
                self.block(then_branch, cx)?;
                else_branch
                    .iter()
                    .try_for_each(|block| self.block(block, cx))
            }
            Stmt::While { cond, body } => {
                self.expr(cond)?;
                self.block(body, in_loop)
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                init.iter().try_for_each(|stmt| self.stmt(stmt, cx))?;
                cond.iter().try_for_each(|cond| self.expr(cond))?;
                step.iter().try_for_each(|step| self.expr(step))?;
                self.block(body, in_loop)
            }
            Stmt::ForEach {
                var,
                collection,
                body,
            } => {
                self.var(Var::Local(*var))?;
                self.expr(collection)?;
                self.block(body, in_loop)
            }
            Stmt::Switch {
                scrutinee,
                cases,
                default,
            } => {
                self.expr(scrutinee)?;
                let in_switch = Context {
                    breakable: cx.breakable + 1,
                    ..cx
                };
                for case in cases {
                    self.block(&case.body, in_switch)?;
                }
                default
                    .iter()
                    .try_for_each(|block| self.block(block, in_switch))
            }
            Stmt::Try { body, finally } => {
                self.block(body, cx)?;
                self.block(
                    finally,
                    Context {
                        in_finally: true,
                        ..Context::default()
                    },
                )
            }
            Stmt::Break if cx.breakable == 0 => Err(self.misplaced("break", cx)),
            Stmt::Continue if cx.loops == 0 => Err(self.misplaced("continue", cx)),
            Stmt::Break | Stmt::Continue => Ok(()),
            Stmt::Yield(_) if cx.in_finally => Err(LowerError::internal(format!(
                "suspension point inside a cleanup block of `{}`",
                self.method.name
            ))),
            Stmt::Yield(value) => self.expr(value),
            Stmt::YieldBreak if cx.in_finally => Err(LowerError::internal(format!(
                "`yield break` inside a cleanup block of `{}`",
                self.method.name
            ))),
            Stmt::YieldBreak => Ok(()),
        }
    }

    fn misplaced(&self, what: &str, cx: Context) -> LowerError {
        if cx.in_finally {
            LowerError::internal(format!(
                "`{what}` escapes a cleanup block of `{}`",
                self.method.name
            ))
        } else {
            LowerError::internal(format!(
                "`{what}` outside of any enclosing loop in `{}`",
                self.method.name
            ))
        }
    }

    fn expr(&self, expr: &Expr) -> LowerResult<()> {
        match expr {
            Expr::Int(_) | Expr::Bool(_) | Expr::Str(_) | Expr::Null => Ok(()),
            Expr::Var(var) => self.var(*var),
            Expr::Assign(var, value) => {
                self.var(*var)?;
                self.expr(value)
            }
            Expr::Unary(_, operand) | Expr::Len(operand) => self.expr(operand),
            Expr::Binary(_, lhs, rhs) | Expr::Index(lhs, rhs) => {
                self.expr(lhs)?;
                self.expr(rhs)
            }
            Expr::Array(items) | Expr::Call { args: items, .. } => {
                items.iter().try_for_each(|item| self.expr(item))
            }
        }
    }

    fn var(&self, var: Var) -> LowerResult<()> {
        if self.method.var_type(var).is_some() {
            Ok(())
        } else {
            Err(LowerError::internal(format!(
                "`{}` refers to an undeclared variable {var:?}",
                self.method.name
            )))
        }
    }
}
