//! Rewrite `foreach` over arrays into an indexed `for`.
//!
//! ```text
//! foreach x in xs { body }
//! ```
//! becomes
//! ```text
//! {
//!     let $array = xs;
//!     for (let $index = 0; $index < len($array); $index = $index + 1) {
//!         let x = $array[$index];
//!         { body }
//!     }
//! }
//! ```
//!
//! The array and index become ordinary locals, so capture analysis hoists
//! them like any other local when the loop body suspends.

use iterlower_ir::{BinOp, Block, Expr, LocalId, SourceMethod, Stmt, SwitchCase, Type, Var};

use crate::error::{LowerError, LowerResult};

/// Return a copy of `method` without `foreach` statements.
pub fn desugar_foreach(method: &SourceMethod) -> LowerResult<SourceMethod> {
    let mut method = method.clone();
    let body = std::mem::take(&mut method.body);
    let body = Desugarer {
        method: &mut method,
    }
    .block(body)?;
    method.body = body;
    Ok(method)
}

struct Desugarer<'a> {
    method: &'a mut SourceMethod,
}

impl Desugarer<'_> {
    fn block(&mut self, block: Block) -> LowerResult<Block> {
        let stmts = block
            .stmts
            .into_iter()
            .map(|s| self.stmt(s))
            .collect::<LowerResult<_>>()?;
        Ok(Block::new(stmts))
    }

    fn stmt(&mut self, stmt: Stmt) -> LowerResult<Stmt> {
        Ok(match stmt {
            Stmt::ForEach {
                var,
                collection,
                body,
            } => self.foreach(var, collection, body)?,
            Stmt::Block(block) => Stmt::Block(self.block(block)?),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => Stmt::If {
                cond,
                then_branch: self.block(then_branch)?,
                else_branch: else_branch.map(|b| self.block(b)).transpose()?,
            },
            Stmt::While { cond, body } => Stmt::While {
                cond,
                body: self.block(body)?,
            },
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => Stmt::For {
                init: init
                    .into_iter()
                    .map(|s| self.stmt(s))
                    .collect::<LowerResult<_>>()?,
                cond,
                step,
                body: self.block(body)?,
            },
            Stmt::Switch {
                scrutinee,
                cases,
                default,
            } => Stmt::Switch {
                scrutinee,
                cases: cases
                    .into_iter()
                    .map(|case| {
                        Ok(SwitchCase {
                            values: case.values,
                            body: self.block(case.body)?,
                        })
                    })
                    .collect::<LowerResult<_>>()?,
                default: default.map(|b| self.block(b)).transpose()?,
            },
            Stmt::Try { body, finally } => Stmt::Try {
                body: self.block(body)?,
                finally: self.block(finally)?,
            },
            other @ (Stmt::Local { .. }
            | Stmt::Expr(_)
            | Stmt::Break
            | Stmt::Continue
            | Stmt::Yield(_)
            | Stmt::YieldBreak) => other,
        })
    }

    /// Type of the temporary holding the collection: the collection's own
    /// array type when it is a variable, otherwise an array of the loop variable's type.
    fn array_type(&self, var: LocalId, collection: &Expr) -> LowerResult<Type> {
        if let Expr::Var(source) = collection {
            if let Some(ty @ Type::Array(_)) = self.method.var_type(*source) {
                return Ok(ty.clone());
            }
        }
        let symbol = self.method.local(var).ok_or_else(|| {
            LowerError::internal(format!(
                "`foreach` in `{}` iterates with an undeclared variable {var}",
                self.method.name
            ))
        })?;
        Ok(Type::array(symbol.ty.clone()))
    }

    fn foreach(&mut self, var: LocalId, collection: Expr, body: Block) -> LowerResult<Stmt> {
        let array_ty = self.array_type(var, &collection)?;
        let array = self.method.add_local("$array", array_ty, true);
        let index = self.method.add_local("$index", Type::Int32, true);
        let array_ref = || Expr::Var(Var::Local(array));
        let index_ref = || Expr::Var(Var::Local(index));

        let body = self.block(body)?;
        let loop_body = Block::new(vec![
            Stmt::Local {
                local: var,
                init: Some(Expr::Index(Box::new(array_ref()), Box::new(index_ref()))),
            },
            Stmt::Block(body),
        ]);

        Ok(Stmt::Block(Block::new(vec![
            Stmt::Local {
                local: array,
                init: Some(collection),
            },
            Stmt::For {
                init: vec![Stmt::Local {
                    local: index,
                    init: Some(Expr::Int(0)),
                }],
                cond: Some(Expr::Binary(
                    BinOp::Lt,
                    Box::new(index_ref()),
                    Box::new(Expr::Len(Box::new(array_ref()))),
                )),
                step: vec![Expr::Assign(
                    Var::Local(index),
                    Box::new(Expr::Binary(
                        BinOp::Add,
                        Box::new(index_ref()),
                        Box::new(Expr::Int(1)),
                    )),
                )],
                body: loop_body,
            },
        ])))
    }
}
