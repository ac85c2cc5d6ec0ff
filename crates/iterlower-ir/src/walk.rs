//! Recursive traversal of bound statements and expressions.
//!
//! ```ignore
//! use std::ops::ControlFlow;
//! use iterlower_ir::walk::{StmtWalk, WalkAction};
//!
//! // Does the body suspend anywhere?
//! let suspends = body
//!     .walk_stmts(|stmt| match stmt {
//!         Stmt::Yield(_) => ControlFlow::Break(()),
//!         _ => ControlFlow::Continue(WalkAction::Advance),
//!     })
//!     .is_break();
//! ```

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use crate::bound::{Block, Expr, Stmt, Var};

/// Controls whether to descend into nested statements during a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    Advance,
    /// Skip the nested statements of the current one.
    Skip,
}

pub trait StmtWalk {
    /// Visit every statement in pre-order.
    fn walk_stmts<B>(
        &self,
        f: impl FnMut(&Stmt) -> ControlFlow<B, WalkAction>,
    ) -> ControlFlow<B, ()>;

    /// Visit every expression, including subexpressions, in pre-order.
    fn walk_exprs<B>(&self, f: impl FnMut(&Expr) -> ControlFlow<B, ()>) -> ControlFlow<B, ()>;

    /// Whether any suspension point occurs, at any depth.
    fn contains_suspension(&self) -> bool {
        self.walk_stmts(|stmt| match stmt {
            Stmt::Yield(_) => ControlFlow::Break(()),
            _ => ControlFlow::Continue(WalkAction::Advance),
        })
        .is_break()
    }

    /// Number of suspension points, at any depth.
    fn count_suspensions(&self) -> usize {
        let mut count = 0;
        let _ = self.walk_stmts::<()>(|stmt| {
            if matches!(stmt, Stmt::Yield(_)) {
                count += 1;
            }
            ControlFlow::Continue(WalkAction::Advance)
        });
        count
    }

    /// Every variable that is the target of an assignment.
    fn assigned_vars(&self) -> BTreeSet<Var> {
        let mut assigned = BTreeSet::new();
        let _ = self.walk_exprs::<()>(|expr| {
            if let Expr::Assign(var, _) = expr {
                assigned.insert(*var);
            }
            ControlFlow::Continue(())
        });
        assigned
    }
}

impl StmtWalk for [Stmt] {
    fn walk_stmts<B>(
        &self,
        mut f: impl FnMut(&Stmt) -> ControlFlow<B, WalkAction>,
    ) -> ControlFlow<B, ()> {
        for stmt in self {
            walk_stmt_internal(stmt, &mut f)?;
        }
        ControlFlow::Continue(())
    }

    fn walk_exprs<B>(&self, mut f: impl FnMut(&Expr) -> ControlFlow<B, ()>) -> ControlFlow<B, ()> {
        self.walk_stmts(|stmt| {
            match stmt_exprs(stmt, &mut f) {
                ControlFlow::Break(b) => ControlFlow::Break(b),
                ControlFlow::Continue(()) => ControlFlow::Continue(WalkAction::Advance),
            }
        })
    }
}

impl StmtWalk for Block {
    fn walk_stmts<B>(
        &self,
        f: impl FnMut(&Stmt) -> ControlFlow<B, WalkAction>,
    ) -> ControlFlow<B, ()> {
        self.stmts.walk_stmts(f)
    }

    fn walk_exprs<B>(&self, f: impl FnMut(&Expr) -> ControlFlow<B, ()>) -> ControlFlow<B, ()> {
        self.stmts.walk_exprs(f)
    }
}

impl StmtWalk for Stmt {
    fn walk_stmts<B>(
        &self,
        f: impl FnMut(&Stmt) -> ControlFlow<B, WalkAction>,
    ) -> ControlFlow<B, ()> {
        std::slice::from_ref(self).walk_stmts(f)
    }

    fn walk_exprs<B>(&self, f: impl FnMut(&Expr) -> ControlFlow<B, ()>) -> ControlFlow<B, ()> {
        std::slice::from_ref(self).walk_exprs(f)
    }
}

// Internal helper to avoid recursion limit issues with impl FnMut
fn walk_stmt_internal<B>(
    stmt: &Stmt,
    f: &mut dyn FnMut(&Stmt) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    match f(stmt) {
        ControlFlow::Break(b) => return ControlFlow::Break(b),
        ControlFlow::Continue(WalkAction::Skip) => return ControlFlow::Continue(()),
        ControlFlow::Continue(WalkAction::Advance) => {}
    }
    for child in child_stmts(stmt) {
        walk_stmt_internal(child, f)?;
    }
    ControlFlow::Continue(())
}

/// Statements nested directly inside `stmt`, in program order.
pub fn child_stmts(stmt: &Stmt) -> Vec<&Stmt> {
    match stmt {
        Stmt::Block(block) => block.stmts.iter().collect(),
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => then_branch
            .stmts
            .iter()
            .chain(else_branch.iter().flat_map(|b| b.stmts.iter()))
            .collect(),
        Stmt::While { body, .. } | Stmt::ForEach { body, .. } => body.stmts.iter().collect(),
        Stmt::For { init, body, .. } => init.iter().chain(body.stmts.iter()).collect(),
        Stmt::Switch { cases, default, .. } => cases
            .iter()
            .flat_map(|case| case.body.stmts.iter())
            .chain(default.iter().flat_map(|b| b.stmts.iter()))
            .collect(),
        Stmt::Try { body, finally } => body.stmts.iter().chain(finally.stmts.iter()).collect(),
        Stmt::Local { .. }
        | Stmt::Expr(_)
        | Stmt::Break
        | Stmt::Continue
        | Stmt::Yield(_)
        | Stmt::YieldBreak => Vec::new(),
    }
}

/// Visit the expressions owned directly by `stmt` (not by nested statements).
fn stmt_exprs<B>(
    stmt: &Stmt,
    f: &mut dyn FnMut(&Expr) -> ControlFlow<B, ()>,
) -> ControlFlow<B, ()> {
    match stmt {
        Stmt::Local { init, .. } => {
            if let Some(init) = init {
                walk_expr_internal(init, f)?;
            }
        }
        Stmt::Expr(expr) | Stmt::Yield(expr) => walk_expr_internal(expr, f)?,
        Stmt::If { cond, .. } | Stmt::While { cond, .. } => walk_expr_internal(cond, f)?,
        Stmt::For { cond, step, .. } => {
            if let Some(cond) = cond {
                walk_expr_internal(cond, f)?;
            }
            for expr in step {
                walk_expr_internal(expr, f)?;
            }
        }
        Stmt::ForEach { collection, .. } => walk_expr_internal(collection, f)?,
        Stmt::Switch { scrutinee, .. } => walk_expr_internal(scrutinee, f)?,
        Stmt::Block(_) | Stmt::Try { .. } | Stmt::Break | Stmt::Continue | Stmt::YieldBreak => {}
    }
    ControlFlow::Continue(())
}

fn walk_expr_internal<B>(
    expr: &Expr,
    f: &mut dyn FnMut(&Expr) -> ControlFlow<B, ()>,
) -> ControlFlow<B, ()> {
    f(expr)?;
    match expr {
        Expr::Int(_) | Expr::Bool(_) | Expr::Str(_) | Expr::Null | Expr::Var(_) => {}
        Expr::Assign(_, value) | Expr::Unary(_, value) | Expr::Len(value) => {
            walk_expr_internal(value, f)?;
        }
        Expr::Binary(_, lhs, rhs) | Expr::Index(lhs, rhs) => {
            walk_expr_internal(lhs, f)?;
            walk_expr_internal(rhs, f)?;
        }
        Expr::Array(items) | Expr::Call { args: items, .. } => {
            for item in items {
                walk_expr_internal(item, f)?;
            }
        }
    }
    ControlFlow::Continue(())
}
