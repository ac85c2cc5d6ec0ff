//! Decide which variables live in fields of the state machine.
//!
//! The receiver and every parameter are always hoisted. A local is hoisted
//! when the scope that declares it (a block, or the header of a `for`)
//! contains a suspension point anywhere inside it. This over-approximates
//! cross-suspension liveness: a local declared in a suspending scope but only
//! used before the first suspension is hoisted anyway.

use std::collections::BTreeSet;

use iterlower_core::HoistPolicy;
use iterlower_ir::{Block, LocalId, SourceMethod, Stmt, StmtWalk, Var};

/// Result of capture analysis for one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureAnalysis {
    /// Hoisted variables: receiver, then parameters, then locals in declaration order.
    pub hoisted: Vec<Var>,
    /// Parameters the body assigns to.
    pub assigned_params: Vec<usize>,
}

pub fn analyze_captures(method: &SourceMethod, policy: HoistPolicy) -> CaptureAnalysis {
    let mut hoisted = Vec::new();
    if method.receiver.is_some() {
        hoisted.push(Var::Receiver);
    }
    hoisted.extend((0..method.params.len()).map(Var::Param));

    let mut scanner = ScopeScanner {
        policy,
        locals: Vec::new(),
        seen: BTreeSet::new(),
    };
    scanner.block(&method.body);
    hoisted.extend(scanner.locals.into_iter().map(Var::Local));

    let assigned_params = method
        .body
        .assigned_vars()
        .into_iter()
        .filter_map(|var| match var {
            Var::Param(index) => Some(index),
            _ => None,
        })
        .collect();

    tracing::debug!(
        method = %method.name,
        hoisted = hoisted.len(),
        suspensions = method.body.count_suspensions(),
        "capture analysis"
    );
    CaptureAnalysis {
        hoisted,
        assigned_params,
    }
}

struct ScopeScanner {
    policy: HoistPolicy,
    locals: Vec<LocalId>,
    seen: BTreeSet<LocalId>,
}

impl ScopeScanner {
    fn hoists(&self, scope_suspends: bool) -> bool {
        match self.policy {
            HoistPolicy::All => true,
            HoistPolicy::SuspendingScopes => scope_suspends,
        }
    }

    fn hoist(&mut self, local: LocalId) {
        if self.seen.insert(local) {
            self.locals.push(local);
        }
    }

    fn block(&mut self, block: &Block) {
        self.scope(&block.stmts, block.contains_suspension());
    }

    /// Scan statements that share one declaration scope.
    fn scope(&mut self, stmts: &[Stmt], suspends: bool) {
        for stmt in stmts {
            if let Stmt::Local { local, .. } = stmt
                && self.hoists(suspends)
            {
                self.hoist(*local);
            }
            self.nested(stmt);
        }
    }

    fn nested(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => self.block(block),
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.block(then_branch);
                if let Some(else_branch) = else_branch {
                    self.block(else_branch);
                }
            }
            Stmt::While { body, .. } => self.block(body),
            Stmt::For { init, body, .. } => {
                self.scope(init, stmt.contains_suspension());
                self.block(body);
            }
            Stmt::ForEach { var, body, .. } => {
                if self.hoists(body.contains_suspension()) {
                    self.hoist(*var);
                }
                self.block(body);
            }
            Stmt::Switch { cases, default, .. } => {
                for case in cases {
                    self.block(&case.body);
                }
                if let Some(default) = default {
                    self.block(default);
                }
            }
            Stmt::Try { body, finally } => {
                self.block(body);
                self.block(finally);
            }
            Stmt::Local { .. }
            | Stmt::Expr(_)
            | Stmt::Break
            | Stmt::Continue
            | Stmt::Yield(_)
            | Stmt::YieldBreak => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iterlower_ir::Type;
    use iterlower_ir::builder::*;

    #[test]
    fn test_params_and_receiver_always_hoisted() {
        let mut b = MethodBuilder::new("m", Type::enumerable_of(Type::Int32));
        b.receiver(Type::named("Widget"));
        let n = b.param("n", Type::Int32);
        let method = b.body(vec![yield_(var(n))]);

        let analysis = analyze_captures(&method, HoistPolicy::default());
        assert_eq!(analysis.hoisted, vec![Var::Receiver, Var::Param(0)]);
        assert!(analysis.assigned_params.is_empty());
    }

    #[test]
    fn test_local_in_suspension_free_block_not_hoisted() {
        let mut b = MethodBuilder::new("m", Type::enumerable_of(Type::Int32));
        let total = b.local("total", Type::Int32);
        let scratch = b.local("scratch", Type::Int32);
        let method = b.body(vec![
            let_(total, int(0)),
            block(vec![
                let_(scratch, int(5)),
                expr(assign(Var::Local(total), local(scratch))),
            ]),
            yield_(local(total)),
        ]);

        let analysis = analyze_captures(&method, HoistPolicy::SuspendingScopes);
        assert!(analysis.hoisted.contains(&Var::Local(total)));
        assert!(!analysis.hoisted.contains(&Var::Local(scratch)));

        let all = analyze_captures(&method, HoistPolicy::All);
        assert!(all.hoisted.contains(&Var::Local(scratch)));
    }

    #[test]
    fn test_for_header_local_hoisted_when_body_suspends() {
        let mut b = MethodBuilder::new("m", Type::enumerable_of(Type::Int32));
        let i = b.local("i", Type::Int32);
        let method = b.body(vec![for_(
            vec![let_(i, int(0))],
            Some(lt(local(i), int(3))),
            vec![assign(Var::Local(i), add(local(i), int(1)))],
            vec![yield_(local(i))],
        )]);

        let analysis = analyze_captures(&method, HoistPolicy::default());
        assert!(analysis.hoisted.contains(&Var::Local(i)));
    }

    #[test]
    fn test_assigned_params_recorded() {
        let mut b = MethodBuilder::new("countdown", Type::enumerable_of(Type::Int32));
        let n = b.param("n", Type::Int32);
        let step = b.param("step", Type::Int32);
        let method = b.body(vec![while_(
            lt(int(0), var(n)),
            vec![
                yield_(var(n)),
                expr(assign(n, binary(iterlower_ir::BinOp::Sub, var(n), var(step)))),
            ],
        )]);

        let analysis = analyze_captures(&method, HoistPolicy::default());
        assert_eq!(analysis.assigned_params, vec![0]);
    }
}
