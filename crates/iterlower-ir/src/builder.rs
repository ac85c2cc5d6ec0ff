//! Convenience constructors for bound trees, used by binders in tests and tools.

use iterlower_core::{Span, Visibility};

use crate::bound::{
    BinOp, Block, Expr, LocalId, Parameter, SourceMethod, Stmt, SwitchCase, UnOp, Var,
};
use crate::types::Type;

/// Incrementally declares the symbols of an iterator method.
pub struct MethodBuilder {
    method: SourceMethod,
}

impl MethodBuilder {
    pub fn new(name: impl Into<String>, return_type: Type) -> Self {
        Self {
            method: SourceMethod {
                name: name.into(),
                visibility: Visibility::Public,
                type_params: Vec::new(),
                receiver: None,
                params: Vec::new(),
                return_type,
                locals: Vec::new(),
                body: Block::default(),
                span: Span::default(),
            },
        }
    }

    /// Declare a method type parameter and return a reference to it.
    pub fn type_param(&mut self, name: impl Into<String>) -> Type {
        let name = name.into();
        let index = self.method.type_params.len();
        self.method.type_params.push(name.clone());
        Type::method_param(index, name)
    }

    /// Declare a return type after type parameters are known.
    pub fn returns(&mut self, return_type: Type) -> &mut Self {
        self.method.return_type = return_type;
        self
    }

    pub fn receiver(&mut self, ty: Type) -> Var {
        self.method.receiver = Some(ty);
        Var::Receiver
    }

    pub fn param(&mut self, name: impl Into<String>, ty: Type) -> Var {
        self.method.params.push(Parameter {
            name: name.into(),
            ty,
        });
        Var::Param(self.method.params.len() - 1)
    }

    pub fn local(&mut self, name: impl Into<String>, ty: Type) -> LocalId {
        self.method.add_local(name, ty, false)
    }

    pub fn span(&mut self, span: Span) -> &mut Self {
        self.method.span = span;
        self
    }

    pub fn body(mut self, stmts: Vec<Stmt>) -> SourceMethod {
        self.method.body = Block::new(stmts);
        self.method
    }
}

pub fn int(value: i64) -> Expr {
    Expr::Int(value)
}

pub fn boolean(value: bool) -> Expr {
    Expr::Bool(value)
}

pub fn string(value: impl Into<String>) -> Expr {
    Expr::Str(value.into())
}

pub fn var(var: Var) -> Expr {
    Expr::Var(var)
}

pub fn local(id: LocalId) -> Expr {
    Expr::Var(Var::Local(id))
}

pub fn assign(target: Var, value: Expr) -> Expr {
    Expr::Assign(target, Box::new(value))
}

pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary(op, Box::new(lhs), Box::new(rhs))
}

pub fn add(lhs: Expr, rhs: Expr) -> Expr {
    binary(BinOp::Add, lhs, rhs)
}

pub fn lt(lhs: Expr, rhs: Expr) -> Expr {
    binary(BinOp::Lt, lhs, rhs)
}

pub fn not(operand: Expr) -> Expr {
    Expr::Unary(UnOp::Not, Box::new(operand))
}

pub fn array(items: Vec<Expr>) -> Expr {
    Expr::Array(items)
}

pub fn call(callee: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Call {
        callee: callee.into(),
        args,
    }
}

pub fn block(stmts: Vec<Stmt>) -> Stmt {
    Stmt::Block(Block::new(stmts))
}

pub fn let_(local: LocalId, init: Expr) -> Stmt {
    Stmt::Local {
        local,
        init: Some(init),
    }
}

pub fn expr(expr: Expr) -> Stmt {
    Stmt::Expr(expr)
}

/// `local = local + by` as a statement.
pub fn increment(local: LocalId, by: i64) -> Stmt {
    Stmt::Expr(assign(Var::Local(local), add(self::local(local), int(by))))
}

pub fn yield_(value: Expr) -> Stmt {
    Stmt::Yield(value)
}

pub fn if_(cond: Expr, then_branch: Vec<Stmt>, else_branch: Option<Vec<Stmt>>) -> Stmt {
    Stmt::If {
        cond,
        then_branch: Block::new(then_branch),
        else_branch: else_branch.map(Block::new),
    }
}

pub fn while_(cond: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::While {
        cond,
        body: Block::new(body),
    }
}

pub fn for_(init: Vec<Stmt>, cond: Option<Expr>, step: Vec<Expr>, body: Vec<Stmt>) -> Stmt {
    Stmt::For {
        init,
        cond,
        step,
        body: Block::new(body),
    }
}

pub fn foreach(var: LocalId, collection: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::ForEach {
        var,
        collection,
        body: Block::new(body),
    }
}

pub fn switch(
    scrutinee: Expr,
    cases: Vec<(Vec<i64>, Vec<Stmt>)>,
    default: Option<Vec<Stmt>>,
) -> Stmt {
    Stmt::Switch {
        scrutinee,
        cases: cases
            .into_iter()
            .map(|(values, body)| SwitchCase {
                values,
                body: Block::new(body),
            })
            .collect(),
        default: default.map(Block::new),
    }
}

pub fn try_finally(body: Vec<Stmt>, finally: Vec<Stmt>) -> Stmt {
    Stmt::Try {
        body: Block::new(body),
        finally: Block::new(finally),
    }
}
