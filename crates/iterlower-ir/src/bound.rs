//! The bound tree: a fully type-checked iterator method as produced by the binder.

use iterlower_core::{Span, Visibility};
use serde::{Deserialize, Serialize};

use crate::types::{InterfaceKind, Type};

/// Identity of a local variable within one method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalId(pub u32);

impl std::fmt::Display for LocalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A variable reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Var {
    /// The implicit receiver.
    Receiver,
    /// A parameter, by position.
    Param(usize),
    Local(LocalId),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalSymbol {
    pub id: LocalId,
    pub name: String,
    pub ty: Type,
    /// Introduced by a lowering pre-pass rather than written by the user.
    pub synthesized: bool,
}

/// The shape of the iterator's return type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IteratorKind {
    Enumerator,
    Enumerable,
}

impl std::fmt::Display for IteratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IteratorKind::Enumerator => write!(f, "enumerator"),
            IteratorKind::Enumerable => write!(f, "enumerable"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceMethod {
    pub name: String,
    /// Declared accessibility; lowering never changes it.
    pub visibility: Visibility,
    pub type_params: Vec<String>,
    /// Type of the implicit receiver; `None` for static methods.
    pub receiver: Option<Type>,
    pub params: Vec<Parameter>,
    pub return_type: Type,
    pub locals: Vec<LocalSymbol>,
    pub body: Block,
    pub span: Span,
}

impl SourceMethod {
    pub fn local(&self, id: LocalId) -> Option<&LocalSymbol> {
        self.locals.iter().find(|local| local.id == id)
    }

    /// Declare a new local and return its id.
    pub fn add_local(&mut self, name: impl Into<String>, ty: Type, synthesized: bool) -> LocalId {
        let next = self.locals.iter().map(|l| l.id.0 + 1).max().unwrap_or(0);
        let id = LocalId(next);
        self.locals.push(LocalSymbol {
            id,
            name: name.into(),
            ty,
            synthesized,
        });
        id
    }

    pub fn var_name(&self, var: Var) -> Option<&str> {
        match var {
            Var::Receiver => self.receiver.as_ref().map(|_| "this"),
            Var::Param(index) => self.params.get(index).map(|p| p.name.as_str()),
            Var::Local(id) => self.local(id).map(|l| l.name.as_str()),
        }
    }

    pub fn var_type(&self, var: Var) -> Option<&Type> {
        match var {
            Var::Receiver => self.receiver.as_ref(),
            Var::Param(index) => self.params.get(index).map(|p| &p.ty),
            Var::Local(id) => self.local(id).map(|l| &l.ty),
        }
    }

    /// Classify the method by the shape of its return type.
    pub fn classification(&self) -> Option<IteratorKind> {
        match &self.return_type {
            Type::Interface {
                kind: InterfaceKind::Enumerator,
                ..
            } => Some(IteratorKind::Enumerator),
            Type::Interface {
                kind: InterfaceKind::Enumerable,
                ..
            } => Some(IteratorKind::Enumerable),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwitchCase {
    pub values: Vec<i64>,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stmt {
    Block(Block),
    /// Declares a local in the enclosing block (or `for` header).
    Local {
        local: LocalId,
        init: Option<Expr>,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Block,
    },
    /// Iterates the elements of an array.
    ForEach {
        var: LocalId,
        collection: Expr,
        body: Block,
    },
    /// Integer switch; cases never fall through and `break` leaves the switch.
    Switch {
        scrutinee: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Block>,
    },
    Try {
        body: Block,
        finally: Block,
    },
    Break,
    Continue,
    /// Suspension point: produce a value and pause.
    Yield(Expr),
    /// Explicit stop.
    YieldBreak,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    Int(i64),
    Bool(bool),
    Str(String),
    Null,
    Var(Var),
    Assign(Var, Box<Expr>),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Array(Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Len(Box<Expr>),
    /// Call to a host function; the only source of observable side effects.
    Call { callee: String, args: Vec<Expr> },
}
