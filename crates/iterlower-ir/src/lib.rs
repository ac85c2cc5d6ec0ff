//! Intermediate representations for iterator lowering.
//!
//! - [`bound`]: the type-checked method body handed over by the binder.
//! - [`synth`]: the synthesized state-machine type and its flat method bodies.
//! - [`printer`]: a stable textual dump of lowered output.

pub mod bound;
pub mod builder;
pub mod printer;
pub mod synth;
pub mod types;
pub mod walk;

pub use bound::{
    BinOp, Block, Expr, IteratorKind, LocalId, LocalSymbol, Parameter, SourceMethod, Stmt,
    SwitchCase, UnOp, Var,
};
pub use synth::{
    FieldDef, FieldId, FieldRole, LExpr, LStmt, LabelId, LoweredMethod, MethodDef, MethodKind,
    MethodLocal, Place, StateInfo, SynthesizedType, ThreadIdSource, states,
};
pub use types::{InterfaceKind, Type, TypeParam, TypeParamOwner};
pub use walk::{StmtWalk, WalkAction};
