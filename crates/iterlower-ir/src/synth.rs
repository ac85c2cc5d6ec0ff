//! The synthesized state-machine type.
//!
//! Method bodies are flat: a sequence of statements addressed by labels, with
//! all structured control flow expressed as jumps. Reading a body never needs
//! a call stack beyond the method itself.

use iterlower_core::{MemberRef, Visibility};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::bound::{BinOp, IteratorKind, LocalId, SourceMethod, UnOp, Var};
use crate::types::Type;

/// Reserved values of the state field.
pub mod states {
    /// Positioned before the first statement of the body.
    pub const FRESH: i64 = 0;
    /// Absorbing: advancing returns false forever.
    pub const FINISHED: i64 = -1;
    /// An enumerable that has not handed out an enumerator yet.
    pub const NOT_STARTED: i64 = -2;
    /// The body is executing.
    pub const RUNNING: i64 = -3;

    /// State stored while paused at the `index`-th suspension point.
    pub const fn suspended_at(index: usize) -> i64 {
        index as i64 + 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabelId(pub u32);

impl std::fmt::Display for LabelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Why a field exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldRole {
    State,
    Current,
    /// Thread that constructed the instance; enumerables only.
    InitialThreadId,
    /// A variable that lives across suspension points.
    Hoisted(Var),
    /// Original argument of a parameter the body assigns to.
    Proxy(usize),
}

impl FieldRole {
    /// Whether the field is copied into a clone handed out by enumerator vending.
    pub fn is_captured_slot(self) -> bool {
        matches!(self, FieldRole::Hoisted(_) | FieldRole::Proxy(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDef {
    pub id: FieldId,
    pub name: String,
    pub ty: Type,
    pub role: FieldRole,
    pub visibility: Visibility,
    pub readonly: bool,
}

/// Assignable storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Place {
    /// A field of `this`.
    Field(FieldId),
    /// A field of the state machine held in a method local.
    FieldOf(LocalId, FieldId),
    Local(LocalId),
}

/// How generated code obtains the current thread's identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreadIdSource {
    Accessor(MemberRef),
    ViaThread {
        current_thread: MemberRef,
        managed_id: MemberRef,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LExpr {
    Int(i64),
    Bool(bool),
    Str(String),
    Null,
    Load(Place),
    /// The receiver of the executing method.
    This,
    /// A parameter of the executing method.
    Param(usize),
    /// Assignment used as a value.
    Assign(Place, Box<LExpr>),
    Unary(UnOp, Box<LExpr>),
    Binary(BinOp, Box<LExpr>, Box<LExpr>),
    Array(Vec<LExpr>),
    Index(Box<LExpr>, Box<LExpr>),
    Len(Box<LExpr>),
    Call { callee: String, args: Vec<LExpr> },
    /// Call a parameterless helper method of the state machine on `this`.
    CallSelf(String),
    /// Construct the state machine.
    New { args: Vec<LExpr> },
    ThreadId(ThreadIdSource),
}

impl LExpr {
    pub fn load_field(field: FieldId) -> Self {
        LExpr::Load(Place::Field(field))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LStmt {
    Label(LabelId),
    Goto(LabelId),
    GotoUnless { cond: LExpr, target: LabelId },
    /// Jump table: evaluates `value` once.
    Switch {
        value: LExpr,
        cases: Vec<(i64, LabelId)>,
        default: LabelId,
    },
    Assign { place: Place, value: LExpr },
    Eval(LExpr),
    Return(Option<LExpr>),
    /// Construct and throw the exception whose constructor is given.
    Throw(MemberRef),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    Constructor,
    /// Replacement body of the original iterator method.
    Kickoff,
    MoveNext,
    CurrentGeneric,
    CurrentObject,
    Dispose,
    Reset,
    GetEnumeratorGeneric,
    GetEnumeratorObject,
    /// A cleanup block extracted from a try region that contains suspension points.
    Finally,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodLocal {
    pub id: LocalId,
    pub name: String,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub kind: MethodKind,
    pub params: Vec<(String, Type)>,
    pub return_type: Option<Type>,
    /// Interface member this method implements.
    pub implements: Option<MemberRef>,
    pub visibility: Visibility,
    pub locals: Vec<MethodLocal>,
    pub body: Vec<LStmt>,
}

impl MethodDef {
    pub fn local(&self, id: LocalId) -> Option<&MethodLocal> {
        self.locals.iter().find(|local| local.id == id)
    }
}

/// What the dispatch knows about one suspension state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateInfo {
    pub state: i64,
    pub resume: LabelId,
    /// Extracted cleanup methods enclosing the suspension point, innermost first.
    pub cleanup: SmallVec<[String; 2]>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SynthesizedType {
    pub name: String,
    pub type_params: Vec<String>,
    pub kind: IteratorKind,
    pub element_type: Type,
    pub interfaces: Vec<Type>,
    pub visibility: Visibility,
    pub fields: Vec<FieldDef>,
    pub constructor: MethodDef,
    pub methods: Vec<MethodDef>,
    pub states: Vec<StateInfo>,
}

impl SynthesizedType {
    pub fn field(&self, id: FieldId) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.id == id)
    }

    pub fn field_by_role(&self, role: FieldRole) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.role == role)
    }

    pub fn method(&self, kind: MethodKind) -> Option<&MethodDef> {
        self.methods.iter().find(|method| method.kind == kind)
    }

    pub fn method_named(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|method| method.name == name)
    }
}

/// Result of lowering one iterator method.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoweredMethod {
    /// The method as received, before any rewriting.
    pub original: SourceMethod,
    /// Replacement body: construct the state machine, wire arguments, return it.
    pub kickoff: MethodDef,
    pub state_machine: SynthesizedType,
}
