//! Types as the lowering sees them.

use serde::{Deserialize, Serialize};

/// Who declares a generic type parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeParamOwner {
    /// The iterator method being lowered.
    Method,
    /// The synthesized state-machine type.
    StateMachine,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeParam {
    pub owner: TypeParamOwner,
    pub index: usize,
    pub name: String,
}

/// Iteration-protocol interfaces, generic when instantiated with one argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterfaceKind {
    Disposable,
    Enumerator,
    Enumerable,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Int32,
    Boolean,
    Str,
    Object,
    Array(Box<Type>),
    /// A nominal class type, such as the receiver's class or the state machine itself.
    Named { name: String, args: Vec<Type> },
    Interface { kind: InterfaceKind, args: Vec<Type> },
    Param(TypeParam),
}

impl Type {
    pub fn array(element: Type) -> Self {
        Type::Array(Box::new(element))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Type::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn method_param(index: usize, name: impl Into<String>) -> Self {
        Type::Param(TypeParam {
            owner: TypeParamOwner::Method,
            index,
            name: name.into(),
        })
    }

    /// `name` applied to its own type parameters, as seen from inside `owner`.
    pub fn generic_instance(name: &str, owner: TypeParamOwner, params: &[String]) -> Self {
        Type::Named {
            name: name.to_owned(),
            args: params
                .iter()
                .enumerate()
                .map(|(index, param)| {
                    Type::Param(TypeParam {
                        owner,
                        index,
                        name: param.clone(),
                    })
                })
                .collect(),
        }
    }

    pub fn interface(kind: InterfaceKind, args: Vec<Type>) -> Self {
        Type::Interface { kind, args }
    }

    /// `Enumerable<element>`
    pub fn enumerable_of(element: Type) -> Self {
        Type::interface(InterfaceKind::Enumerable, vec![element])
    }

    /// `Enumerator<element>`
    pub fn enumerator_of(element: Type) -> Self {
        Type::interface(InterfaceKind::Enumerator, vec![element])
    }

    /// Whether the type mentions a type parameter owned by `owner`.
    pub fn mentions_params_of(&self, owner: TypeParamOwner) -> bool {
        match self {
            Type::Int32 | Type::Boolean | Type::Str | Type::Object => false,
            Type::Array(element) => element.mentions_params_of(owner),
            Type::Named { args, .. } | Type::Interface { args, .. } => {
                args.iter().any(|arg| arg.mentions_params_of(owner))
            }
            Type::Param(param) => param.owner == owner,
        }
    }

    /// Replace every type parameter of `from` with the parameter at the same index of `to`.
    ///
    /// Returns `None` if a parameter index is outside `names`.
    pub fn rebind_params(
        &self,
        from: TypeParamOwner,
        to: TypeParamOwner,
        names: &[String],
    ) -> Option<Type> {
        Some(match self {
            Type::Int32 | Type::Boolean | Type::Str | Type::Object => self.clone(),
            Type::Array(element) => Type::array(element.rebind_params(from, to, names)?),
            Type::Named { name, args } => Type::Named {
                name: name.clone(),
                args: rebind_all(args, from, to, names)?,
            },
            Type::Interface { kind, args } => Type::Interface {
                kind: *kind,
                args: rebind_all(args, from, to, names)?,
            },
            Type::Param(param) if param.owner == from => Type::Param(TypeParam {
                owner: to,
                index: param.index,
                name: names.get(param.index)?.clone(),
            }),
            Type::Param(_) => self.clone(),
        })
    }

    /// Whether assignment copies the value instead of sharing a reference.
    pub fn is_value_type(&self) -> bool {
        matches!(self, Type::Int32 | Type::Boolean)
    }
}

fn rebind_all(
    args: &[Type],
    from: TypeParamOwner,
    to: TypeParamOwner,
    names: &[String],
) -> Option<Vec<Type>> {
    args.iter()
        .map(|arg| arg.rebind_params(from, to, names))
        .collect()
}

impl std::fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceKind::Disposable => write!(f, "Disposable"),
            InterfaceKind::Enumerator => write!(f, "Enumerator"),
            InterfaceKind::Enumerable => write!(f, "Enumerable"),
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int32 => write!(f, "int"),
            Type::Boolean => write!(f, "bool"),
            Type::Str => write!(f, "string"),
            Type::Object => write!(f, "object"),
            Type::Array(element) => write!(f, "{element}[]"),
            Type::Named { name, args } => {
                write!(f, "{name}")?;
                write_args(f, args)
            }
            Type::Interface { kind, args } => {
                write!(f, "{kind}")?;
                write_args(f, args)
            }
            Type::Param(param) => write!(f, "{}", param.name),
        }
    }
}

fn write_args(f: &mut std::fmt::Formatter<'_>, args: &[Type]) -> std::fmt::Result {
    if args.is_empty() {
        return Ok(());
    }
    write!(f, "<")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, ">")
}
