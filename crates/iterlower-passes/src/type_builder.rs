//! Derive the shape of the state-machine type: element type, interfaces and fields.

use std::collections::BTreeMap;

use iterlower_core::{LowerOptions, MemberRef, NameGen, WellKnownMember, WellKnownMembers};
use iterlower_ir::{
    FieldDef, FieldId, FieldRole, InterfaceKind, IteratorKind, SourceMethod, ThreadIdSource,
    Type, TypeParamOwner, Var,
};

use crate::capture::CaptureAnalysis;
use crate::error::{LowerError, LowerResult};

/// Platform members referenced by generated code, resolved up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformMembers {
    pub dispose: MemberRef,
    pub move_next: MemberRef,
    pub current_object: MemberRef,
    pub current_generic: MemberRef,
    pub reset: MemberRef,
    pub not_supported_ctor: MemberRef,
    /// Enumerables only.
    pub get_enumerator_object: Option<MemberRef>,
    /// Enumerables only.
    pub get_enumerator_generic: Option<MemberRef>,
    /// Enumerables only.
    pub thread_id: Option<ThreadIdSource>,
}

/// Check that every member the generated code needs exists.
///
/// This runs before anything is synthesized; a missing member means the
/// method is left as it is.
pub fn validate_platform(
    kind: IteratorKind,
    platform: &dyn WellKnownMembers,
) -> LowerResult<PlatformMembers> {
    let require = |member: WellKnownMember| {
        platform
            .lookup(member)
            .ok_or_else(|| LowerError::missing_member(member))
    };

    for member in [
        WellKnownMember::Int32,
        WellKnownMember::Boolean,
        WellKnownMember::Object,
        WellKnownMember::Disposable,
        WellKnownMember::Enumerator,
        WellKnownMember::GenericEnumerator,
    ] {
        require(member)?;
    }

    let mut members = PlatformMembers {
        dispose: require(WellKnownMember::DisposableDispose)?,
        move_next: require(WellKnownMember::EnumeratorMoveNext)?,
        current_object: require(WellKnownMember::EnumeratorCurrent)?,
        current_generic: require(WellKnownMember::GenericEnumeratorCurrent)?,
        reset: require(WellKnownMember::EnumeratorReset)?,
        not_supported_ctor: require(WellKnownMember::NotSupportedExceptionCtor)?,
        get_enumerator_object: None,
        get_enumerator_generic: None,
        thread_id: None,
    };

    if kind == IteratorKind::Enumerable {
        require(WellKnownMember::Enumerable)?;
        require(WellKnownMember::GenericEnumerable)?;
        members.get_enumerator_object = Some(require(WellKnownMember::EnumerableGetEnumerator)?);
        members.get_enumerator_generic =
            Some(require(WellKnownMember::GenericEnumerableGetEnumerator)?);
        members.thread_id = Some(match platform.lookup(WellKnownMember::CurrentManagedThreadId) {
            Some(accessor) => ThreadIdSource::Accessor(accessor),
            None => {
                tracing::debug!("no fast thread-id accessor, reading it through the thread object");
                ThreadIdSource::ViaThread {
                    current_thread: require(WellKnownMember::ThreadCurrentThread)?,
                    managed_id: require(WellKnownMember::ThreadManagedThreadId)?,
                }
            }
        });
    }

    Ok(members)
}

/// Everything later stages need to know about the synthesized type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachineShape {
    pub name: String,
    pub kind: IteratorKind,
    pub type_params: Vec<String>,
    pub element_type: Type,
    pub interfaces: Vec<Type>,
    pub fields: Vec<FieldDef>,
    pub state: FieldId,
    pub current: FieldId,
    pub initial_thread_id: Option<FieldId>,
    pub slots: BTreeMap<Var, FieldId>,
    /// `(parameter index, proxy field)` for parameters the body assigns to.
    pub proxies: Vec<(usize, FieldId)>,
    pub members: PlatformMembers,
}

impl StateMachineShape {
    pub fn slot(&self, var: Var) -> Option<FieldId> {
        self.slots.get(&var).copied()
    }

    /// Move a type from the method's generic context into the state machine's.
    pub fn rebind(&self, ty: &Type) -> LowerResult<Type> {
        rebind(ty, &self.type_params)
    }

    /// The state machine as seen from inside the original method.
    pub fn type_in_method(&self) -> Type {
        Type::generic_instance(&self.name, TypeParamOwner::Method, &self.type_params)
    }
}

fn rebind(ty: &Type, type_params: &[String]) -> LowerResult<Type> {
    let rebound = ty
        .rebind_params(TypeParamOwner::Method, TypeParamOwner::StateMachine, type_params)
        .ok_or_else(|| {
            LowerError::internal(format!("type `{ty}` names an undeclared type parameter"))
        })?;
    if rebound.mentions_params_of(TypeParamOwner::Method) {
        return Err(LowerError::internal(format!("inconsistent substitution of `{ty}`")));
    }
    Ok(rebound)
}

/// Element type named by the return type, still in the method's generic context.
pub fn element_type(method: &SourceMethod) -> LowerResult<Type> {
    match &method.return_type {
        Type::Interface {
            kind: InterfaceKind::Enumerator | InterfaceKind::Enumerable,
            args,
        } => match args.as_slice() {
            [] => Ok(Type::Object),
            [element] => Ok(element.clone()),
            _ => Err(LowerError::internal(format!(
                "iterator return type `{}` must have exactly one type argument",
                method.return_type
            ))),
        },
        other => Err(LowerError::internal(format!(
            "return type `{other}` of `{}` is not an iterator",
            method.name
        ))),
    }
}

pub fn build_shape(
    method: &SourceMethod,
    kind: IteratorKind,
    capture: &CaptureAnalysis,
    members: PlatformMembers,
    names: &mut NameGen,
    options: &LowerOptions,
) -> LowerResult<StateMachineShape> {
    let type_params = method.type_params.clone();
    let element = rebind(&element_type(method)?, &type_params)?;

    let mut interfaces = vec![
        Type::interface(InterfaceKind::Disposable, vec![]),
        Type::interface(InterfaceKind::Enumerator, vec![]),
        Type::enumerator_of(element.clone()),
    ];
    if kind == IteratorKind::Enumerable {
        interfaces.push(Type::interface(InterfaceKind::Enumerable, vec![]));
        interfaces.push(Type::enumerable_of(element.clone()));
    }

    let mut fields = FieldTable {
        fields: Vec::new(),
        visibility: options.visibility.fields,
    };
    let state = fields.add(names.fresh("$state"), Type::Int32, FieldRole::State, false);
    let current = fields.add(names.fresh("$current"), element.clone(), FieldRole::Current, false);
    let initial_thread_id = (kind == IteratorKind::Enumerable).then(|| {
        fields.add(
            names.fresh("$initial_thread_id"),
            Type::Int32,
            FieldRole::InitialThreadId,
            true,
        )
    });

    let mut slots = BTreeMap::new();
    for var in &capture.hoisted {
        let (name, ty) = match var {
            Var::Receiver => (names.hoisted_field("$this"), method.receiver.as_ref()),
            _ => (
                names.hoisted_field(method.var_name(*var).unwrap_or("$var")),
                method.var_type(*var),
            ),
        };
        let ty = ty.ok_or_else(|| LowerError::internal(format!("no symbol for {var:?}")))?;
        let id = fields.add(name, rebind(ty, &type_params)?, FieldRole::Hoisted(*var), false);
        slots.insert(*var, id);
    }

    let mut proxies = Vec::new();
    if kind == IteratorKind::Enumerable {
        for &index in &capture.assigned_params {
            let param = method
                .params
                .get(index)
                .ok_or_else(|| LowerError::internal(format!("no parameter at index {index}")))?;
            let id = fields.add(
                names.proxy_field(&param.name),
                rebind(&param.ty, &type_params)?,
                FieldRole::Proxy(index),
                false,
            );
            proxies.push((index, id));
        }
    }

    let name = names.state_machine_type(&method.name);
    tracing::debug!(
        state_machine = %name,
        %kind,
        fields = fields.fields.len(),
        "built state machine shape"
    );

    Ok(StateMachineShape {
        name,
        kind,
        type_params,
        element_type: element,
        interfaces,
        fields: fields.fields,
        state,
        current,
        initial_thread_id,
        slots,
        proxies,
        members,
    })
}

struct FieldTable {
    fields: Vec<FieldDef>,
    visibility: iterlower_core::Visibility,
}

impl FieldTable {
    fn add(&mut self, name: String, ty: Type, role: FieldRole, readonly: bool) -> FieldId {
        let id = FieldId(self.fields.len() as u32);
        self.fields.push(FieldDef {
            id,
            name,
            ty,
            role,
            visibility: self.visibility,
            readonly,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::analyze_captures;
    use iterlower_core::{HoistPolicy, PlatformTable};
    use iterlower_ir::builder::*;

    fn shape_of(method: &SourceMethod) -> StateMachineShape {
        let kind = method.classification().unwrap();
        let members = validate_platform(kind, &PlatformTable::standard()).unwrap();
        let capture = analyze_captures(method, HoistPolicy::default());
        build_shape(
            method,
            kind,
            &capture,
            members,
            &mut NameGen::new(),
            &LowerOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_enumerable_interfaces_and_thread_field() {
        let method = MethodBuilder::new("nums", Type::enumerable_of(Type::Int32))
            .body(vec![yield_(int(1))]);
        let shape = shape_of(&method);

        assert_eq!(shape.interfaces.len(), 5);
        assert_eq!(shape.element_type, Type::Int32);
        assert!(shape.initial_thread_id.is_some());
        let thread = &shape.fields[shape.initial_thread_id.unwrap().0 as usize];
        assert!(thread.readonly);
    }

    #[test]
    fn test_enumerator_has_no_thread_field() {
        let method = MethodBuilder::new("nums", Type::enumerator_of(Type::Str))
            .body(vec![yield_(string("a"))]);
        let shape = shape_of(&method);

        assert_eq!(shape.interfaces.len(), 3);
        assert!(shape.initial_thread_id.is_none());
        assert!(shape.members.get_enumerator_generic.is_none());
    }

    #[test]
    fn test_non_generic_return_falls_back_to_object() {
        let non_generic = Type::interface(InterfaceKind::Enumerable, vec![]);
        let method = MethodBuilder::new("things", non_generic).body(vec![yield_(int(1))]);
        let shape = shape_of(&method);
        assert_eq!(shape.element_type, Type::Object);
    }

    #[test]
    fn test_method_type_params_move_to_state_machine() {
        let mut b = MethodBuilder::new("repeat", Type::Object);
        let t = b.type_param("T");
        b.returns(Type::enumerable_of(t.clone()));
        let item = b.param("item", t);
        let method = b.body(vec![yield_(var(item))]);

        let shape = shape_of(&method);
        assert_eq!(shape.type_params, vec!["T".to_owned()]);
        assert!(shape.element_type.mentions_params_of(TypeParamOwner::StateMachine));
        let slot = shape.slot(item).unwrap();
        let field = &shape.fields[slot.0 as usize];
        assert!(!field.ty.mentions_params_of(TypeParamOwner::Method));
    }

    #[test]
    fn test_proxy_only_for_assigned_params_of_enumerables() {
        let mut b = MethodBuilder::new("down", Type::enumerable_of(Type::Int32));
        let n = b.param("n", Type::Int32);
        let keep = b.param("keep", Type::Int32);
        let method = b.body(vec![
            yield_(var(keep)),
            expr(assign(n, int(0))),
            yield_(var(n)),
        ]);

        let shape = shape_of(&method);
        assert_eq!(shape.proxies.len(), 1);
        assert_eq!(shape.proxies[0].0, 0);
        let proxy = &shape.fields[shape.proxies[0].1.0 as usize];
        assert_eq!(proxy.name, "n$init");
    }

    #[test]
    fn test_missing_required_member_is_precondition_failure() {
        let platform = PlatformTable::standard().without(WellKnownMember::EnumeratorReset);
        let err = validate_platform(IteratorKind::Enumerator, &platform).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_missing_enumerable_member_only_matters_for_enumerables() {
        let platform = PlatformTable::standard().without(WellKnownMember::GenericEnumerable);
        assert!(validate_platform(IteratorKind::Enumerator, &platform).is_ok());
        assert!(validate_platform(IteratorKind::Enumerable, &platform).is_err());
    }

    #[test]
    fn test_missing_fast_thread_accessor_degrades() {
        let platform = PlatformTable::standard().without(WellKnownMember::CurrentManagedThreadId);
        let members = validate_platform(IteratorKind::Enumerable, &platform).unwrap();
        assert!(matches!(
            members.thread_id,
            Some(ThreadIdSource::ViaThread { .. })
        ));

        let platform = platform.without(WellKnownMember::ThreadManagedThreadId);
        let err = validate_platform(IteratorKind::Enumerable, &platform).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_arity_two_return_type_is_internal_error() {
        let method = MethodBuilder::new(
            "bad",
            Type::interface(InterfaceKind::Enumerable, vec![Type::Int32, Type::Int32]),
        )
        .body(vec![yield_(int(1))]);
        let err = element_type(&method).unwrap_err();
        assert!(!err.is_precondition());
    }
}
