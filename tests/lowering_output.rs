//! Shape of the generated code: printed output, naming, determinism, config.

mod common;

use common::lower;
use iterlower::{
    HoistPolicy, IteratorSource, LowerOptions, LoweringOutcome, PlatformTable, SourceMethod, Type,
    Visibility, WellKnownMember, lower_iterator, lowering_diagnostics, print_lowered,
    print_state_machine,
};
use iterlower_ir::builder::*;
use iterlower_ir::{FieldRole, TypeParamOwner, Var};

#[test]
fn test_print_single_yield_enumerator() {
    let method = MethodBuilder::new("one", Type::enumerator_of(Type::Int32))
        .body(vec![yield_(int(1))]);

    insta::assert_snapshot!(print_lowered(&lower(&method)), @r#"
    kickoff one() -> Enumerator<int>
        local $sm: one$Iterator
        $sm = new one$Iterator(0)
        return $sm
    end

    private class one$Iterator (enumerator of int)
      implements Disposable, Enumerator, Enumerator<int>
      field internal $state: int
      field internal $current: int
      state 1 resume L2
      internal .ctor($initial_state: int)
        this.$state = $initial_state
        return
      end
      private move_next() -> bool implements rt.iter.Enumerator.move_next
        switch this.$state { 0 => L0, 1 => L2, _ => L1 }
      L1:
        return false
      L0:
        this.$state = -3
        this.$current = 1
        this.$state = 1
        return true
      L2:
        this.$state = -3
        this.$state = -1
        return false
      end
      private current() -> int implements rt.iter.Enumerator`1.current
        return this.$current
      end
      private object_current() -> object implements rt.iter.Enumerator.current
        return this.$current
      end
      private dispose() implements rt.Disposable.dispose
        switch this.$state { 0 => L0, 1 => L0, _ => L1 }
      L0:
        this.$state = -1
      L1:
        return
      end
      private reset() implements rt.iter.Enumerator.reset
        throw new rt.NotSupportedException..ctor()
      end
    end
    "#);
}

#[test]
fn test_print_enumerable_with_cleanup_and_proxy() {
    let mut b = MethodBuilder::new("countdown", Type::enumerable_of(Type::Int32));
    let n = b.param("n", Type::Int32);
    let method = b.body(vec![try_finally(
        vec![
            yield_(var(n)),
            expr(assign(n, add(var(n), int(-1)))),
            yield_(var(n)),
        ],
        vec![expr(call("close", vec![]))],
    )]);

    let lowered = lower(&method);
    let printed = print_lowered(&lowered);
    assert!(printed.ends_with(&print_state_machine(&lowered.state_machine)));
    insta::assert_snapshot!(printed, @r#"
    kickoff countdown(n: int) -> Enumerable<int>
        local $sm: countdown$Iterator
        $sm = new countdown$Iterator(-2)
        $sm.n = n
        $sm.n$init = n
        return $sm
    end

    private class countdown$Iterator (enumerable of int)
      implements Disposable, Enumerator, Enumerator<int>, Enumerable, Enumerable<int>
      field internal $state: int
      field internal $current: int
      field internal readonly $initial_thread_id: int
      field internal n: int
      field internal n$init: int
      state 1 resume L2 cleanup [$finally]
      state 2 resume L3 cleanup [$finally]
      internal .ctor($initial_state: int)
        this.$state = $initial_state
        this.$initial_thread_id = rt.Environment.current_managed_thread_id()
        return
      end
      private move_next() -> bool implements rt.iter.Enumerator.move_next
        switch this.$state { 0 => L0, 1 => L2, 2 => L3, _ => L1 }
      L1:
        return false
      L0:
        this.$state = -3
        this.$current = this.n
        this.$state = 1
        return true
      L2:
        this.$state = -3
        this.n = (this.n + -1)
        this.$current = this.n
        this.$state = 2
        return true
      L3:
        this.$state = -3
        this.$finally()
        this.$state = -1
        return false
      end
      private current() -> int implements rt.iter.Enumerator`1.current
        return this.$current
      end
      private object_current() -> object implements rt.iter.Enumerator.current
        return this.$current
      end
      private dispose() implements rt.Disposable.dispose
        switch this.$state { 0 => L0, 1 => L2, 2 => L3, _ => L1 }
      L2:
        this.$finally()
        goto L0
      L3:
        this.$finally()
        goto L0
      L0:
        this.$state = -1
      L1:
        return
      end
      private reset() implements rt.iter.Enumerator.reset
        throw new rt.NotSupportedException..ctor()
      end
      private get_enumerator() -> Enumerator<int> implements rt.iter.Enumerable`1.get_enumerator
        local $result: countdown$Iterator
        unless ((this.$state == -2) && (this.$initial_thread_id == rt.Environment.current_managed_thread_id())) goto L0
        this.$state = 0
        $result = this
        goto L1
      L0:
        $result = new countdown$Iterator(0)
        $result.n = this.n
        $result.n$init = this.n$init
      L1:
        $result.n = this.n$init
        return $result
      end
      private object_get_enumerator() -> Enumerator implements rt.iter.Enumerable.get_enumerator
        return this.get_enumerator()
      end
      private $finally()
        close()
        return
      end
    end
    "#);
}

fn generic_pairs() -> SourceMethod {
    let mut b = MethodBuilder::new("pairs", Type::Object);
    let t = b.type_param("T");
    b.returns(Type::enumerable_of(t.clone()));
    let items = b.param("items", Type::array(t.clone()));
    let item = b.local("item", t);
    b.body(vec![foreach(
        item,
        var(items),
        vec![yield_(local(item)), yield_(local(item))],
    )])
}

#[test]
fn test_lowering_is_deterministic() {
    let method = generic_pairs();
    assert_eq!(print_lowered(&lower(&method)), print_lowered(&lower(&method)));
}

#[test]
fn test_generic_parameters_move_to_state_machine() {
    let lowered = lower(&generic_pairs());
    let sm = &lowered.state_machine;

    assert_eq!(sm.type_params, vec!["T".to_owned()]);
    assert_eq!(sm.element_type.to_string(), "T");
    assert!(sm.element_type.mentions_params_of(TypeParamOwner::StateMachine));
    for field in &sm.fields {
        assert!(!field.ty.mentions_params_of(TypeParamOwner::Method), "{}", field.name);
    }
    assert!(
        lowered
            .kickoff
            .return_type
            .as_ref()
            .is_some_and(|ty| ty.mentions_params_of(TypeParamOwner::Method))
    );
}

#[test]
fn test_fields_and_visibility() {
    let lowered = lower(&generic_pairs());
    let sm = &lowered.state_machine;

    let names: Vec<&str> = sm.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["$state", "$current", "$initial_thread_id", "items", "$array", "$index", "item"]
    );
    assert!(sm.field_by_role(FieldRole::InitialThreadId).unwrap().readonly);
    assert!(sm.field_by_role(FieldRole::Hoisted(Var::Param(0))).is_some());
    assert!(sm.fields.iter().all(|f| f.visibility != Visibility::Public));
    assert!(sm.methods.iter().all(|m| m.visibility != Visibility::Public));
    assert_eq!(sm.visibility, Visibility::Private);
    assert_eq!(lowered.kickoff.visibility, Visibility::Public);
}

#[test]
fn test_hoist_everything_policy() {
    let mut b = MethodBuilder::new("scratch", Type::enumerator_of(Type::Int32));
    let tmp = b.local("tmp", Type::Int32);
    let method = b.body(vec![
        block(vec![let_(tmp, int(1)), expr(call("use", vec![local(tmp)]))]),
        yield_(int(0)),
    ]);

    let default = lower(&method);
    assert!(default.state_machine.field_by_role(FieldRole::Hoisted(Var::Local(tmp))).is_none());

    let options = LowerOptions {
        hoist_policy: HoistPolicy::All,
        ..LowerOptions::default()
    };
    let all = common::lower_with(&method, &PlatformTable::standard(), &options);
    assert!(all.state_machine.field_by_role(FieldRole::Hoisted(Var::Local(tmp))).is_some());
}

#[test]
fn test_options_load_from_json() {
    let options: LowerOptions =
        serde_json::from_str(r#"{ "hoist_policy": "all", "reuse_template_instance": false }"#)
            .unwrap();
    assert_eq!(options.hoist_policy, HoistPolicy::All);
    assert!(!options.reuse_template_instance);
    assert_eq!(options.visibility, LowerOptions::default().visibility);

    let defaults: LowerOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(defaults, LowerOptions::default());
}

#[test]
fn test_query_reports_each_outcome() {
    let db = salsa::DatabaseImpl::default();
    let method = generic_pairs();

    let standard = PlatformTable::standard();
    let ok = IteratorSource::new(&db, method.clone(), standard.clone(), LowerOptions::default());
    assert!(matches!(lower_iterator(&db, ok), LoweringOutcome::Lowered(_)));

    let incomplete = PlatformTable::standard().without(WellKnownMember::GenericEnumerable);
    let skipped = IteratorSource::new(&db, method.clone(), incomplete, LowerOptions::default());
    let outcome = lower_iterator(&db, skipped);
    assert_eq!(outcome.original(), &method);
    assert_eq!(outcome.print(), "unchanged pairs\n");
    assert!(lowering_diagnostics(&db, skipped).is_empty());

    let mut b = MethodBuilder::new("broken", Type::enumerator_of(Type::Int32));
    let n = b.param("n", Type::Int32);
    let broken = b.body(vec![while_(
        boolean(true),
        vec![try_finally(vec![yield_(var(n))], vec![iterlower_ir::Stmt::Continue])],
    )]);
    let failed = IteratorSource::new(&db, broken, standard, LowerOptions::default());
    assert!(matches!(lower_iterator(&db, failed), LoweringOutcome::Failed(_)));
    let diagnostics = lowering_diagnostics(&db, failed);
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].message.starts_with("Internal error in iterator lowering"));
}
