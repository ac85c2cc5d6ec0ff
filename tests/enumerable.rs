//! Enumerator vending: template reuse, cloning and parameter restoration.

mod common;

use common::{ints, lower, lower_with};
use iterlower::{LowerOptions, PlatformTable, SourceMethod, Type, WellKnownMember};
use iterlower_eval::{Runtime, ThreadRead, Value};
use iterlower_ir::builder::*;
use iterlower_ir::{BinOp, states};

/// Counts down from `n`, mutating the parameter as it goes.
fn countdown() -> SourceMethod {
    let mut b = MethodBuilder::new("countdown", Type::enumerable_of(Type::Int32));
    let n = b.param("n", Type::Int32);
    b.body(vec![while_(
        binary(BinOp::Gt, var(n), int(0)),
        vec![
            yield_(var(n)),
            expr(assign(n, binary(BinOp::Sub, var(n), int(1)))),
        ],
    )])
}

#[test]
fn test_first_vend_on_creating_thread_reuses_template() {
    let method = countdown();
    let lowered = lower(&method);
    let mut rt = Runtime::new(&lowered);

    let template = rt.invoke(None, vec![Value::Int(2)]).unwrap();
    assert_eq!(rt.state(&template).unwrap(), states::NOT_STARTED);

    let first = rt.get_enumerator(&template).unwrap();
    assert!(first.same_instance(&template));
    assert_eq!(rt.state(&first).unwrap(), states::FRESH);
}

#[test]
fn test_re_enumeration_after_full_consumption() {
    let method = countdown();
    let lowered = lower(&method);
    let mut rt = Runtime::new(&lowered);
    let template = rt.invoke(None, vec![Value::Int(3)]).unwrap();

    let first = rt.get_enumerator(&template).unwrap();
    assert_eq!(rt.drain(&first).unwrap(), ints(&[3, 2, 1]));

    let second = rt.get_enumerator(&template).unwrap();
    assert!(!second.same_instance(&first));
    assert_eq!(rt.drain(&second).unwrap(), ints(&[3, 2, 1]));
}

#[test]
fn test_second_vend_is_independent() {
    let method = countdown();
    let lowered = lower(&method);
    let mut rt = Runtime::new(&lowered);
    let template = rt.invoke(None, vec![Value::Int(3)]).unwrap();

    let a = rt.get_enumerator(&template).unwrap();
    let b = rt.get_enumerator(&template).unwrap();
    assert!(!a.same_instance(&b));

    assert!(rt.move_next(&a).unwrap());
    assert!(rt.move_next(&a).unwrap());
    assert_eq!(rt.current(&a).unwrap(), Value::Int(2));

    assert!(rt.move_next(&b).unwrap());
    assert_eq!(rt.current(&b).unwrap(), Value::Int(3));
    assert_eq!(rt.current(&a).unwrap(), Value::Int(2));
}

#[test]
fn test_vend_from_other_thread_clones() {
    let method = countdown();
    let lowered = lower(&method);
    let mut rt = Runtime::new(&lowered);
    let template = rt.invoke(None, vec![Value::Int(2)]).unwrap();

    rt.set_thread(2);
    let other = rt.get_enumerator(&template).unwrap();
    assert!(!other.same_instance(&template));
    assert_eq!(rt.state(&template).unwrap(), states::NOT_STARTED);
    assert_eq!(rt.drain(&other).unwrap(), ints(&[2, 1]));

    rt.set_thread(1);
    let own = rt.get_enumerator(&template).unwrap();
    assert!(own.same_instance(&template));
    assert_eq!(rt.drain(&own).unwrap(), ints(&[2, 1]));
}

#[test]
fn test_parameter_mutation_does_not_leak_into_next_enumeration() {
    let method = countdown();
    let lowered = lower(&method);
    let mut rt = Runtime::new(&lowered);
    let template = rt.invoke(None, vec![Value::Int(2)]).unwrap();

    let first = rt.get_enumerator(&template).unwrap();
    assert!(rt.move_next(&first).unwrap());
    assert!(rt.move_next(&first).unwrap());

    let second = rt.get_enumerator(&template).unwrap();
    assert_eq!(rt.drain(&second).unwrap(), ints(&[2, 1]));
}

#[test]
fn test_non_generic_vending_forwards() {
    let method = countdown();
    let lowered = lower(&method);
    let mut rt = Runtime::new(&lowered);
    let template = rt.invoke(None, vec![Value::Int(1)]).unwrap();

    let sm = rt.object_get_enumerator(&template).unwrap();
    assert!(sm.same_instance(&template));
    assert!(rt.move_next(&sm).unwrap());
    assert_eq!(rt.object_current(&sm).unwrap(), Value::Int(1));
}

#[test]
fn test_template_reuse_can_be_disabled() {
    let method = countdown();
    let options = LowerOptions {
        reuse_template_instance: false,
        ..LowerOptions::default()
    };
    let lowered = lower_with(&method, &PlatformTable::standard(), &options);
    let mut rt = Runtime::new(&lowered);
    let template = rt.invoke(None, vec![Value::Int(2)]).unwrap();

    let sm = rt.get_enumerator(&template).unwrap();
    assert!(!sm.same_instance(&template));
    assert_eq!(rt.drain(&sm).unwrap(), ints(&[2, 1]));
    assert_eq!(rt.state(&template).unwrap(), states::NOT_STARTED);
}

#[test]
fn test_advancing_the_template_before_vending_does_nothing() {
    let method = countdown();
    let lowered = lower(&method);
    let mut rt = Runtime::new(&lowered);
    let template = rt.invoke(None, vec![Value::Int(2)]).unwrap();

    assert!(!rt.move_next(&template).unwrap());
    assert_eq!(rt.state(&template).unwrap(), states::NOT_STARTED);
    rt.dispose(&template).unwrap();
    assert_eq!(rt.state(&template).unwrap(), states::NOT_STARTED);
}

#[test]
fn test_missing_fast_thread_accessor_uses_thread_object() {
    let method = countdown();
    let platform = PlatformTable::standard().without(WellKnownMember::CurrentManagedThreadId);
    let lowered = lower_with(&method, &platform, &LowerOptions::default());
    let mut rt = Runtime::new(&lowered);

    let template = rt.invoke(None, vec![Value::Int(2)]).unwrap();
    let sm = rt.get_enumerator(&template).unwrap();
    assert!(sm.same_instance(&template));
    assert_eq!(rt.drain(&sm).unwrap(), ints(&[2, 1]));
    assert!(
        rt.thread_reads()
            .iter()
            .all(|read| *read == ThreadRead::ViaThread)
    );
    assert!(!rt.thread_reads().is_empty());
}

#[test]
fn test_hoisted_locals_are_copied_into_clones() {
    let mut b = MethodBuilder::new("gen", Type::enumerable_of(Type::Str));
    let tag = b.param("tag", Type::Str);
    let method = b.body(vec![yield_(var(tag)), yield_(var(tag))]);
    let lowered = lower(&method);
    let mut rt = Runtime::new(&lowered);
    let template = rt.invoke(None, vec![Value::str("t")]).unwrap();

    rt.set_thread(9);
    let clone = rt.get_enumerator(&template).unwrap();
    assert_eq!(rt.drain(&clone).unwrap(), vec![Value::str("t"), Value::str("t")]);
}
