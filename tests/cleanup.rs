//! Cleanup blocks on normal exit, early exit and dispose.

mod common;

use common::{callees, ints, lower, start};
use iterlower::{SourceMethod, Type};
use iterlower_eval::{Runtime, Value, run_reference, run_reference_prefix};
use iterlower_ir::builder::*;
use iterlower_ir::{Stmt, states};

fn close(which: &str) -> Stmt {
    expr(call("close", vec![string(which)]))
}

fn nested() -> SourceMethod {
    MethodBuilder::new("nested", Type::enumerator_of(Type::Int32)).body(vec![
        expr(call("open", vec![])),
        try_finally(
            vec![
                yield_(int(1)),
                try_finally(vec![yield_(int(2)), yield_(int(3))], vec![close("inner")]),
                yield_(int(4)),
            ],
            vec![close("outer")],
        ),
        yield_(int(5)),
    ])
}

#[test]
fn test_dispose_after_each_prefix_matches_unwinding() {
    let method = nested();
    let lowered = lower(&method);

    for taken in 0..=5 {
        let mut rt = Runtime::new(&lowered);
        let sm = rt.invoke(None, vec![]).unwrap();
        for _ in 0..taken {
            assert!(rt.move_next(&sm).unwrap());
        }
        rt.dispose(&sm).unwrap();

        let expected = run_reference_prefix(&method, None, vec![], taken).unwrap();
        assert_eq!(callees(rt.calls()), callees(&expected.calls), "after {taken}");
        assert_eq!(rt.state(&sm).unwrap(), states::FINISHED);
    }
}

#[test]
fn test_dispose_runs_innermost_first_exactly_once() {
    let method = nested();
    let lowered = lower(&method);
    let mut rt = Runtime::new(&lowered);
    let sm = rt.invoke(None, vec![]).unwrap();

    for _ in 0..3 {
        assert!(rt.move_next(&sm).unwrap());
    }
    assert_eq!(rt.current(&sm).unwrap(), Value::Int(3));
    rt.take_calls();

    rt.dispose(&sm).unwrap();
    assert_eq!(
        callees(&rt.take_calls()),
        vec![r#"close("inner")"#, r#"close("outer")"#]
    );

    rt.dispose(&sm).unwrap();
    assert!(!rt.move_next(&sm).unwrap());
    assert!(rt.calls().is_empty());
}

#[test]
fn test_dispose_outside_any_try_only_finishes() {
    let method = nested();
    let lowered = lower(&method);
    let mut rt = Runtime::new(&lowered);
    let sm = rt.invoke(None, vec![]).unwrap();

    for _ in 0..5 {
        assert!(rt.move_next(&sm).unwrap());
    }
    rt.take_calls();
    rt.dispose(&sm).unwrap();
    assert!(rt.calls().is_empty());
    assert_eq!(rt.state(&sm).unwrap(), states::FINISHED);
}

#[test]
fn test_normal_completion_runs_each_cleanup_once() {
    let method = nested();
    let lowered = lower(&method);
    let mut rt = Runtime::new(&lowered);
    let sm = rt.invoke(None, vec![]).unwrap();

    assert_eq!(rt.drain(&sm).unwrap(), ints(&[1, 2, 3, 4, 5]));
    rt.dispose(&sm).unwrap();
    assert_eq!(
        callees(rt.calls()),
        vec!["open()", r#"close("inner")"#, r#"close("outer")"#]
    );
}

#[test]
fn test_break_and_continue_leave_try_regions() {
    let mut b = MethodBuilder::new("loops", Type::enumerator_of(Type::Int32));
    let i = b.local("i", Type::Int32);
    let method = b.body(vec![
        let_(i, int(0)),
        while_(
            lt(local(i), int(10)),
            vec![
                increment(i, 1),
                try_finally(
                    vec![
                        try_finally(
                            vec![
                                if_(
                                    iterlower_ir::Expr::Binary(
                                        iterlower_ir::BinOp::Eq,
                                        Box::new(local(i)),
                                        Box::new(int(2)),
                                    ),
                                    vec![Stmt::Continue],
                                    None,
                                ),
                                yield_(local(i)),
                                if_(lt(int(2), local(i)), vec![Stmt::Break], None),
                            ],
                            vec![expr(call("inner", vec![local(i)]))],
                        ),
                    ],
                    vec![expr(call("outer", vec![local(i)]))],
                ),
            ],
        ),
        yield_(int(-1)),
    ]);

    let expected = run_reference(&method, None, vec![]).unwrap();
    let lowered = lower(&method);
    let mut rt = Runtime::new(&lowered);
    let sm = rt.invoke(None, vec![]).unwrap();

    assert_eq!(rt.drain(&sm).unwrap(), expected.values);
    assert_eq!(expected.values, ints(&[1, 3, -1]));
    assert_eq!(callees(rt.calls()), callees(&expected.calls));
    assert_eq!(
        callees(rt.calls()),
        vec!["inner(1)", "outer(1)", "inner(2)", "outer(2)", "inner(3)", "outer(3)"]
    );
}

#[test]
fn test_yield_break_runs_enclosing_cleanups() {
    let method = MethodBuilder::new("bail", Type::enumerable_of(Type::Int32)).body(vec![
        try_finally(
            vec![
                yield_(int(1)),
                try_finally(vec![Stmt::YieldBreak], vec![close("quiet")]),
                yield_(int(2)),
            ],
            vec![close("outer")],
        ),
        yield_(int(3)),
    ]);

    let expected = run_reference(&method, None, vec![]).unwrap();
    let lowered = lower(&method);
    let mut rt = Runtime::new(&lowered);
    let sm = start(&mut rt, vec![]);

    assert_eq!(rt.drain(&sm).unwrap(), ints(&[1]));
    assert_eq!(
        callees(rt.calls()),
        vec![r#"close("quiet")"#, r#"close("outer")"#]
    );
    assert_eq!(callees(rt.calls()), callees(&expected.calls));
}

#[test]
fn test_suspension_free_try_runs_inline() {
    let mut b = MethodBuilder::new("quiet", Type::enumerator_of(Type::Int32));
    let i = b.local("i", Type::Int32);
    let method = b.body(vec![for_(
        vec![let_(i, int(0))],
        Some(lt(local(i), int(3))),
        vec![assign(iterlower_ir::Var::Local(i), add(local(i), int(1)))],
        vec![
            try_finally(
                vec![if_(lt(int(0), local(i)), vec![Stmt::Continue], None)],
                vec![expr(call("log", vec![local(i)]))],
            ),
            yield_(local(i)),
        ],
    )]);

    let expected = run_reference(&method, None, vec![]).unwrap();
    let lowered = lower(&method);
    assert!(
        lowered
            .state_machine
            .method(iterlower_ir::MethodKind::Finally)
            .is_none()
    );

    let mut rt = Runtime::new(&lowered);
    let sm = rt.invoke(None, vec![]).unwrap();
    assert_eq!(rt.drain(&sm).unwrap(), ints(&[0]));
    assert_eq!(callees(rt.calls()), callees(&expected.calls));
    assert_eq!(callees(rt.calls()), vec!["log(0)", "log(1)", "log(2)"]);
}
