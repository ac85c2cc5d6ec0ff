#![allow(dead_code)]

use iterlower::{LowerOptions, LoweredMethod, NameGen, PlatformTable, SourceMethod};
use iterlower_eval::{HostCall, Runtime, Value};

pub fn lower(method: &SourceMethod) -> LoweredMethod {
    lower_with(method, &PlatformTable::standard(), &LowerOptions::default())
}

pub fn lower_with(
    method: &SourceMethod,
    platform: &PlatformTable,
    options: &LowerOptions,
) -> LoweredMethod {
    iterlower::lower_iterator_method(method, platform, options, &mut NameGen::new())
        .expect("lowering should succeed")
}

pub fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Int).collect()
}

pub fn callees(calls: &[HostCall]) -> Vec<String> {
    calls.iter().map(|call| call.to_string()).collect()
}

/// Invoke the method and, for enumerables, vend the first enumerator.
pub fn start(rt: &mut Runtime<'_>, args: Vec<Value>) -> Value {
    let sm = rt.invoke(None, args).expect("kick-off");
    match rt.get_enumerator(&sm) {
        Ok(enumerator) => enumerator,
        Err(iterlower_eval::EvalError::UnknownMethod(_)) => sm,
        Err(err) => panic!("vending failed: {err}"),
    }
}
