//! Record functions (0x0040 - 0x0044)

use std::collections::HashSet;

use heluna_core::{HelunaError, List, Record, Result, Value};

use crate::args::Args;

pub fn keys(args: &Args<'_>) -> Result<Value> {
    let keys: List = args.record("record").keys().into_iter().map(Value::String).collect();
    Ok(Value::List(keys))
}

pub fn values(args: &Args<'_>) -> Result<Value> {
    Ok(Value::List(args.record("record").values().into()))
}

/// Fields of `a` overridden by fields of `b`
pub fn merge(args: &Args<'_>) -> Result<Value> {
    let merged = Record::new();
    for (key, value) in args
        .record("a")
        .entries()
        .into_iter()
        .chain(args.record("b").entries())
    {
        merged.set(key, value);
    }
    Ok(Value::Record(merged))
}

fn field_names(args: &Args<'_>, function: &str) -> Result<Vec<String>> {
    args.list("fields")
        .to_vec()
        .into_iter()
        .map(|field| match field {
            Value::String(name) => Ok(name),
            other => Err(HelunaError::Type(format!(
                "{function}: field names must be strings, got {}",
                other.type_name()
            ))),
        })
        .collect()
}

/// Only the listed fields that exist, in list order
pub fn pick(args: &Args<'_>) -> Result<Value> {
    let source = args.record("record");
    let picked = Record::new();
    for name in field_names(args, "pick")? {
        if source.has(&name) {
            let value = source.get(&name);
            picked.set(name, value);
        }
    }
    Ok(Value::Record(picked))
}

pub fn omit(args: &Args<'_>) -> Result<Value> {
    let dropped: HashSet<String> = field_names(args, "omit")?.into_iter().collect();
    let kept: Record = args
        .record("record")
        .entries()
        .into_iter()
        .filter(|(key, _)| !dropped.contains(key))
        .collect();
    Ok(Value::Record(kept))
}
