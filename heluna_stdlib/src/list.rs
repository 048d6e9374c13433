//! List functions (0x0030 - 0x0037)
//!
//! Every function returns a fresh list; argument lists are never mutated.

use std::cmp::Ordering;
use std::collections::HashSet;

use heluna_core::{HelunaError, List, Record, Result, Value};

use crate::args::Args;

/// Largest list `range` will build
pub const MAX_RANGE_LEN: u64 = 1_000_000;

/// Sort order: numbers by value, then strings lexicographically, then
/// everything else in original order.
fn sort_order(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Integer(_) | Value::Float(_) => 0,
            Value::String(_) => 1,
            _ => 2,
        }
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}

pub fn sort(args: &Args<'_>) -> Result<Value> {
    let mut items = args.list("list").to_vec();
    items.sort_by(sort_order);
    Ok(Value::List(items.into()))
}

/// Sort records by one field; non-records sort as if the field were missing
pub fn sort_by(args: &Args<'_>) -> Result<Value> {
    let field = args.str("field");
    let key = |v: &Value| match v {
        Value::Record(rec) => rec.get(&field),
        _ => Value::Nothing,
    };
    let mut items = args.list("list").to_vec();
    items.sort_by(|a, b| sort_order(&key(a), &key(b)));
    Ok(Value::List(items.into()))
}

pub fn reverse(args: &Args<'_>) -> Result<Value> {
    let mut items = args.list("list").to_vec();
    items.reverse();
    Ok(Value::List(items.into()))
}

/// Drop later duplicates, comparing rendered text
pub fn unique(args: &Args<'_>) -> Result<Value> {
    let mut seen = HashSet::new();
    let items: List = args
        .list("list")
        .to_vec()
        .into_iter()
        .filter(|v| seen.insert(v.to_string()))
        .collect();
    Ok(Value::List(items))
}

/// One level of nesting
pub fn flatten(args: &Args<'_>) -> Result<Value> {
    let result = List::new();
    for item in args.list("list").to_vec() {
        match item {
            Value::List(inner) => inner.to_vec().into_iter().for_each(|v| result.push(v)),
            other => result.push(other),
        }
    }
    Ok(Value::List(result))
}

/// Pair elements into `{a, b}` records, stopping at the shorter list
pub fn zip(args: &Args<'_>) -> Result<Value> {
    let (a, b) = (args.list("a").to_vec(), args.list("b").to_vec());
    let pairs: List = a
        .into_iter()
        .zip(b)
        .map(|(x, y)| Value::Record([("a", x), ("b", y)].into_iter().collect::<Record>()))
        .collect();
    Ok(Value::List(pairs))
}

/// Inclusive integer range, counting down when `start > end`
pub fn range(args: &Args<'_>) -> Result<Value> {
    let (start, end) = (args.int("start"), args.int("end"));
    let len = start.abs_diff(end).saturating_add(1);
    if len > MAX_RANGE_LEN {
        return Err(HelunaError::Domain(format!(
            "range of {len} elements exceeds limit of {MAX_RANGE_LEN}"
        )));
    }
    let items: List = if start <= end {
        (start..=end).map(Value::Integer).collect()
    } else {
        (end..=start).rev().map(Value::Integer).collect()
    };
    Ok(Value::List(items))
}

/// Elements `start..end`, clamped to the list
pub fn slice(args: &Args<'_>) -> Result<Value> {
    let items = args.list("list").to_vec();
    let start = usize::try_from(args.int("start")).unwrap_or(0);
    let end = usize::try_from(args.int("end"))
        .unwrap_or(0)
        .min(items.len());
    let result: List = if start < end {
        items[start..end].iter().cloned().collect()
    } else {
        List::new()
    };
    Ok(Value::List(result))
}
